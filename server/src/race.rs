//! Race coordination shared by every connection
//!
//! The [`RaceCoordinator`] owns the participant roster, the readiness set and
//! the race phase. Every operation runs under one lock so connection tasks
//! and the countdown task observe a consistent state:
//! - `join` / `announce_join` / `leave` manage membership
//! - `handle_message` applies `ready`, `click` and `clicks_sent:<n>`
//! - once every connected participant is ready a countdown runs in the
//!   background, then clicks advance horses until one reaches the finish

use crate::broadcast::{send_to, BroadcastGroup};
use crate::countdown::{run_countdown, CountdownTicket};
use crate::participant::{Outbox, Participant};
use log::{debug, info};
use shared::{
    ClientMessage, ProtocolError, ServerMessage, CLICK_STEP, COUNTDOWN_INTERVAL, MIN_PLAYERS,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// State guarded by the coordinator lock
#[derive(Debug)]
pub(crate) struct RaceState {
    pub(crate) participants: BTreeMap<u32, Participant>,
    pub(crate) ready: HashSet<u32>,
    pub(crate) race_active: bool,
    pub(crate) next_id: u32,
    pub(crate) broadcast: BroadcastGroup,
    pub(crate) countdown: Option<CountdownTicket>,
    /// Survives `reset` so a stale countdown task never matches a new ticket
    pub(crate) countdown_generation: u64,
}

impl RaceState {
    fn new() -> Self {
        Self {
            participants: BTreeMap::new(),
            ready: HashSet::new(),
            race_active: false,
            next_id: 1,
            broadcast: BroadcastGroup::new(),
            countdown: None,
            countdown_generation: 0,
        }
    }

    fn broadcast_roster(&self) {
        let roster = self
            .participants
            .values()
            .map(|p| (p.id, p.name.clone()))
            .collect();
        self.broadcast.broadcast(&ServerMessage::Players(roster));
    }

    /// Tells every client whether enough participants are connected
    fn notify_start_status(&self) {
        let status = if self.participants.len() >= MIN_PLAYERS {
            ServerMessage::CanStart
        } else {
            ServerMessage::WaitPlayers
        };
        debug!("Start status: {}", status);
        self.broadcast.broadcast(&status);
    }

    fn everyone_ready(&self) -> bool {
        !self.participants.is_empty() && self.ready.len() == self.participants.len()
    }

    fn announce_winner(&mut self, id: u32) {
        let Some(winner) = self.participants.get(&id) else {
            return;
        };
        self.broadcast.broadcast(&ServerMessage::Win {
            name: winner.name.clone(),
        });
        info!("Participant {} ({}) won the race", winner.id, winner.name);
        self.race_active = false;
    }

    pub(crate) fn finish_countdown(&mut self, generation: u64) {
        if self
            .countdown
            .as_ref()
            .is_some_and(|ticket| ticket.generation == generation)
        {
            self.countdown = None;
        }
    }
}

/// Shared coordinator handle; clones refer to the same race
#[derive(Clone)]
pub struct RaceCoordinator {
    state: Arc<Mutex<RaceState>>,
    shutdown: CancellationToken,
    countdown_interval: Duration,
}

impl RaceCoordinator {
    /// Creates a coordinator with the standard one second countdown step.
    /// Cancelling `shutdown` aborts any countdown in flight.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self::with_countdown_interval(COUNTDOWN_INTERVAL, shutdown)
    }

    pub fn with_countdown_interval(countdown_interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            state: Arc::new(Mutex::new(RaceState::new())),
            shutdown,
            countdown_interval,
        }
    }

    /// Registers a new participant, sends it the bare id line and makes
    /// `outbox` a broadcast target
    pub async fn join(&self, outbox: Outbox) -> Participant {
        let mut state = self.state.lock().await;

        let id = state.next_id;
        state.next_id += 1;

        let participant = Participant::new(id, outbox.clone());
        // The id line must precede any broadcast reaching this outbox
        send_to(&outbox, &ServerMessage::Assigned { id });
        state.participants.insert(id, participant.clone());
        state.broadcast.add(outbox);
        info!("Participant {} joined", id);

        participant
    }

    /// Changes a participant's display name. Returns false for unknown ids.
    pub async fn rename(&self, id: u32, name: &str) -> bool {
        let mut state = self.state.lock().await;
        match state.participants.get_mut(&id) {
            Some(participant) => {
                participant.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Broadcasts the roster and the start status after a participant
    /// has settled on a display name
    pub async fn announce_join(&self, id: u32) {
        let state = self.state.lock().await;
        if let Some(participant) = state.participants.get(&id) {
            info!("{} (horse {}) connected", participant.name, participant.id);
        }
        state.broadcast_roster();
        state.notify_start_status();
    }

    /// Removes a participant and its outbox.
    ///
    /// `id` is `None` when registration never completed; the outbox is
    /// removed regardless. If every remaining participant is already ready
    /// the countdown starts without waiting for the one who left.
    pub async fn leave(&self, id: Option<u32>, outbox: &Outbox) {
        let mut state = self.state.lock().await;

        if let Some(id) = id {
            if state.participants.remove(&id).is_some() {
                info!("Participant {} left", id);
            }
            state.ready.remove(&id);
        }
        if !state.broadcast.remove(outbox) {
            debug!("Outbox was not a broadcast target");
        }
        state.notify_start_status();

        if !state.race_active && !state.ready.is_empty() && state.everyone_ready() {
            info!("All remaining participants are ready, starting countdown");
            self.start_countdown(&mut state);
        }
    }

    /// Applies one line received from participant `id`.
    ///
    /// A `clicks_sent:` line with a non-integer count fails with
    /// [`ProtocolError::InvalidNumber`] and leaves the state untouched.
    pub async fn handle_message(&self, id: u32, line: &str) -> Result<(), ProtocolError> {
        let message = ClientMessage::parse(line)?;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if !state.participants.contains_key(&id) {
            return Ok(());
        }

        match message {
            ClientMessage::Ready => {
                state.ready.insert(id);
                info!(
                    "Participant {} ready ({}/{})",
                    id,
                    state.ready.len(),
                    state.participants.len()
                );
                if state.everyone_ready() {
                    self.start_countdown(state);
                }
            }
            ClientMessage::Click => {
                if !state.race_active {
                    return Ok(());
                }
                let Some(participant) = state.participants.get_mut(&id) else {
                    return Ok(());
                };
                participant.advance(CLICK_STEP);
                let progress = participant.progress;
                let finished = participant.has_finished();
                debug!("Horse {} advanced to {}%", id, progress);

                state
                    .broadcast
                    .broadcast(&ServerMessage::Progress { id, progress });
                if finished {
                    state.announce_winner(id);
                }
            }
            ClientMessage::ClicksSent(count) => {
                if let Some(participant) = state.participants.get_mut(&id) {
                    participant.reported_clicks = count;
                    info!("Horse {} reported {} clicks", id, count);
                }
            }
            ClientMessage::Unknown => {}
        }

        Ok(())
    }

    /// Spawns the countdown unless one is running or a race is active
    fn start_countdown(&self, state: &mut RaceState) -> bool {
        if state.countdown.is_some() || state.race_active {
            debug!("Countdown request ignored");
            return false;
        }

        state.countdown_generation += 1;
        let generation = state.countdown_generation;
        let cancel = self.shutdown.child_token();
        state.countdown = Some(CountdownTicket {
            generation,
            cancel: cancel.clone(),
        });

        info!("Starting countdown {}", generation);
        tokio::spawn(run_countdown(
            Arc::clone(&self.state),
            generation,
            cancel,
            self.countdown_interval,
        ));
        true
    }

    /// Restores the freshly constructed state and aborts any countdown
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        if let Some(ticket) = state.countdown.take() {
            ticket.cancel.cancel();
        }
        let generation = state.countdown_generation;
        *state = RaceState::new();
        state.countdown_generation = generation;
    }

    /// Aborts any countdown in flight and prevents new ones from activating
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub async fn snapshot(&self, id: u32) -> Option<Participant> {
        self.state.lock().await.participants.get(&id).cloned()
    }

    pub async fn roster(&self) -> Vec<(u32, String)> {
        self.state
            .lock()
            .await
            .participants
            .values()
            .map(|p| (p.id, p.name.clone()))
            .collect()
    }

    pub async fn participant_count(&self) -> usize {
        self.state.lock().await.participants.len()
    }

    pub async fn ready_count(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    pub async fn is_race_active(&self) -> bool {
        self.state.lock().await.race_active
    }

    pub async fn is_countdown_running(&self) -> bool {
        self.state.lock().await.countdown.is_some()
    }
}
