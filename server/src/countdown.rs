//! Background countdown that precedes every race

use crate::race::RaceState;
use log::{info, warn};
use shared::{ServerMessage, COUNTDOWN_STEPS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Identifies the countdown currently in flight
#[derive(Debug)]
pub(crate) struct CountdownTicket {
    pub(crate) generation: u64,
    pub(crate) cancel: CancellationToken,
}

/// Broadcasts `countdown:3..1`, then activates the race and sends `go`.
///
/// The state lock is only held while a step is broadcast, never across the
/// delays. Once `cancel` fires the task stops and leaves the race inactive.
pub(crate) async fn run_countdown(
    state: Arc<Mutex<RaceState>>,
    generation: u64,
    cancel: CancellationToken,
    interval: Duration,
) {
    let mut completed = true;

    for step in (1..=COUNTDOWN_STEPS).rev() {
        {
            let state = state.lock().await;
            if cancel.is_cancelled() {
                completed = false;
                break;
            }
            state.broadcast.broadcast(&ServerMessage::Countdown(step));
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                completed = false;
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }

    let mut state = state.lock().await;
    if completed && !cancel.is_cancelled() {
        state.race_active = true;
        state.broadcast.broadcast(&ServerMessage::Go);
        info!("Race started with {} participants", state.participants.len());
    } else {
        warn!("Countdown {} interrupted, race not started", generation);
    }
    state.finish_countdown(generation);
}
