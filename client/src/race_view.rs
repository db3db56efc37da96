//! Client-side picture of the race, rebuilt from server lines

use log::debug;
use shared::{ServerMessage, COUNTDOWN_STEPS};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RacePhase {
    Lobby,
    Countdown(u8),
    Running,
    Finished,
}

/// Everything a client knows about the race so far
#[derive(Debug, Clone)]
pub struct RaceView {
    /// Id the server assigned to this client
    pub id: Option<u32>,
    pub roster: BTreeMap<u32, String>,
    pub progress: HashMap<u32, u8>,
    /// Whether enough participants are connected to start
    pub can_start: bool,
    pub phase: RacePhase,
    /// Countdown steps observed for the current race, in arrival order
    pub countdown_seen: Vec<u8>,
    pub winner: Option<String>,
}

impl RaceView {
    pub fn new() -> Self {
        Self {
            id: None,
            roster: BTreeMap::new(),
            progress: HashMap::new(),
            can_start: false,
            phase: RacePhase::Lobby,
            countdown_seen: Vec::new(),
            winner: None,
        }
    }

    pub fn apply(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Assigned { id } => self.id = Some(id),
            ServerMessage::Players(roster) => {
                self.roster = roster.into_iter().collect();
                let roster = &self.roster;
                self.progress.retain(|id, _| roster.contains_key(id));
            }
            ServerMessage::CanStart => self.can_start = true,
            ServerMessage::WaitPlayers => self.can_start = false,
            ServerMessage::Countdown(step) => {
                if step == COUNTDOWN_STEPS {
                    self.countdown_seen.clear();
                    self.winner = None;
                }
                self.countdown_seen.push(step);
                self.phase = RacePhase::Countdown(step);
            }
            ServerMessage::Go => self.phase = RacePhase::Running,
            ServerMessage::Progress { id, progress } => {
                debug!("Horse {} at {}%", id, progress);
                self.progress.insert(id, progress);
            }
            ServerMessage::Win { name } => {
                self.phase = RacePhase::Finished;
                self.winner = Some(name);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == RacePhase::Running
    }

    /// Progress of this client's own horse
    pub fn own_progress(&self) -> u8 {
        self.id
            .and_then(|id| self.progress.get(&id).copied())
            .unwrap_or(0)
    }

    pub fn name_of(&self, id: u32) -> Option<&str> {
        self.roster.get(&id).map(String::as_str)
    }
}

impl Default for RaceView {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply_lines(view: &mut RaceView, lines: &[&str]) {
        for line in lines {
            view.apply(line.parse().unwrap());
        }
    }

    #[test]
    fn test_lobby_updates() {
        let mut view = RaceView::new();
        apply_lines(&mut view, &["2", "players:1-A,2-B,", "can_start"]);

        assert_eq!(view.id, Some(2));
        assert_eq!(view.name_of(1), Some("A"));
        assert_eq!(view.name_of(2), Some("B"));
        assert!(view.can_start);
        assert_eq!(view.phase, RacePhase::Lobby);

        view.apply(ServerMessage::WaitPlayers);
        assert!(!view.can_start);
    }

    #[test]
    fn test_full_race() {
        let mut view = RaceView::new();
        apply_lines(
            &mut view,
            &["1", "players:1-A,2-B,", "countdown:3", "countdown:2", "countdown:1"],
        );
        assert_eq!(view.phase, RacePhase::Countdown(1));
        assert!(!view.is_running());

        apply_lines(&mut view, &["go", "1:10", "2:10", "1:20"]);
        assert!(view.is_running());
        assert_eq!(view.own_progress(), 20);
        assert_eq!(view.progress.get(&2), Some(&10));

        view.apply(ServerMessage::Win {
            name: "A".to_string(),
        });
        assert_eq!(view.phase, RacePhase::Finished);
        assert_eq!(view.winner.as_deref(), Some("A"));
        assert_eq!(view.countdown_seen, vec![3, 2, 1]);
    }

    #[test]
    fn test_new_countdown_clears_previous_result() {
        let mut view = RaceView::new();
        apply_lines(&mut view, &["countdown:3", "countdown:2", "countdown:1", "go", "win:A"]);
        apply_lines(&mut view, &["countdown:3"]);

        assert_eq!(view.winner, None);
        assert_eq!(view.countdown_seen, vec![3]);
    }

    #[test]
    fn test_roster_drops_departed_progress() {
        let mut view = RaceView::new();
        apply_lines(&mut view, &["players:1-A,2-B,", "go", "1:10", "2:30", "players:1-A,"]);

        assert_eq!(view.progress.len(), 1);
        assert_eq!(view.name_of(2), None);
    }
}
