//! A connected racer and its per-race state

use shared::{default_name, MAX_PROGRESS};
use tokio::sync::mpsc;

/// Outbound line channel of one connection
///
/// The connection layer owns the receiving half and writes each line to
/// its socket. The coordinator only ever sends.
pub type Outbox = mpsc::UnboundedSender<String>;

/// Represents a connected participant ("horse")
#[derive(Debug, Clone)]
pub struct Participant {
    /// Unique id assigned by the coordinator, never reused
    pub id: u32,
    /// Display name, `Player <id>` until the client supplies one
    pub name: String,
    /// Race progress in `0..=MAX_PROGRESS`
    pub progress: u8,
    /// Last click count the client reported; informational only
    pub reported_clicks: u32,
    /// Channel used to reach this participant
    pub outbox: Outbox,
}

impl Participant {
    pub fn new(id: u32, outbox: Outbox) -> Self {
        Self {
            id,
            name: default_name(id),
            progress: 0,
            reported_clicks: 0,
            outbox,
        }
    }

    /// Moves the participant forward, clamped at the finish line
    pub fn advance(&mut self, step: u8) {
        self.progress = self.progress.saturating_add(step).min(MAX_PROGRESS);
    }

    pub fn has_finished(&self) -> bool {
        self.progress >= MAX_PROGRESS
    }
}
