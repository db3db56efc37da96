//! Fan-out of protocol lines to every registered connection

use crate::participant::Outbox;
use log::warn;
use shared::ServerMessage;

/// The set of outboxes that receive broadcasts
///
/// Delivery failures are isolated per target: a closed outbox is logged and
/// the remaining targets still get the line.
#[derive(Debug, Default)]
pub struct BroadcastGroup {
    targets: Vec<Outbox>,
}

impl BroadcastGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, outbox: Outbox) {
        self.targets.push(outbox);
    }

    /// Removes every target backed by the same channel as `outbox`.
    /// Returns true if anything was removed.
    pub fn remove(&mut self, outbox: &Outbox) -> bool {
        let before = self.targets.len();
        self.targets.retain(|target| !target.same_channel(outbox));
        self.targets.len() != before
    }

    /// Sends one line to every target, returns how many accepted it
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        let line = message.to_string();
        let mut delivered = 0;

        for target in &self.targets {
            if send_line(target, &line) {
                delivered += 1;
            }
        }

        delivered
    }
}

/// Sends a single message to one outbox
pub fn send_to(outbox: &Outbox, message: &ServerMessage) -> bool {
    send_line(outbox, &message.to_string())
}

fn send_line(outbox: &Outbox, line: &str) -> bool {
    match outbox.send(line.to_string()) {
        Ok(()) => true,
        Err(e) => {
            warn!("Dropping line {:?}: receiver gone", e.0);
            false
        }
    }
}
