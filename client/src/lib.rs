//! # Race Client Library
//!
//! Headless racer for the horse race server. It speaks the line protocol
//! from the `shared` crate and is used both by the `client` binary and by
//! the workspace integration tests.
//!
//! ## Module Organization
//!
//! ### Race View Module (`race_view`)
//! Folds every received server line into a local picture of the race:
//! roster, per-horse progress, countdown and winner.
//!
//! ### Network Module (`network`)
//! TCP connection handling and the bot loop:
//! - Name handshake after the server assigns an id
//! - `ready`, then clicks at a jittered pace once the race is on
//! - Final `clicks_sent:<n>` report when a winner is announced
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{ClickPace, RaceClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut racer = RaceClient::connect("127.0.0.1:1818", "Seabiscuit").await?;
//!     let pace = ClickPace {
//!         interval: Duration::from_millis(150),
//!         jitter: Duration::from_millis(50),
//!     };
//!     let outcome = racer.race(pace).await?;
//!     println!("{} won", outcome.winner);
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod race_view;
