//! # Race Server Library
//!
//! Authoritative server for the multiplayer horse race. Every connected
//! participant controls a horse; once all of them are ready the server runs a
//! short countdown, then each `click` a participant sends moves its horse
//! forward until one crosses the finish line.
//!
//! ## Module Organization
//!
//! ### Race Module (`race`)
//! The [`race::RaceCoordinator`] owns all shared state behind a single lock:
//! - Participant registration and id assignment
//! - Readiness tracking and the start quorum
//! - Progress updates and winner detection
//!
//! ### Countdown Module (`countdown`)
//! Background task that broadcasts the countdown steps and activates the
//! race. It only takes the coordinator lock per step and can be cancelled.
//!
//! ### Broadcast Module (`broadcast`)
//! Fan-out of protocol lines to every connection with per-target failure
//! isolation.
//!
//! ### Network Module (`network`)
//! TCP accept loop and line-framed connection handlers that translate socket
//! traffic into coordinator calls.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::RaceServer;
//! use server::race::RaceCoordinator;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let shutdown = CancellationToken::new();
//!     let coordinator = RaceCoordinator::new(shutdown.clone());
//!
//!     let server = RaceServer::bind("127.0.0.1:1818", coordinator).await?;
//!     server.run(shutdown).await;
//!
//!     Ok(())
//! }
//! ```

pub mod broadcast;
mod countdown;
pub mod network;
pub mod participant;
pub mod race;

pub use network::RaceServer;
pub use participant::{Outbox, Participant};
pub use race::RaceCoordinator;
