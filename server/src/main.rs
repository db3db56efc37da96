use clap::Parser;
use log::info;
use server::{RaceCoordinator, RaceServer};
use shared::DEFAULT_PORT;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Main-method of the application.
/// Parses command-line arguments, then runs the race server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Delay between countdown steps in milliseconds
        #[clap(short, long, default_value = "1000")]
        countdown_ms: u64,
    }

    env_logger::init();

    let args = Args::parse();

    let shutdown = CancellationToken::new();
    let coordinator = RaceCoordinator::with_countdown_interval(
        Duration::from_millis(args.countdown_ms),
        shutdown.clone(),
    );

    let address = format!("{}:{}", args.host, args.port);
    let server = RaceServer::bind(&address, coordinator).await?;

    let server_handle = tokio::spawn(server.run(shutdown.clone()));

    // Handle shutdown gracefully
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received Ctrl+C, shutting down gracefully...");
            shutdown.cancel();
        }
        _ = shutdown.cancelled() => {}
    }

    server_handle.await?;

    Ok(())
}
