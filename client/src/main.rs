use clap::Parser;
use client::network::{ClickPace, RaceClient};
use log::info;
use shared::DEFAULT_PORT;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Display name of the horse
    #[arg(short = 'n', long, default_value = "")]
    name: String,

    /// Delay between clicks in milliseconds
    #[arg(short = 'c', long, default_value = "150")]
    click_ms: u64,

    /// Maximum random delay added to each click in milliseconds
    #[arg(short = 'j', long, default_value = "50")]
    jitter_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    let mut racer = RaceClient::connect(&args.server, &args.name).await?;

    let pace = ClickPace {
        interval: Duration::from_millis(args.click_ms),
        jitter: Duration::from_millis(args.jitter_ms),
    };
    let outcome = racer.race(pace).await?;

    println!(
        "Winner: {} (you were horse {} at {}% after {} clicks)",
        outcome.winner, outcome.id, outcome.own_progress, outcome.clicks_sent
    );

    Ok(())
}
