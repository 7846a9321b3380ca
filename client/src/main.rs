use clap::Parser;
use log::{info, warn};
use tokio::time::{interval, Duration};

use client::network::Client;

/// Headless client for the multiplayer bird game: connects, optionally
/// claims a username, and taps on a timer.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Username to claim after connecting
    #[arg(short, long)]
    username: Option<String>,

    /// Milliseconds between automatic taps
    #[arg(short, long, default_value = "1500")]
    tap_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    info!("connecting to {}", args.server);

    let (mut client, handle) = Client::connect(&args.server).await?;

    if let Some(username) = args.username {
        let done = handle.set_username(username.clone());
        tokio::spawn(async move {
            match done.await {
                Ok(true) => info!("username {} accepted", username),
                Ok(false) => warn!("username {} rejected", username),
                Err(_) => warn!("username request never resolved"),
            }
        });
    }

    // Stand-in for a real input device: tap on a timer.
    let taps = handle.clone();
    let tap_ms = args.tap_ms;
    tokio::spawn(async move {
        let mut tap_interval = interval(Duration::from_millis(tap_ms));
        loop {
            tap_interval.tick().await;
            taps.tap();
        }
    });

    client.run().await?;
    Ok(())
}
