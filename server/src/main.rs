use clap::Parser;
use log::info;
use server::network::Server;

/// Authoritative server for the multiplayer bird game.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Wall seed shared by every session; random when omitted
    #[arg(short, long)]
    seed: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(|| rand::random::<u32>() as f64);

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address, seed).await?;
    info!("running with wall seed {}", seed);

    server.run().await?;
    Ok(())
}
