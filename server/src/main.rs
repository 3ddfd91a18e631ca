use clap::Parser;
use log::{error, info};
use server::{Server, ServerConfig};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Origin allowed to open cross-origin requests
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:3000")]
    frontend_url: String,

    /// Capacity of the shared broadcast queue
    #[arg(long, default_value = "256")]
    broadcast_capacity: usize,

    /// Capacity of each connection's outbound queue
    #[arg(long, default_value = "64")]
    outbound_capacity: usize,

    /// Keep at most this many finished games in memory
    #[arg(long)]
    max_finished_games: Option<usize>,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            allowed_origin: args.frontend_url,
            broadcast_capacity: args.broadcast_capacity,
            outbound_capacity: args.outbound_capacity,
            max_finished_games: args.max_finished_games,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ServerConfig::from(Args::parse());
    info!("Allowing requests from {}", config.allowed_origin);

    let server = Server::bind(&config).await?;
    info!("Accepting WebSocket connections on ws://{}/ws", server.local_addr()?);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    Ok(())
}
