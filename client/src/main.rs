use clap::Parser;
use client::input::MoveSource;
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket endpoint of the server
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080/ws")]
    server: String,

    /// Display name
    #[arg(short = 'n', long, default_value = shared::DEFAULT_PLAYER_NAME)]
    name: String,

    /// Type moves on stdin instead of playing random cells
    #[arg(short = 'i', long)]
    interactive: bool,

    /// Number of games to play before disconnecting
    #[arg(short = 'g', long, default_value = "1")]
    games: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client as {}", args.name);
    let moves = if args.interactive {
        MoveSource::interactive()
    } else {
        MoveSource::random()
    };

    let mut client = Client::connect(&args.server, &args.name, moves, args.games).await?;
    client.run().await?;

    Ok(())
}
