use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use parlor::{GameConfig, GameServer};

#[derive(Parser, Debug)]
#[command(name = "parlor-game", about = "Parlor game server")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(default_value = "game.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = match GameConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("parlor-game: {e}");
            return ExitCode::FAILURE;
        }
    };

    let server = match GameServer::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("parlor-game: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "game server stopped");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
