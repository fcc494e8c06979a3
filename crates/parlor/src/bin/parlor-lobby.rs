use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use parlor::{LobbyConfig, LobbyServer, MemoryStore};

#[derive(Parser, Debug)]
#[command(name = "parlor-lobby", about = "Parlor lobby server")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(default_value = "lobby.json")]
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
    let mut config = match LobbyConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("parlor-lobby: {e}");
            return ExitCode::FAILURE;
        }
    };

    let store = MemoryStore::new(std::mem::take(&mut config.accounts));
    let server = match LobbyServer::bind(config, store).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("parlor-lobby: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "lobby stopped");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
