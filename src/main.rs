use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::sync::Mutex;

mod api;
mod app;
mod commands;
mod config;
mod events;
mod models;
mod session;
mod storage;
mod ui;

use app::App;
use config::Config;
use storage::StorageManager;

#[derive(Parser)]
#[command(name = "quickgpt")]
#[command(version = "0.1.0")]
#[command(about = "Terminal client for the quickGPT chat service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store an API token for this machine
    Login,
    /// Remove the stored API token
    Logout,
    /// Print the community image gallery
    Gallery,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    let storage = StorageManager::new()?;
    init_tracing(&storage)?;

    match Cli::parse().command {
        None => {
            let token = storage.load_token()?;
            App::new(config, token).run().await
        }
        Some(Commands::Login) => commands::login(&config).await,
        Some(Commands::Logout) => commands::logout(),
        Some(Commands::Gallery) => commands::gallery(&config).await,
    }
}

/// The TUI owns the terminal, so logs go to a file under the quickgpt home
/// directory. `RUST_LOG` overrides the default filter.
fn init_tracing(storage: &StorageManager) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    storage.ensure_directories()?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(storage.log_file_path())
        .context("Failed to open log file")?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quickgpt=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
