//! Waystone CLI — run the caching proxy and inspect its caches.
//!
//! ```bash
//! waystone serve --config waystone.toml
//! waystone namespaces
//! ```
//!
//! See `waystone --help` for all available commands and options.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use waystone_core::config::WaystoneConfig;

#[derive(Parser)]
#[command(name = "waystone", about = "Client-resident caching proxy", version)]
struct Cli {
    /// Config file (defaults to ./waystone.toml when present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the configured version and serve intercepted requests
    Serve,
    /// Populate the precache namespace for the configured version, then exit
    Install,
    /// List cache namespaces and their entry counts
    Namespaces,
    /// Delete namespaces that do not belong to the configured version
    Purge,
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<WaystoneConfig> {
    let config = match path {
        Some(path) => WaystoneConfig::load_from(path)?,
        None => WaystoneConfig::load()?,
    };
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config)?;
    waystone_core::logging::init_logging(&config.logging.to_logging()?)?;

    match cli.command {
        Commands::Serve => commands::serve::run(&config).await,
        Commands::Install => commands::cache::install(&config).await,
        Commands::Namespaces => commands::cache::namespaces(&config).await,
        Commands::Purge => commands::cache::purge(&config).await,
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
