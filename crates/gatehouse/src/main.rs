// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gatehouse - Telegram group admission control.
//!
//! This is the binary entry point for the Gatehouse service.

mod maintenance;
mod serve;
mod shutdown;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gatehouse_config::{ConfigError, GatehouseConfig};
use tracing::error;

/// Gatehouse - Telegram group admission control.
#[derive(Parser, Debug)]
#[command(name = "gatehouse", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the bot and the delayed queue worker.
    Serve,
    /// Create or upgrade the database schema and exit.
    Migrate,
    /// Rebuild projected tables from the audit log.
    Replay,
    /// Load and validate the configuration.
    CheckConfig,
}

fn load_config(path: Option<&std::path::Path>) -> Result<GatehouseConfig, Vec<ConfigError>> {
    match path {
        Some(path) => gatehouse_config::load_and_validate_path(path),
        None => gatehouse_config::load_and_validate(),
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gatehouse={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            gatehouse_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.service.log_level);

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Migrate => maintenance::run_migrate(&config).await,
        Commands::Replay => maintenance::run_replay(&config).await,
        Commands::CheckConfig => {
            println!(
                "gatehouse: configuration OK (service.name={}, database={})",
                config.service.name, config.storage.database_path
            );
            Ok(())
        }
    };

    if let Err(e) = result {
        error!(error = %e, "command failed");
        eprintln!("gatehouse: {e}");
        std::process::exit(1);
    }
}
