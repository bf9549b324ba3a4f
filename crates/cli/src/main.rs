//! Weathervane CLI - Database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! wv-cli migrate
//!
//! # Delete snapshots older than 24 hours
//! wv-cli prune
//!
//! # Delete snapshots older than a week
//! wv-cli prune --max-age-hours 168
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `prune` - Delete old weather snapshots

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "wv-cli")]
#[command(author, version, about = "Weathervane CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Delete weather snapshots older than the given age
    Prune {
        /// Maximum snapshot age to keep, in hours
        #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u64).range(1..))]
        max_age_hours: u64,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Prune { max_age_hours } => {
            let removed = commands::prune::run(max_age_hours).await?;
            tracing::info!("Removed {removed} snapshot(s)");
        }
    }
    Ok(())
}
