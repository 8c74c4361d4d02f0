mod auth;
mod commands;
mod config;
mod feed;
mod graph;
mod pipeline;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "calmask")]
#[command(about = "Mirror a personal calendar feed into your work calendar as busy blocks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in to the work account (device-code flow)
    Auth,
    /// Reconcile the feed against the work calendar and apply changes
    Sync {
        /// Compute and print the plan without touching the calendar
        #[arg(long)]
        dry_run: bool,
    },
    /// Show pending changes without applying them
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Auth => commands::auth::run().await,
        Commands::Sync { dry_run } => commands::sync::run(dry_run).await,
        Commands::Status => commands::status::run().await,
    }
}
