//! Stablemart CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations (app tables + session store)
//! sm-cli migrate storefront
//!
//! # Run all database migrations
//! sm-cli migrate all
//!
//! # Seed the welcome notification for a fresh deployment
//! sm-cli seed welcome
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sm-cli")]
#[command(author, version, about = "Stablemart CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        target: MigrateTarget,
    },
    /// Seed database records
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum MigrateTarget {
    /// Run storefront database migrations
    Storefront,
    /// Run all database migrations
    All,
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert the welcome notification into an empty feed
    Welcome,
}

#[tokio::main]
async fn main() {
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
        Commands::Migrate { target } => match target {
            MigrateTarget::Storefront | MigrateTarget::All => {
                commands::migrate::storefront().await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Welcome => commands::seed::welcome().await?,
        },
    }
    Ok(())
}
