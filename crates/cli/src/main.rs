//! Numisma CLI - operator tools for the marketplace backend.
//!
//! # Usage
//!
//! ```bash
//! # Load coin listings from a YAML file (validate only with --dry-run)
//! numisma-cli seed crates/cli/seeds/listings.yaml
//!
//! # Give an existing account the admin role, or take it away
//! numisma-cli admin grant -e curator@example.com
//! numisma-cli admin revoke -e curator@example.com
//!
//! # Price a verification submission
//! numisma-cli quote 5
//!
//! # See what the search bar would match
//! numisma-cli search "mughal" --listings
//! ```
//!
//! Commands that write to the backend need `BACKEND_URL`, `BACKEND_ANON_KEY`
//! and `BACKEND_SERVICE_KEY`, read from the environment or `.env`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use numisma_core::Role;

mod commands;

#[derive(Parser)]
#[command(name = "numisma-cli")]
#[command(author, version, about = "Numisma CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed coin listings from a YAML file
    Seed {
        /// Path to the seed file
        file: PathBuf,

        /// Validate the file without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Manage admin roles
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Price a verification submission
    Quote {
        /// Number of coins to verify (1-6)
        count: i64,
    },
    /// Run a query against the search catalog
    Search {
        query: String,

        /// Course content root
        #[arg(long, default_value = "crates/storefront/content")]
        content_dir: PathBuf,

        /// Include the newest listings from the backend
        #[arg(long)]
        listings: bool,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Grant the admin role
    Grant {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Revoke the admin role
    Revoke {
        /// Account email address
        #[arg(short, long)]
        email: String,
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
        Commands::Seed { file, dry_run } => commands::seed::run(&file, dry_run).await?,
        Commands::Admin { action } => {
            let (email, role) = match action {
                AdminAction::Grant { email } => (email, Role::Admin),
                AdminAction::Revoke { email } => (email, Role::User),
            };
            let repos = commands::connect()?;
            commands::admin::set_role(&repos, &email, role).await?;
        }
        Commands::Quote { count } => {
            commands::quote::run(count)?;
        }
        Commands::Search {
            query,
            content_dir,
            listings,
        } => commands::search::run(&query, &content_dir, listings).await?,
    }
    Ok(())
}
