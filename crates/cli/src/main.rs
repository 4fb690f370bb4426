//! Barberboard CLI - Server data management tools.
//!
//! # Usage
//!
//! ```bash
//! # Seed a fresh server data directory with default records
//! bb-cli seed --data-dir ./data
//!
//! # Inspect a running server
//! bb-cli show --base-url http://localhost:8001
//!
//! # Force every display to reconcile
//! bb-cli bump --token s3cret
//!
//! # Set or rotate the admin token
//! bb-cli admin-token --token s3cret
//! ```
//!
//! # Commands
//!
//! - `seed` - Write default records into a server data directory
//! - `show` - Fetch and log every record from a running server
//! - `bump` - Overwrite the version marker so displays reload
//! - `admin-token` - Set or rotate the server admin token

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bb-cli")]
#[command(author, version, about = "Barberboard CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write default records into a server data directory
    Seed {
        /// Server data directory
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Overwrite records that already exist
        #[arg(long)]
        force: bool,
    },
    /// Fetch and log every record from a running server
    Show {
        /// Server base URL
        #[arg(long, default_value = "http://localhost:8001")]
        base_url: String,
    },
    /// Overwrite the version marker so every display reloads
    Bump {
        /// Server base URL
        #[arg(long, default_value = "http://localhost:8001")]
        base_url: String,

        /// Admin token, if the server has one configured
        #[arg(short, long)]
        token: Option<String>,
    },
    /// Set or rotate the server admin token
    AdminToken {
        /// Server base URL
        #[arg(long, default_value = "http://localhost:8001")]
        base_url: String,

        /// New admin token
        #[arg(short, long)]
        token: String,

        /// Current admin token (required once one is set)
        #[arg(short, long)]
        current: Option<String>,
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
        Commands::Seed { data_dir, force } => commands::seed::run(&data_dir, force)?,
        Commands::Show { base_url } => commands::show::run(&base_url).await?,
        Commands::Bump { base_url, token } => {
            commands::bump::run(&base_url, token.as_deref()).await?;
        }
        Commands::AdminToken {
            base_url,
            token,
            current,
        } => {
            commands::admin_token::run(&base_url, &token, current.as_deref()).await?;
        }
    }
    Ok(())
}
