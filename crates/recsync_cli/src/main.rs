//! recsync CLI
//!
//! Command-line tools for offline editing and synchronization of records
//! kept in JSON files.
//!
//! # Commands
//!
//! - `add` - Create a record offline
//! - `edit` - Change the payload of a record
//! - `delete` - Remove a record from the local store
//! - `list` - Show local records and their sync status
//! - `pending` - Count records waiting for upload
//! - `sync` - Reconcile the local store with a remote store file

mod commands;
mod error;

use clap::{Parser, Subcommand};
use recsync_core::Scope;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// recsync command-line tools.
#[derive(Parser)]
#[command(name = "recsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the local store file
    #[arg(global = true, short, long, default_value = "recsync-local.json")]
    local: PathBuf,

    /// Scope to operate on
    #[arg(global = true, short, long, default_value = "default")]
    scope: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a record offline
    Add {
        /// Record payload as JSON
        #[arg(short, long)]
        payload: String,
    },

    /// Change the payload of a record
    Edit {
        /// Record id
        #[arg(long)]
        id: String,

        /// New payload as JSON
        #[arg(short, long)]
        payload: String,
    },

    /// Remove a record from the local store
    Delete {
        /// Record id
        #[arg(long)]
        id: String,
    },

    /// Show local records and their sync status
    List {
        /// Only show records waiting for upload
        #[arg(long)]
        pending: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Count records waiting for upload
    Pending,

    /// Reconcile the local store with a remote store file
    Sync {
        /// Path to the remote store file
        #[arg(short, long)]
        remote: PathBuf,

        /// Upload a single record instead of running a full sync
        #[arg(long)]
        id: Option<String>,

        /// Timeout of each remote call, in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let scope = Scope::from(cli.scope.as_str());
    match cli.command {
        Commands::Add { payload } => {
            commands::records::add(&cli.local, &scope, &payload)?;
        }
        Commands::Edit { id, payload } => {
            commands::records::edit(&cli.local, &scope, &id, &payload)?;
        }
        Commands::Delete { id } => {
            commands::records::delete(&cli.local, &scope, &id)?;
        }
        Commands::List { pending, format } => {
            commands::records::list(&cli.local, &scope, pending, &format)?;
        }
        Commands::Pending => {
            commands::records::pending(&cli.local, &scope)?;
        }
        Commands::Sync {
            remote,
            id,
            timeout,
            format,
        } => {
            let options = commands::sync::SyncOptions {
                local: cli.local,
                remote,
                scope,
                id,
                timeout: std::time::Duration::from_secs(timeout),
                format,
            };
            commands::sync::run(&options)?;
        }
        Commands::Version => {
            println!("recsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("recsync core v{}", recsync_core::VERSION);
        }
    }

    Ok(())
}
