//! offsync CLI
//!
//! Operator tools for an offsync store.
//!
//! # Commands
//!
//! - `events` - List outbox events with status and timestamp
//! - `status` - Show outbox counts and remote reachability
//! - `sync` - Push pending events to the remote now
//! - `clear-synced` - Delete acknowledged events
//! - `compact` - Rewrite the commit log as a snapshot
//! - `put` / `delete` - Write a record mutation

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// offsync store and outbox tools.
#[derive(Parser)]
#[command(name = "offsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long, env = "OFFSYNC_PATH")]
    path: Option<PathBuf>,

    /// Base URL of the sync remote
    #[arg(global = true, short, long, env = "OFFSYNC_REMOTE_URL")]
    remote: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List outbox events
    Events {
        /// Only events in this state (pending, synced, failed)
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum number of events to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show outbox counts and remote reachability
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Push pending events to the remote now
    Sync {
        /// Device id sent with each batch
        #[arg(short, long, env = "OFFSYNC_DEVICE_ID", default_value = "offsync-cli")]
        device: String,

        /// Events per request
        #[arg(short, long, default_value = "100")]
        batch_size: usize,

        /// Request timeout in seconds
        #[arg(short, long, default_value = "30")]
        timeout: u64,
    },

    /// Delete acknowledged events (pending and failed events are kept)
    ClearSynced {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Rewrite the commit log as a single snapshot
    Compact,

    /// Create or replace a record
    Put {
        /// Collection name
        collection: String,
        /// Record id
        id: String,
        /// Record payload as JSON
        payload: String,
    },

    /// Delete a record
    Delete {
        /// Collection name
        collection: String,
        /// Record id
        id: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let path = cli
        .path
        .ok_or("store path required (--path or OFFSYNC_PATH)")?;

    match cli.command {
        Commands::Events {
            status,
            limit,
            format,
        } => {
            commands::events::run(&path, status.as_deref(), limit, &format)?;
        }
        Commands::Status { format } => {
            commands::status::run(&path, cli.remote.as_deref(), &format)?;
        }
        Commands::Sync {
            device,
            batch_size,
            timeout,
        } => {
            let remote = cli
                .remote
                .ok_or("remote URL required for sync (--remote or OFFSYNC_REMOTE_URL)")?;
            commands::sync::run(&path, &remote, &device, batch_size, timeout)?;
        }
        Commands::ClearSynced { yes } => {
            commands::clear_synced::run(&path, yes)?;
        }
        Commands::Compact => {
            commands::compact::run(&path)?;
        }
        Commands::Put {
            collection,
            id,
            payload,
        } => {
            commands::write::put(&path, &collection, &id, &payload)?;
        }
        Commands::Delete { collection, id } => {
            commands::write::delete(&path, &collection, &id)?;
        }
    }

    Ok(())
}
