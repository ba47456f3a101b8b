//! Status command implementation.

use super::{format_timestamp, open_existing};
use offsync_core::Database;
use offsync_sync_engine::{ConnectivityProbe, TcpProbe};
use serde::Serialize;
use std::path::Path;

/// Outbox summary.
#[derive(Debug, Serialize)]
pub struct StoreStatus {
    /// Store path.
    pub path: String,
    /// Events waiting for delivery.
    pub pending_count: usize,
    /// Events acknowledged and not yet cleared.
    pub synced_count: usize,
    /// Events the remote rejected.
    pub failed_count: usize,
    /// Timestamp of the oldest pending event.
    pub oldest_pending: Option<u64>,
    /// Commit log size in bytes.
    pub log_size: u64,
    /// Last committed sequence.
    pub last_sequence: u64,
    /// Whether the remote accepted a TCP connection, if one was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_reachable: Option<bool>,
}

/// Runs the status command.
pub fn run(path: &Path, remote: Option<&str>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_existing(path)?;
    let mut status = collect(&db, path)?;

    if let Some(remote) = remote {
        let url = reqwest::Url::parse(remote)?;
        let probe = TcpProbe::for_url(&url).ok_or("remote URL has no host")?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        status.remote_reachable = Some(runtime.block_on(probe.probe()));
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&status)?),
        _ => print_text(&status),
    }
    Ok(())
}

/// Reads the summary from an open store.
pub fn collect(db: &Database, path: &Path) -> Result<StoreStatus, Box<dyn std::error::Error>> {
    Ok(StoreStatus {
        path: path.display().to_string(),
        pending_count: db.pending_count(),
        synced_count: db.synced_count(),
        failed_count: db.failed_count(),
        oldest_pending: db.list_pending_limit(1).first().map(|e| e.timestamp),
        log_size: db.log_size()?,
        last_sequence: db.last_sequence(),
        remote_reachable: None,
    })
}

fn print_text(status: &StoreStatus) {
    println!("Store: {}", status.path);
    println!();
    println!("Outbox:");
    println!("  Pending: {}", status.pending_count);
    println!("  Synced:  {}", status.synced_count);
    println!("  Failed:  {}", status.failed_count);
    if let Some(ts) = status.oldest_pending {
        println!("  Oldest pending: {}", format_timestamp(ts));
    }
    println!();
    println!("Log: {} bytes, sequence {}", status.log_size, status.last_sequence);
    match status.remote_reachable {
        Some(true) => println!("Remote: reachable"),
        Some(false) => println!("Remote: unreachable"),
        None => {}
    }
}
