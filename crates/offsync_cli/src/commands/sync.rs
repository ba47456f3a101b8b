//! Sync command implementation.

use super::open_existing;
use offsync_core::Database;
use offsync_sync_engine::{
    HttpTransport, ReqwestClient, SyncConfig, SyncEngine, SyncOutcome, SyncTransport,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Runs the sync command: one attempt against `remote`.
pub fn run(
    path: &Path,
    remote: &str,
    device: &str,
    batch_size: usize,
    timeout_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = Arc::new(open_existing(path)?);
    tracing::debug!(remote, device, pending = db.pending_count(), "starting sync");
    let config = SyncConfig::new(device, remote)
        .with_push_batch_size(batch_size)
        .with_timeout(Duration::from_secs(timeout_secs))
        .without_sync_interval();
    let transport = HttpTransport::new(remote, ReqwestClient::new());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(push(config, transport, db));

    println!("{}", summarize(&outcome));
    match outcome.error {
        Some(error) => Err(format!("sync failed: {error}").into()),
        None => Ok(()),
    }
}

/// Runs one engine attempt.
pub async fn push<T: SyncTransport>(
    config: SyncConfig,
    transport: T,
    db: Arc<Database>,
) -> SyncOutcome {
    SyncEngine::new(config, transport, db).sync_now().await
}

/// One-line summary of an attempt.
pub fn summarize(outcome: &SyncOutcome) -> String {
    if outcome.attempted == 0 {
        return "Nothing to sync".to_string();
    }
    let mut line = format!(
        "{} sent: {} acknowledged, {} rejected, {} still pending ({} ms)",
        outcome.attempted,
        outcome.acknowledged,
        outcome.rejected,
        outcome.deferred,
        outcome.duration.as_millis()
    );
    if outcome.retryable {
        line.push_str("; will retry");
    }
    line
}
