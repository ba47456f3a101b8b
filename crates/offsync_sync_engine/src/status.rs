//! Read-only sync status.

use crate::state::SyncState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

/// Snapshot of the engine as seen by a UI or operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Events waiting for delivery.
    pub pending_count: usize,
    /// Events the remote rejected.
    pub failed_count: usize,
    /// Whether an attempt is running.
    pub in_flight: bool,
    /// Engine state.
    pub state: SyncState,
    /// End of the last attempt that delivered everything.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Start of the last attempt.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Error of the last failed attempt, cleared by a successful one.
    pub last_error: Option<String>,
    /// Failed attempts since the last success.
    pub consecutive_failures: u32,
    /// When the scheduler will retry on its own.
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            pending_count: 0,
            failed_count: 0,
            in_flight: false,
            state: SyncState::Idle,
            last_synced_at: None,
            last_attempt_at: None,
            last_error: None,
            consecutive_failures: 0,
            next_retry_at: None,
        }
    }
}

/// Holds the latest [`SyncStatus`] and notifies subscribers on change.
///
/// Only the engine writes. Readers either poll [`snapshot`](Self::snapshot)
/// or await changes on a [`subscribe`](Self::subscribe) receiver.
#[derive(Debug)]
pub struct StatusReporter {
    tx: watch::Sender<SyncStatus>,
}

impl StatusReporter {
    pub(crate) fn new(initial: SyncStatus) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Latest status.
    pub fn snapshot(&self) -> SyncStatus {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every change.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.tx.subscribe()
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut SyncStatus)) {
        self.tx.send_modify(f);
    }
}
