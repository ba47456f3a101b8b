//! Engine state and attempt outcomes.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No attempt has run yet.
    Idle,
    /// An attempt is pushing events.
    Pushing,
    /// The last attempt delivered every pending event.
    Synced,
    /// The last attempt failed transiently; a retry is scheduled.
    RetryWait,
    /// The last attempt failed in a way a timer will not fix.
    Error,
}

impl SyncState {
    /// Returns true while an attempt is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Pushing)
    }

    /// Lowercase label for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Pushing => "pushing",
            SyncState::Synced => "synced",
            SyncState::RetryWait => "retry_wait",
            SyncState::Error => "error",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one sync attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Events in the pending snapshot.
    pub attempted: usize,
    /// Events the remote acknowledged.
    pub acknowledged: usize,
    /// Events the remote rejected for good.
    pub rejected: usize,
    /// Events left pending for a later attempt.
    pub deferred: usize,
    /// True when nothing was deferred and no error occurred.
    pub success: bool,
    /// What went wrong, if anything.
    pub error: Option<String>,
    /// Whether the error is worth retrying on a timer.
    pub retryable: bool,
    /// Wall time of the attempt.
    pub duration: Duration,
}

impl SyncOutcome {
    /// Outcome of an attempt that found nothing to send.
    pub fn nothing_pending() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }
}
