//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote answered with something that is not a push response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local store error during sync.
    #[error("store error: {0}")]
    Store(#[from] offsync_core::CoreError),

    /// The network call exceeded the configured timeout.
    #[error("operation timed out")]
    Timeout,

    /// The remote answered only part of a batch.
    #[error("{missing} event(s) got no response")]
    IncompleteResponse {
        /// Events left without a verdict.
        missing: usize,
    },

    /// The remote refused a batch as too large (HTTP 413).
    #[error("remote refused a batch of {events} event(s) as too large")]
    BatchTooLarge {
        /// Events in the refused batch.
        events: usize,
    },

    /// The scheduler has shut down.
    #[error("sync scheduler stopped")]
    SchedulerStopped,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout | SyncError::IncompleteResponse { .. } => true,
            SyncError::Store(e) => e.is_storage_failure(),
            SyncError::Protocol(_)
            | SyncError::BatchTooLarge { .. }
            | SyncError::SchedulerStopped => false,
        }
    }
}
