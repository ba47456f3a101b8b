//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of the log.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: usize,
        /// Current log size.
        size: u64,
    },

    /// Truncation target lies past the end of the log.
    #[error("cannot truncate to {requested} bytes, log holds {size}")]
    InvalidTruncate {
        /// Requested size.
        requested: u64,
        /// Current log size.
        size: u64,
    },

    /// Writes are refused (disk full, quota exceeded, read-only media).
    #[error("write refused: {0}")]
    WriteRefused(String),
}
