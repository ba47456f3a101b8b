//! Error types for the record store.

use offsync_sync_protocol::{EventId, ProtocolError};
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the record store and outbox.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error. A failed commit leaves no partial write.
    #[error("storage error: {0}")]
    Storage(#[from] offsync_storage::StorageError),

    /// CBOR encoding or decoding of a log entry failed.
    #[error("codec error: {0}")]
    Codec(#[from] ProtocolError),

    /// I/O error outside the log backend (directory, lock file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A complete commit frame in the middle of the log is damaged.
    #[error("commit log corrupted at offset {offset}: {message}")]
    LogCorruption {
        /// Offset of the damaged frame.
        offset: u64,
        /// What was wrong.
        message: String,
    },

    /// Record not found.
    #[error("record not found: {id} in collection {collection}")]
    EntityNotFound {
        /// Collection searched.
        collection: String,
        /// Missing record id.
        id: String,
    },

    /// Event not found in the outbox.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// Index not defined on the collection.
    #[error("index {index} not defined on collection {collection}")]
    IndexNotFound {
        /// Collection searched.
        collection: String,
        /// Missing index name.
        index: String,
    },

    /// Transaction wrote to a collection it did not declare.
    #[error("collection {collection} is not in the transaction scope")]
    CollectionNotInScope {
        /// The undeclared collection.
        collection: String,
    },

    /// The events collection cannot be written as a record collection.
    #[error("collection name is reserved: {0}")]
    ReservedCollection(String),

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation is invalid.
        message: String,
    },

    /// Another process holds the store lock.
    #[error("store locked: another process has exclusive access")]
    DatabaseLocked,

    /// The store directory or log does not look like an offsync store.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a log corruption error.
    pub fn log_corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::LogCorruption {
            offset,
            message: message.into(),
        }
    }

    /// Creates an entity-not-found error.
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::EntityNotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns true if the error came from the storage layer.
    ///
    /// These are the failures a domain write must surface to its caller.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, CoreError::Storage(_) | CoreError::Io(_))
    }
}
