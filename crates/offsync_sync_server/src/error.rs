//! Error types for the sync server.

use offsync_sync_protocol::{ProtocolError, STATUS_PAYLOAD_TOO_LARGE};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
///
/// Per-event problems are never errors: they become `REJECT` verdicts.
/// These cover requests that cannot be processed at all.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The request is well formed but not acceptable.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The body could not be decoded.
    #[error("malformed body: {0}")]
    Protocol(#[from] ProtocolError),

    /// The push carries more events than the server accepts at once.
    #[error("batch too large: {events} events, at most {max} accepted")]
    BatchTooLarge {
        /// Events in the request.
        events: usize,
        /// Configured limit.
        max: usize,
    },

    /// Bad configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::BatchTooLarge { .. } => STATUS_PAYLOAD_TOO_LARGE,
            ServerError::InvalidRequest(_) | ServerError::Protocol(_) => 400,
            ServerError::Config(_) | ServerError::Io(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }
}
