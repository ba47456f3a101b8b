//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding, decoding or parsing protocol values.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// CBOR encoding failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// CBOR decoding failed.
    #[error("decode error: {0}")]
    Decode(String),

    /// An event id string was not a UUID.
    #[error("invalid event id: {0}")]
    InvalidEventId(String),

    /// A mutation kind string was malformed.
    #[error("invalid mutation kind: {0}")]
    InvalidKind(String),
}
