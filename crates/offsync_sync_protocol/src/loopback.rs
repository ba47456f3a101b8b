//! In-process request handling, for running a remote without a socket.

use std::fmt;

/// HTTP status a remote answers when a request body is too large.
pub const STATUS_PAYLOAD_TOO_LARGE: u16 = 413;

/// A non-success answer from a remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReply {
    /// HTTP status code.
    pub status: u16,
    /// Response body, as text.
    pub message: String,
}

impl ErrorReply {
    /// Creates a reply.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Returns true if the remote refused the body as too large.
    pub fn is_payload_too_large(&self) -> bool {
        self.status == STATUS_PAYLOAD_TOO_LARGE
    }
}

impl fmt::Display for ErrorReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "remote returned HTTP {}: {}", self.status, self.message)
    }
}

/// A remote that can answer POST requests in process.
pub trait LoopbackServer {
    /// Handles a POST to `path` and returns the response body.
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, ErrorReply>;
}
