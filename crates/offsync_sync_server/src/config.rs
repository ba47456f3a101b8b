//! Server configuration.

use crate::error::{ServerError, ServerResult};
use std::net::SocketAddr;

/// Environment variable holding the bind address.
pub const ADDR_ENV: &str = "OFFSYNC_SERVER_ADDR";

/// Environment variable holding the push batch limit.
pub const MAX_BATCH_ENV: &str = "OFFSYNC_SERVER_MAX_BATCH";

/// Environment variable holding the request body limit in bytes.
pub const MAX_BODY_ENV: &str = "OFFSYNC_SERVER_MAX_BODY";

/// Default request body limit.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum events accepted in one push.
    pub max_push_batch: usize,
    /// Largest request body accepted, in bytes. Larger pushes get 413.
    pub max_body_bytes: usize,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_push_batch: 500,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Sets the maximum push batch size.
    pub fn with_max_push_batch(mut self, size: usize) -> Self {
        self.max_push_batch = size.max(1);
        self
    }

    /// Sets the request body limit.
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes.max(1);
        self
    }

    /// Reads overrides from the environment on top of the defaults.
    pub fn from_env() -> ServerResult<Self> {
        let mut config = Self::default();
        if let Ok(addr) = std::env::var(ADDR_ENV) {
            config.bind_addr = addr
                .parse()
                .map_err(|_| ServerError::Config(format!("{ADDR_ENV}={addr} is not an address")))?;
        }
        if let Ok(batch) = std::env::var(MAX_BATCH_ENV) {
            let size = batch
                .parse()
                .map_err(|_| ServerError::Config(format!("{MAX_BATCH_ENV}={batch} is not a number")))?;
            config = config.with_max_push_batch(size);
        }
        if let Ok(body) = std::env::var(MAX_BODY_ENV) {
            let bytes = body
                .parse()
                .map_err(|_| ServerError::Config(format!("{MAX_BODY_ENV}={body} is not a number")))?;
            config = config.with_max_body_bytes(bytes);
        }
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}
