//! offsync reference sync server.
//!
//! # Configuration
//!
//! Environment variables:
//! - `OFFSYNC_SERVER_ADDR`: address to bind (default: 127.0.0.1:8080)
//! - `OFFSYNC_SERVER_MAX_BATCH`: events accepted per push (default: 500)
//! - `OFFSYNC_SERVER_MAX_BODY`: request body limit in bytes (default: 2 MiB)
//! - `RUST_LOG`: log filter (default: `info`)

use offsync_sync_server::{serve, ServerConfig, SyncServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("offsync_sync_server=info,tower_http=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        max_push_batch = config.max_push_batch,
        max_body_bytes = config.max_body_bytes,
        "starting sync server"
    );
    serve(SyncServer::new(config)).await?;
    Ok(())
}
