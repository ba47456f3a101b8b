//! # offsync sync engine
//!
//! Drains the local outbox of an [`offsync_core::Database`] to a remote.
//!
//! This crate provides:
//! - [`SyncEngine`]: one attempt at a time, ordered chunked push, per-event
//!   ack/reject settlement, exponential backoff on transient failure
//! - [`ConnectivityMonitor`]: reachability level plus online edges
//! - [`SyncScheduler`]: background task wiring triggers to the engine
//! - [`StatusReporter`]: read-only [`SyncStatus`] with change notification
//! - Transports: [`HttpTransport`] over `reqwest`, [`MockTransport`] for tests
//!
//! ## Key Invariants
//!
//! - Domain writes never wait on the network
//! - An event leaves the pending set only on an explicit ack or reject
//! - A timeout or missing verdict leaves events pending
//! - Events are sent in `(timestamp, id)` order, across attempts too
//!
//! ```no_run
//! use offsync_core::Database;
//! use offsync_sync_engine::{
//!     ConnectivityMonitor, HttpTransport, ReqwestClient, SyncConfig, SyncEngine, SyncScheduler,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Arc::new(Database::open(std::path::Path::new("front-desk.db"))?);
//! let config = SyncConfig::new("front-desk-1", "https://sync.example.com");
//! let transport = HttpTransport::new(&config.remote_url, ReqwestClient::new());
//! let engine = Arc::new(SyncEngine::new(config, transport, Arc::clone(&db)));
//!
//! let monitor = Arc::new(ConnectivityMonitor::new(true));
//! let handle = SyncScheduler::spawn(Arc::clone(&engine), monitor);
//!
//! db.put("clients", "c-1", serde_json::json!({"name": "Ana"}))?;
//! let outcome = handle.force_sync().await?;
//! println!("acknowledged {}", outcome.acknowledged);
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connectivity;
mod engine;
mod error;
mod http;
mod scheduler;
mod state;
mod status;
mod store;
mod transport;

pub use config::{RetryConfig, SyncConfig};
pub use connectivity::{ConnectivityMonitor, ConnectivityProbe, TcpProbe};
pub use engine::{SyncEngine, TOO_LARGE_REASON};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpError, HttpTransport, LoopbackClient, ReqwestClient};
pub use offsync_sync_protocol::{ErrorReply, LoopbackServer};
pub use scheduler::{SyncHandle, SyncScheduler};
pub use state::{SyncOutcome, SyncState};
pub use status::{StatusReporter, SyncStatus};
pub use store::OutboxStore;
pub use transport::{MockStep, MockTransport, SyncTransport};
