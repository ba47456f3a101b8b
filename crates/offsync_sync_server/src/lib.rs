//! # offsync sync server
//!
//! Reference remote for the offsync push protocol.
//!
//! This crate provides:
//! - [`SyncServer`]: per-event `ACK`/`REJECT` verdicts, idempotent by event id
//! - [`RecordAuthority`]: the server's copy of every record
//! - [`router`]: axum routes for `POST /sync` and `GET /health`
//! - the `offsync-server` binary
//!
//! # Conflict handling
//!
//! Last writer by event timestamp wins on the server's copy. This is the
//! reference behavior only; a production remote may resolve differently.
//!
//! # Rejections
//!
//! An event is rejected when its collection name is empty, its record id
//! is missing, or a create/update payload is not a JSON object. A delete
//! of an unknown record is acknowledged as a no-op.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod authority;
mod config;
mod error;
mod router;
mod server;

pub use authority::RecordAuthority;
pub use config::{ServerConfig, ADDR_ENV, DEFAULT_MAX_BODY_BYTES, MAX_BATCH_ENV, MAX_BODY_ENV};
pub use error::{ServerError, ServerResult};
pub use router::{router, serve, serve_listener};
pub use server::SyncServer;
