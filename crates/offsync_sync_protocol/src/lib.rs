//! # offsync sync protocol
//!
//! Wire and data types shared by the sync client and the remote authority.
//!
//! This crate provides:
//! - [`EventId`], the idempotency key of every outbox event
//! - [`MutationKind`] (`create`/`update`/`delete` plus target collection)
//! - [`EventEnvelope`], one replayable mutation on the wire
//! - [`PushRequest`] / [`PushResponse`] for `POST /sync`
//! - CBOR encoding helpers
//! - [`LoopbackServer`], the seam for answering requests in process
//!
//! This is a pure protocol crate with no I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod event;
mod loopback;
mod messages;

pub use codec::{from_cbor, to_cbor, CBOR_CONTENT_TYPE};
pub use error::{ProtocolError, ProtocolResult};
pub use event::{EventEnvelope, EventId, MutationKind, MutationOp};
pub use loopback::{ErrorReply, LoopbackServer, STATUS_PAYLOAD_TOO_LARGE};
pub use messages::{AckStatus, EventResult, PushRequest, PushResponse};

/// Path of the batch push endpoint.
pub const SYNC_PATH: &str = "/sync";

/// Path of the health endpoint.
pub const HEALTH_PATH: &str = "/health";
