//! `POST /sync` request and response bodies.

use crate::codec::{from_cbor, to_cbor};
use crate::error::ProtocolResult;
use crate::event::{EventEnvelope, EventId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A batch of events pushed by one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Device that owns the outbox.
    pub device_id: String,
    /// Events in the order they must be applied.
    pub events: Vec<EventEnvelope>,
}

impl PushRequest {
    /// Creates a push request.
    pub fn new(device_id: impl Into<String>, events: Vec<EventEnvelope>) -> Self {
        Self {
            device_id: device_id.into(),
            events,
        }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        from_cbor(bytes)
    }
}

/// Per-event verdict of the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckStatus {
    /// Applied, or already applied earlier under the same id.
    #[serde(rename = "ACK")]
    Ack,
    /// Permanently invalid; retrying will not help.
    #[serde(rename = "REJECT")]
    Reject,
}

/// Outcome of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResult {
    /// The event id this result answers.
    pub id: EventId,
    /// Verdict.
    pub status: AckStatus,
    /// Why the event was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EventResult {
    /// An acknowledgement.
    #[must_use]
    pub const fn ack(id: EventId) -> Self {
        Self {
            id,
            status: AckStatus::Ack,
            reason: None,
        }
    }

    /// A rejection.
    pub fn reject(id: EventId, reason: impl Into<String>) -> Self {
        Self {
            id,
            status: AckStatus::Reject,
            reason: Some(reason.into()),
        }
    }
}

/// Per-id status list returned by the remote.
///
/// Ids of the request that are missing here got no response and stay
/// pending on the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    /// One entry per answered event.
    pub results: Vec<EventResult>,
}

impl PushResponse {
    /// Creates a response.
    #[must_use]
    pub const fn new(results: Vec<EventResult>) -> Self {
        Self { results }
    }

    /// Indexes results by event id. Later duplicates win.
    #[must_use]
    pub fn by_id(&self) -> HashMap<EventId, &EventResult> {
        self.results.iter().map(|r| (r.id, r)).collect()
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        from_cbor(bytes)
    }
}
