//! Outbox events.

use offsync_sync_protocol::{EventEnvelope, EventId, MutationKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the collection that holds sync events. Record writes to it are
/// refused.
pub const EVENTS_COLLECTION: &str = "sync_events";

/// Delivery state of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EventStatus {
    /// Waiting to be pushed.
    Pending,
    /// Acknowledged by the remote.
    Synced,
    /// Rejected by the remote. Kept for inspection, never retried.
    Failed {
        /// Reason given by the remote.
        reason: String,
    },
}

impl EventStatus {
    /// Returns true once the event left the pending set.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EventStatus::Pending)
    }

    /// Short lowercase label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Synced => "synced",
            EventStatus::Failed { .. } => "failed",
        }
    }
}

/// One mutation waiting for, or past, delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Idempotency key.
    pub id: EventId,
    /// Mutation op and collection.
    pub kind: MutationKind,
    /// Mutated record.
    pub record_id: String,
    /// Record fields for create/update, `null` for delete.
    pub payload: Value,
    /// Local clock value at enqueue time.
    pub timestamp: u64,
    /// Delivery state.
    pub status: EventStatus,
}

impl SyncEvent {
    /// Creates a pending event with a fresh id.
    pub fn new(kind: MutationKind, record_id: impl Into<String>, payload: Value, timestamp: u64) -> Self {
        Self {
            id: EventId::new(),
            kind,
            record_id: record_id.into(),
            payload,
            timestamp,
            status: EventStatus::Pending,
        }
    }

    /// Returns true if the event still needs delivery.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == EventStatus::Pending
    }

    /// Returns true if the remote acknowledged the event.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.status == EventStatus::Synced
    }

    /// Wire form sent to the remote.
    #[must_use]
    pub fn to_envelope(&self) -> EventEnvelope {
        EventEnvelope {
            id: self.id,
            kind: self.kind.clone(),
            record_id: self.record_id.clone(),
            payload: self.payload.clone(),
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_events_are_pending() {
        let event = SyncEvent::new(MutationKind::create("clients"), "c-1", json!({}), 1);
        assert!(event.is_pending());
        assert!(!event.status.is_terminal());
    }

    #[test]
    fn envelope_carries_identity() {
        let event = SyncEvent::new(MutationKind::delete("clients"), "c-1", Value::Null, 9);
        let envelope = event.to_envelope();
        assert_eq!(envelope.id, event.id);
        assert_eq!(envelope.record_id, "c-1");
        assert_eq!(envelope.timestamp, 9);
    }

    #[test]
    fn status_labels() {
        assert_eq!(EventStatus::Pending.label(), "pending");
        assert_eq!(EventStatus::Synced.label(), "synced");
        let failed = EventStatus::Failed { reason: "bad".into() };
        assert_eq!(failed.label(), "failed");
        assert!(failed.is_terminal());
    }
}
