//! The server's copy of every record, and the verdict of every event.

use offsync_sync_protocol::{AckStatus, EventEnvelope, EventId, EventResult, MutationOp};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Latest known state of one record.
///
/// A delete leaves a tombstone so an older create arriving late cannot
/// bring the record back.
#[derive(Debug, Clone, PartialEq)]
struct Version {
    payload: Option<Value>,
    timestamp: u64,
    event: EventId,
}

#[derive(Default)]
struct Inner {
    records: HashMap<(String, String), Version>,
    verdicts: HashMap<EventId, EventResult>,
    applied: Vec<EventId>,
}

/// Idempotent in-memory authority.
///
/// Conflict handling assumes last-writer-wins by event timestamp on the
/// server's copy: a mutation older than the stored version is
/// acknowledged but not applied. Ties go to the later arrival.
#[derive(Default)]
pub struct RecordAuthority {
    inner: RwLock<Inner>,
}

impl RecordAuthority {
    /// Creates an empty authority.
    pub fn new() -> Self {
        Self::default()
    }

    /// Verdict recorded for `id`, if the event was seen before.
    pub fn verdict(&self, id: &EventId) -> Option<EventResult> {
        self.inner.read().verdicts.get(id).cloned()
    }

    /// Validates and applies one event. A re-delivered id returns the
    /// verdict recorded the first time and changes nothing.
    pub fn apply(&self, event: &EventEnvelope) -> EventResult {
        let mut inner = self.inner.write();
        if let Some(previous) = inner.verdicts.get(&event.id) {
            debug!(event = %event.id, "duplicate delivery");
            return previous.clone();
        }

        let result = match validate(event) {
            Err(reason) => EventResult::reject(event.id, reason),
            Ok(()) => {
                inner.upsert(event);
                EventResult::ack(event.id)
            }
        };
        if result.status == AckStatus::Ack {
            inner.applied.push(event.id);
        }
        inner.verdicts.insert(event.id, result.clone());
        result
    }

    /// Current payload of a live record.
    pub fn record(&self, collection: &str, id: &str) -> Option<Value> {
        self.inner
            .read()
            .records
            .get(&(collection.to_string(), id.to_string()))
            .and_then(|v| v.payload.clone())
    }

    /// Id of the event that produced the stored version of a record,
    /// tombstones included.
    pub fn last_writer(&self, collection: &str, id: &str) -> Option<EventId> {
        self.inner
            .read()
            .records
            .get(&(collection.to_string(), id.to_string()))
            .map(|v| v.event)
    }

    /// Number of live records.
    pub fn record_count(&self) -> usize {
        self.inner
            .read()
            .records
            .values()
            .filter(|v| v.payload.is_some())
            .count()
    }

    /// Acknowledged event ids in arrival order.
    pub fn applied(&self) -> Vec<EventId> {
        self.inner.read().applied.clone()
    }

    /// Number of distinct event ids seen.
    pub fn event_count(&self) -> usize {
        self.inner.read().verdicts.len()
    }
}

impl Inner {
    fn upsert(&mut self, event: &EventEnvelope) {
        let key = (event.kind.collection.clone(), event.record_id.clone());
        if let Some(current) = self.records.get(&key) {
            if current.timestamp > event.timestamp {
                debug!(event = %event.id, record = %event.record_id, "stale write ignored");
                return;
            }
        }
        let payload = match event.kind.op {
            MutationOp::Create | MutationOp::Update => Some(event.payload.clone()),
            MutationOp::Delete => None,
        };
        self.records.insert(
            key,
            Version {
                payload,
                timestamp: event.timestamp,
                event: event.id,
            },
        );
    }
}

fn validate(event: &EventEnvelope) -> Result<(), String> {
    if event.kind.collection.trim().is_empty() {
        return Err("collection name is empty".into());
    }
    if event.record_id.trim().is_empty() {
        return Err("record id is missing".into());
    }
    if event.kind.op.has_fields() && !event.payload.is_object() {
        return Err(format!("{} payload must be an object", event.kind.op.as_str()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use offsync_sync_protocol::MutationKind;
    use serde_json::json;

    fn event(kind: MutationKind, record: &str, payload: Value, ts: u64) -> EventEnvelope {
        EventEnvelope {
            id: EventId::new(),
            kind,
            record_id: record.into(),
            payload,
            timestamp: ts,
        }
    }

    #[test]
    fn duplicate_id_is_applied_once() {
        let authority = RecordAuthority::new();
        let create = event(MutationKind::create("clients"), "c-1", json!({"n": 1}), 1);

        assert_eq!(authority.apply(&create).status, AckStatus::Ack);
        assert_eq!(authority.apply(&create).status, AckStatus::Ack);
        assert_eq!(authority.applied(), vec![create.id]);
        assert_eq!(authority.event_count(), 1);
    }

    #[test]
    fn rejection_is_remembered() {
        let authority = RecordAuthority::new();
        let bad = event(MutationKind::update("clients"), "c-1", json!(42), 1);

        let first = authority.apply(&bad);
        assert_eq!(first.status, AckStatus::Reject);
        assert_eq!(first.reason.as_deref(), Some("update payload must be an object"));
        assert_eq!(authority.apply(&bad), first);
        assert!(authority.applied().is_empty());
    }

    #[test]
    fn validation_rules() {
        let authority = RecordAuthority::new();
        let no_collection = event(MutationKind::create(""), "c-1", json!({}), 1);
        let no_record = event(MutationKind::create("clients"), " ", json!({}), 1);
        let delete_null = event(MutationKind::delete("clients"), "c-9", Value::Null, 1);

        assert_eq!(authority.apply(&no_collection).status, AckStatus::Reject);
        assert_eq!(authority.apply(&no_record).status, AckStatus::Reject);
        assert_eq!(authority.apply(&delete_null).status, AckStatus::Ack);
    }

    #[test]
    fn create_then_delete_leaves_no_record() {
        let authority = RecordAuthority::new();
        let create = event(MutationKind::create("clients"), "c-1", json!({"n": 1}), 1);
        let delete = event(MutationKind::delete("clients"), "c-1", Value::Null, 2);

        authority.apply(&create);
        assert_eq!(authority.apply(&delete).status, AckStatus::Ack);
        assert_eq!(authority.record("clients", "c-1"), None);
        assert_eq!(authority.last_writer("clients", "c-1"), Some(delete.id));
        assert_eq!(authority.record_count(), 0);
    }

    #[test]
    fn older_write_loses() {
        let authority = RecordAuthority::new();
        let newer = event(MutationKind::update("clients"), "c-1", json!({"n": 2}), 20);
        let older = event(MutationKind::update("clients"), "c-1", json!({"n": 1}), 10);

        authority.apply(&newer);
        assert_eq!(authority.apply(&older).status, AckStatus::Ack);
        assert_eq!(authority.record("clients", "c-1"), Some(json!({"n": 2})));
    }

    #[test]
    fn late_create_does_not_resurrect() {
        let authority = RecordAuthority::new();
        authority.apply(&event(MutationKind::delete("clients"), "c-1", Value::Null, 5));
        authority.apply(&event(MutationKind::create("clients"), "c-1", json!({}), 3));
        assert_eq!(authority.record("clients", "c-1"), None);
    }
}
