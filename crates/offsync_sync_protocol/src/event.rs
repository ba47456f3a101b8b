//! Mutation events.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Globally unique event identifier.
///
/// Generated when the event is enqueued and never changed afterwards. The
/// remote uses it as an idempotency key: a second delivery of the same id is
/// answered with the first outcome and not applied again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ProtocolError::InvalidEventId(s.to_string()))
    }
}

/// Kind of mutation carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOp {
    /// A record was created.
    Create,
    /// A record was updated.
    Update,
    /// A record was deleted.
    Delete,
}

impl MutationOp {
    /// Lowercase name used on the wire and in diagnostics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MutationOp::Create => "create",
            MutationOp::Update => "update",
            MutationOp::Delete => "delete",
        }
    }

    /// Returns true if the mutation carries record fields.
    #[must_use]
    pub const fn has_fields(&self) -> bool {
        matches!(self, MutationOp::Create | MutationOp::Update)
    }
}

impl FromStr for MutationOp {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        match s {
            "create" => Ok(MutationOp::Create),
            "update" => Ok(MutationOp::Update),
            "delete" => Ok(MutationOp::Delete),
            other => Err(ProtocolError::InvalidKind(other.to_string())),
        }
    }
}

/// The `type` of an event: mutation op plus target collection.
///
/// Displayed and parsed as `op:collection`, e.g. `create:clients`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutationKind {
    /// The mutation.
    pub op: MutationOp,
    /// The collection the mutated record belongs to.
    pub collection: String,
}

impl MutationKind {
    /// Creates a kind.
    pub fn new(op: MutationOp, collection: impl Into<String>) -> Self {
        Self {
            op,
            collection: collection.into(),
        }
    }

    /// Shorthand for a create on `collection`.
    pub fn create(collection: impl Into<String>) -> Self {
        Self::new(MutationOp::Create, collection)
    }

    /// Shorthand for an update on `collection`.
    pub fn update(collection: impl Into<String>) -> Self {
        Self::new(MutationOp::Update, collection)
    }

    /// Shorthand for a delete on `collection`.
    pub fn delete(collection: impl Into<String>) -> Self {
        Self::new(MutationOp::Delete, collection)
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.op.as_str(), self.collection)
    }
}

impl FromStr for MutationKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        let (op, collection) = s
            .split_once(':')
            .ok_or_else(|| ProtocolError::InvalidKind(s.to_string()))?;
        if collection.is_empty() {
            return Err(ProtocolError::InvalidKind(s.to_string()));
        }
        Ok(Self::new(op.parse()?, collection))
    }
}

/// One mutation as transmitted to the remote.
///
/// # Fields
///
/// - `id`: idempotency key
/// - `kind`: serialized as `type`
/// - `record_id`: the mutated record
/// - `payload`: record fields for create/update, `null` for delete
/// - `timestamp`: local ordering hint, not a global order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Idempotency key.
    pub id: EventId,
    /// Mutation kind.
    #[serde(rename = "type")]
    pub kind: MutationKind,
    /// Id of the mutated record.
    pub record_id: String,
    /// Replay data.
    pub payload: serde_json::Value,
    /// Local clock value at enqueue time.
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_are_unique() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn event_id_parse_and_display() {
        let id = EventId::new();
        let parsed: EventId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<EventId>().is_err());
    }

    #[test]
    fn mutation_kind_text_form() {
        let kind = MutationKind::create("clients");
        assert_eq!(kind.to_string(), "create:clients");
        assert_eq!("delete:sales".parse::<MutationKind>().unwrap(), MutationKind::delete("sales"));
        assert!("create".parse::<MutationKind>().is_err());
        assert!("create:".parse::<MutationKind>().is_err());
        assert!("upsert:clients".parse::<MutationKind>().is_err());
    }

    #[test]
    fn op_fields() {
        assert!(MutationOp::Create.has_fields());
        assert!(MutationOp::Update.has_fields());
        assert!(!MutationOp::Delete.has_fields());
    }

    #[test]
    fn envelope_uses_type_on_the_wire() {
        let envelope = EventEnvelope {
            id: EventId::new(),
            kind: MutationKind::update("checkins"),
            record_id: "c-1".into(),
            payload: serde_json::json!({"door": "north"}),
            timestamp: 7,
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"]["op"], "update");
        assert_eq!(json["type"]["collection"], "checkins");
        assert_eq!(json["timestamp"], 7);
    }
}
