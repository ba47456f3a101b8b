//! Records stored in collections.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A domain record.
///
/// `synced` is false from the moment the record is written locally until
/// the remote has acknowledged the latest event for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Id, unique within its collection.
    pub id: String,
    /// Record fields.
    pub payload: Value,
    /// Local clock value of the last write.
    pub updated_at: u64,
    /// Whether the remote holds this version.
    pub synced: bool,
}

impl Record {
    /// Creates an unsynced record.
    pub fn new(id: impl Into<String>, payload: Value, updated_at: u64) -> Self {
        Self {
            id: id.into(),
            payload,
            updated_at,
            synced: false,
        }
    }

    /// Returns a top-level payload field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.as_object().and_then(|fields| fields.get(name))
    }
}
