//! Secondary indexes over top-level payload fields.
//!
//! Indexes are not persisted. They are declared in [`Config`](crate::Config)
//! and rebuilt while the log is replayed on open.

use crate::record::Record;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Declaration of an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Indexed collection.
    pub collection: String,
    /// Index name, unique within the collection.
    pub name: String,
    /// Top-level payload field whose value is the key.
    pub field: String,
}

impl IndexDefinition {
    /// Creates a definition.
    pub fn new(
        collection: impl Into<String>,
        name: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            name: name.into(),
            field: field.into(),
        }
    }
}

/// Converts a field value to its index key.
///
/// Strings index as themselves, other scalars by their JSON text. Arrays,
/// objects and `null` are not indexed.
#[must_use]
pub fn index_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Field value to record ids.
#[derive(Debug, Clone)]
pub(crate) struct SecondaryIndex {
    field: String,
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl SecondaryIndex {
    pub(crate) fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            entries: BTreeMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, record: &Record) {
        if let Some(key) = record.field(&self.field).and_then(index_key) {
            self.entries.entry(key).or_default().insert(record.id.clone());
        }
    }

    pub(crate) fn remove(&mut self, record: &Record) {
        if let Some(key) = record.field(&self.field).and_then(index_key) {
            if let Some(ids) = self.entries.get_mut(&key) {
                ids.remove(&record.id);
                if ids.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
    }

    pub(crate) fn lookup(&self, key: &str) -> impl Iterator<Item = &String> {
        self.entries.get(key).into_iter().flatten()
    }
}
