//! In-memory view of one collection.

use crate::index::SecondaryIndex;
use crate::record::Record;
use std::collections::{BTreeMap, HashMap};

/// Records of one collection with their secondary indexes.
#[derive(Debug, Clone, Default)]
pub(crate) struct Collection {
    records: BTreeMap<String, Record>,
    indexes: HashMap<String, SecondaryIndex>,
}

impl Collection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds an index and fills it from the current records.
    pub(crate) fn add_index(&mut self, name: &str, field: &str) {
        let mut index = SecondaryIndex::new(field);
        for record in self.records.values() {
            index.insert(record);
        }
        self.indexes.insert(name.to_string(), index);
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub(crate) fn put(&mut self, record: Record) {
        if let Some(old) = self.records.get(&record.id) {
            for index in self.indexes.values_mut() {
                index.remove(old);
            }
        }
        for index in self.indexes.values_mut() {
            index.insert(&record);
        }
        self.records.insert(record.id.clone(), record);
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Record> {
        let old = self.records.remove(id)?;
        for index in self.indexes.values_mut() {
            index.remove(&old);
        }
        Some(old)
    }

    /// Flags a record as held by the remote. Returns false if absent.
    pub(crate) fn mark_synced(&mut self, id: &str) -> bool {
        match self.records.get_mut(id) {
            Some(record) => {
                record.synced = true;
                true
            }
            None => false,
        }
    }

    /// Records whose indexed field equals `key`, or `None` if the index
    /// does not exist.
    pub(crate) fn by_index(&self, name: &str, key: &str) -> Option<Vec<Record>> {
        let index = self.indexes.get(name)?;
        Some(
            index
                .lookup(key)
                .filter_map(|id| self.records.get(id))
                .cloned()
                .collect(),
        )
    }
}
