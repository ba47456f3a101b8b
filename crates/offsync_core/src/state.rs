//! Materialized store state rebuilt from the commit log.

use crate::collection::Collection;
use crate::index::IndexDefinition;
use crate::log::{Commit, LogEntry, Snapshot, WriteOp};
use crate::outbox::Outbox;
use std::collections::BTreeMap;

/// Collections plus outbox. Mutated only by applying log entries, so the
/// same log always yields the same state.
#[derive(Debug, Clone, Default)]
pub(crate) struct StoreState {
    pub(crate) collections: BTreeMap<String, Collection>,
    pub(crate) outbox: Outbox,
    index_defs: Vec<IndexDefinition>,
    pub(crate) last_sequence: u64,
    pub(crate) last_timestamp: u64,
}

impl StoreState {
    pub(crate) fn new(index_defs: Vec<IndexDefinition>) -> Self {
        Self {
            index_defs,
            ..Self::default()
        }
    }

    pub(crate) fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    fn collection_mut(&mut self, name: &str) -> &mut Collection {
        let defs = &self.index_defs;
        self.collections.entry(name.to_string()).or_insert_with(|| {
            let mut collection = Collection::new();
            for def in defs.iter().filter(|d| d.collection == name) {
                collection.add_index(&def.name, &def.field);
            }
            collection
        })
    }

    /// Returns true if the index is declared, even before the collection
    /// has any records.
    pub(crate) fn index_declared(&self, collection: &str, name: &str) -> bool {
        self.index_defs
            .iter()
            .any(|d| d.collection == collection && d.name == name)
    }

    /// Registers an index and fills it from existing records.
    pub(crate) fn define_index(&mut self, def: IndexDefinition) {
        self.collection_mut(&def.collection)
            .add_index(&def.name, &def.field);
        self.index_defs.push(def);
    }

    pub(crate) fn apply_entry(&mut self, entry: LogEntry) {
        match entry {
            LogEntry::Commit(commit) => self.apply_commit(commit),
            LogEntry::Snapshot(snapshot) => self.restore(snapshot),
        }
    }

    pub(crate) fn apply_commit(&mut self, commit: Commit) {
        self.last_sequence = self.last_sequence.max(commit.sequence);
        for op in commit.ops {
            self.apply(op);
        }
    }

    fn apply(&mut self, op: WriteOp) {
        match op {
            WriteOp::Put { collection, record } => {
                self.last_timestamp = self.last_timestamp.max(record.updated_at);
                self.collection_mut(&collection).put(record);
            }
            WriteOp::Delete { collection, id } => {
                if let Some(c) = self.collections.get_mut(&collection) {
                    c.remove(&id);
                }
            }
            WriteOp::Enqueue { event } => {
                self.last_timestamp = self.last_timestamp.max(event.timestamp);
                self.outbox.insert(event);
            }
            WriteOp::Settle { id, status } => {
                self.outbox.settle(&id, status);
            }
            WriteOp::MarkRecordSynced { collection, id } => {
                if let Some(c) = self.collections.get_mut(&collection) {
                    c.mark_synced(&id);
                }
            }
            WriteOp::Purge { ids } => {
                for id in &ids {
                    self.outbox.purge_synced(id);
                }
            }
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        let defs = std::mem::take(&mut self.index_defs);
        *self = Self::new(defs);
        self.last_sequence = snapshot.sequence;
        self.last_timestamp = snapshot.clock;
        for (name, records) in snapshot.collections {
            let collection = self.collection_mut(&name);
            for record in records {
                collection.put(record);
            }
        }
        for event in snapshot.events {
            self.outbox.insert(event);
        }
    }

    pub(crate) fn snapshot(&self, clock: u64) -> Snapshot {
        Snapshot {
            sequence: self.last_sequence,
            clock: clock.max(self.last_timestamp),
            collections: self
                .collections
                .iter()
                .filter(|(_, c)| c.len() > 0)
                .map(|(name, c)| (name.clone(), c.records().cloned().collect()))
                .collect(),
            events: self.outbox.all().cloned().collect(),
        }
    }
}
