//! Atomic multi-collection writes.

use crate::clock::LocalClock;
use crate::error::{CoreError, CoreResult};
use crate::event::{SyncEvent, EVENTS_COLLECTION};
use crate::log::WriteOp;
use crate::record::Record;
use crate::state::StoreState;
use offsync_sync_protocol::{EventId, MutationKind, MutationOp};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A write transaction over a declared set of collections.
///
/// Every record mutation staged here is paired with its outbox event, and
/// both land in the same commit. Nothing is visible to other readers until
/// the closure passed to [`Database::transaction`](crate::Database::transaction)
/// returns `Ok`. Returning `Err` discards all staged writes.
///
/// Reads through the transaction see its own staged writes.
pub struct Transaction<'a> {
    state: &'a StoreState,
    clock: &'a mut LocalClock,
    scope: BTreeSet<String>,
    ops: Vec<WriteOp>,
    staged: HashMap<(String, String), Option<Record>>,
    staged_events: HashSet<EventId>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(state: &'a StoreState, clock: &'a mut LocalClock, scope: &[&str]) -> Self {
        Self {
            state,
            clock,
            scope: scope.iter().map(|s| (*s).to_string()).collect(),
            ops: Vec::new(),
            staged: HashMap::new(),
            staged_events: HashSet::new(),
        }
    }

    pub(crate) fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    fn check_collection(&self, collection: &str) -> CoreResult<()> {
        if collection == EVENTS_COLLECTION {
            return Err(CoreError::ReservedCollection(collection.to_string()));
        }
        if collection.is_empty() {
            return Err(CoreError::invalid_operation("collection name is empty"));
        }
        if !self.scope.contains(collection) {
            return Err(CoreError::CollectionNotInScope {
                collection: collection.to_string(),
            });
        }
        Ok(())
    }

    /// Reads a record, including writes staged in this transaction.
    #[must_use]
    pub fn get(&self, collection: &str, id: &str) -> Option<Record> {
        if let Some(staged) = self.staged.get(&(collection.to_string(), id.to_string())) {
            return staged.clone();
        }
        self.state
            .collection(collection)
            .and_then(|c| c.get(id))
            .cloned()
    }

    fn exists(&self, collection: &str, id: &str) -> bool {
        self.get(collection, id).is_some()
    }

    /// Creates or replaces a record. Returns the id of its event.
    pub fn put(&mut self, collection: &str, id: &str, payload: Value) -> CoreResult<EventId> {
        let op = if self.exists(collection, id) {
            MutationOp::Update
        } else {
            MutationOp::Create
        };
        self.mutate(collection, op, id, payload)
    }

    /// Creates a record that must not exist yet.
    pub fn create(&mut self, collection: &str, id: &str, payload: Value) -> CoreResult<EventId> {
        self.mutate(collection, MutationOp::Create, id, payload)
    }

    /// Replaces a record that must exist.
    pub fn update(&mut self, collection: &str, id: &str, payload: Value) -> CoreResult<EventId> {
        self.mutate(collection, MutationOp::Update, id, payload)
    }

    /// Deletes a record that must exist.
    pub fn delete(&mut self, collection: &str, id: &str) -> CoreResult<EventId> {
        self.mutate(collection, MutationOp::Delete, id, Value::Null)
    }

    /// Applies a mutation and enqueues its event.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` for a create of an existing record
    /// - `EntityNotFound` for an update or delete of a missing record
    pub fn mutate(
        &mut self,
        collection: &str,
        op: MutationOp,
        id: &str,
        payload: Value,
    ) -> CoreResult<EventId> {
        self.check_collection(collection)?;
        let exists = self.exists(collection, id);
        match op {
            MutationOp::Create if exists => {
                return Err(CoreError::invalid_operation(format!(
                    "record {id} already exists in {collection}"
                )))
            }
            MutationOp::Update | MutationOp::Delete if !exists => {
                return Err(CoreError::not_found(collection, id))
            }
            _ => {}
        }

        let payload = if op.has_fields() { payload } else { Value::Null };
        let timestamp = self.clock.tick();
        let event = SyncEvent::new(MutationKind::new(op, collection), id, payload, timestamp);
        let event_id = event.id;
        self.stage(event);
        Ok(event_id)
    }

    /// Enqueues a prebuilt pending event and applies its mutation.
    ///
    /// Returns `false`, staging nothing, if an event with the same id is
    /// already in the outbox. A delete event for a missing record only
    /// enqueues the event.
    pub fn append_event(&mut self, event: SyncEvent) -> CoreResult<bool> {
        if !event.is_pending() {
            return Err(CoreError::invalid_operation(
                "only pending events can be appended",
            ));
        }
        if self.state.outbox.contains(&event.id) || self.staged_events.contains(&event.id) {
            return Ok(false);
        }
        self.check_collection(&event.kind.collection)?;
        self.clock.observe(event.timestamp);
        self.stage(event);
        Ok(true)
    }

    fn stage(&mut self, event: SyncEvent) {
        let collection = event.kind.collection.clone();
        let key = (collection.clone(), event.record_id.clone());
        match event.kind.op {
            MutationOp::Create | MutationOp::Update => {
                let record = Record::new(event.record_id.clone(), event.payload.clone(), event.timestamp);
                self.ops.push(WriteOp::Put {
                    collection,
                    record: record.clone(),
                });
                self.staged.insert(key, Some(record));
            }
            MutationOp::Delete => {
                self.ops.push(WriteOp::Delete {
                    collection,
                    id: event.record_id.clone(),
                });
                self.staged.insert(key, None);
            }
        }
        self.staged_events.insert(event.id);
        self.ops.push(WriteOp::Enqueue { event });
    }

    /// Number of events staged so far.
    #[must_use]
    pub fn staged_events(&self) -> usize {
        self.staged_events.len()
    }
}
