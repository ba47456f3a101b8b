//! Store facade and recovery.

use crate::clock::LocalClock;
use crate::config::Config;
use crate::dir::StoreDir;
use crate::error::{CoreError, CoreResult};
use crate::event::{EventStatus, SyncEvent};
use crate::index::IndexDefinition;
use crate::log::{Commit, CommitLog, LogEntry, WriteOp};
use crate::record::Record;
use crate::state::StoreState;
use crate::transaction::Transaction;
use offsync_storage::{FileBackend, InMemoryBackend, StorageBackend};
use offsync_sync_protocol::{EventId, MutationOp};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

struct Writer {
    log: CommitLog,
    clock: LocalClock,
    next_sequence: u64,
}

/// The durable record store and its outbox.
///
/// Records and sync events live in one commit log, so a record mutation
/// and its event are always durable together or not at all. On open the
/// log is replayed to rebuild collections, secondary indexes, the outbox
/// and the local clock.
///
/// # Opening a store
///
/// ```rust,ignore
/// use offsync_core::Database;
/// use std::path::Path;
///
/// let db = Database::open(Path::new("front_desk"))?;
/// db.put("clients", "c-1", serde_json::json!({"name": "Ana"}))?;
/// assert_eq!(db.pending_count(), 1);
/// ```
///
/// # Concurrency
///
/// Reads run concurrently. Writes are serialized by an internal writer
/// lock. The closure passed to [`transaction`](Self::transaction) runs
/// under that lock and must not call back into the same `Database`.
pub struct Database {
    config: Config,
    dir: Option<StoreDir>,
    writer: Mutex<Writer>,
    state: RwLock<StoreState>,
}

impl Database {
    /// Opens or creates a store in a directory with default configuration.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens or creates a store in a directory.
    ///
    /// # Errors
    ///
    /// - `DatabaseLocked` if another process has the store open
    /// - `LogCorruption` if a frame before the end of the log is damaged
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let backend = FileBackend::open(&dir.log_path())?;
        let mut db = Self::open_with_backend(Box::new(backend), config)?;
        db.dir = Some(dir);
        Ok(db)
    }

    /// Opens a store that lives only in memory.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_backend(Box::new(InMemoryBackend::new()), Config::default())
    }

    /// Opens a store over any backend, replaying whatever it holds.
    pub fn open_with_backend(backend: Box<dyn StorageBackend>, config: Config) -> CoreResult<Self> {
        let mut log = CommitLog::new(backend, config.sync_on_commit);
        let entries = log.recover()?;

        let mut state = StoreState::new(config.indexes.clone());
        for entry in entries {
            state.apply_entry(entry);
        }

        let mut clock = LocalClock::new();
        clock.observe(state.last_timestamp);

        info!(
            collections = state.collections.len(),
            events = state.outbox.len(),
            pending = state.outbox.pending_len(),
            sequence = state.last_sequence,
            "store opened"
        );

        Ok(Self {
            writer: Mutex::new(Writer {
                log,
                clock,
                next_sequence: state.last_sequence + 1,
            }),
            state: RwLock::new(state),
            config,
            dir: None,
        })
    }

    /// Store directory, or `None` for a backend-only store.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(StoreDir::path)
    }

    /// Configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Builds a commit under the writer lock, makes it durable, then
    /// publishes it. On any error the in-memory state is untouched.
    fn commit_with<R>(
        &self,
        build: impl FnOnce(&StoreState, &mut LocalClock) -> CoreResult<(Vec<WriteOp>, R)>,
    ) -> CoreResult<R> {
        let mut writer = self.writer.lock();
        let (ops, result) = {
            let state = self.state.read();
            build(&state, &mut writer.clock)?
        };
        if ops.is_empty() {
            return Ok(result);
        }

        let sequence = writer.next_sequence;
        let entry = LogEntry::Commit(Commit { sequence, ops });
        writer.log.append(&entry)?;
        writer.next_sequence += 1;
        self.state.write().apply_entry(entry);
        debug!(sequence, "commit durable");
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    /// Runs `f` as one atomic transaction over the given collections.
    ///
    /// The events collection is always implicitly in scope. If `f` returns
    /// an error nothing is written.
    pub fn transaction<F, R>(&self, scope: &[&str], f: F) -> CoreResult<R>
    where
        F: FnOnce(&mut Transaction<'_>) -> CoreResult<R>,
    {
        self.commit_with(|state, clock| {
            let mut txn = Transaction::new(state, clock, scope);
            let result = f(&mut txn)?;
            Ok((txn.into_ops(), result))
        })
    }

    /// Creates or replaces a record and enqueues its event.
    pub fn put(&self, collection: &str, id: &str, payload: Value) -> CoreResult<EventId> {
        self.transaction(&[collection], |txn| txn.put(collection, id, payload))
    }

    /// Deletes a record and enqueues its event.
    pub fn delete(&self, collection: &str, id: &str) -> CoreResult<EventId> {
        self.transaction(&[collection], |txn| txn.delete(collection, id))
    }

    /// Applies an explicit mutation and enqueues its event.
    pub fn record_mutation(
        &self,
        collection: &str,
        op: MutationOp,
        id: &str,
        payload: Value,
    ) -> CoreResult<EventId> {
        self.transaction(&[collection], |txn| txn.mutate(collection, op, id, payload))
    }

    /// Returns a record, if present.
    #[must_use]
    pub fn get(&self, collection: &str, id: &str) -> Option<Record> {
        self.state
            .read()
            .collection(collection)
            .and_then(|c| c.get(id))
            .cloned()
    }

    /// Returns every record of a collection ordered by id.
    #[must_use]
    pub fn get_all(&self, collection: &str) -> Vec<Record> {
        self.state
            .read()
            .collection(collection)
            .map(|c| c.records().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns records whose indexed field equals `key`.
    ///
    /// # Errors
    ///
    /// `IndexNotFound` if the index was never declared.
    pub fn get_all_by_index(&self, collection: &str, index: &str, key: &str) -> CoreResult<Vec<Record>> {
        let state = self.state.read();
        if let Some(found) = state.collection(collection).and_then(|c| c.by_index(index, key)) {
            return Ok(found);
        }
        if state.index_declared(collection, index) {
            return Ok(Vec::new());
        }
        Err(CoreError::IndexNotFound {
            collection: collection.to_string(),
            index: index.to_string(),
        })
    }

    /// Declares an index at runtime and fills it from existing records.
    ///
    /// Runtime indexes are not persisted; declare them in [`Config`] to
    /// have them rebuilt on every open.
    pub fn define_index(&self, collection: &str, name: &str, field: &str) -> CoreResult<()> {
        let _writer = self.writer.lock();
        let mut state = self.state.write();
        if state.index_declared(collection, name) {
            return Err(CoreError::invalid_operation(format!(
                "index {name} already defined on {collection}"
            )));
        }
        state.define_index(IndexDefinition::new(collection, name, field));
        Ok(())
    }

    /// Names of collections that have held records.
    #[must_use]
    pub fn collections(&self) -> Vec<String> {
        self.state.read().collections.keys().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Outbox
    // ------------------------------------------------------------------

    /// Enqueues a prebuilt pending event and applies its mutation.
    ///
    /// Returns `false` if an event with this id is already present; the
    /// store is then left untouched.
    pub fn append_event(&self, event: SyncEvent) -> CoreResult<bool> {
        let collection = event.kind.collection.clone();
        self.transaction(&[collection.as_str()], |txn| txn.append_event(event))
    }

    /// Pending events ordered by timestamp, ties broken by commit order.
    #[must_use]
    pub fn list_pending(&self) -> Vec<SyncEvent> {
        self.state.read().outbox.pending().cloned().collect()
    }

    /// Up to `limit` pending events in delivery order.
    #[must_use]
    pub fn list_pending_limit(&self, limit: usize) -> Vec<SyncEvent> {
        self.state
            .read()
            .outbox
            .pending()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Every event in the outbox, whatever its status, in delivery order.
    #[must_use]
    pub fn list_events(&self) -> Vec<SyncEvent> {
        self.state.read().outbox.all().cloned().collect()
    }

    /// Returns one event.
    #[must_use]
    pub fn get_event(&self, id: &EventId) -> Option<SyncEvent> {
        self.state.read().outbox.get(id).cloned()
    }

    /// Number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.read().outbox.pending_len()
    }

    /// Number of rejected events kept for inspection.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.state.read().outbox.failed_len()
    }

    /// Number of acknowledged events not yet cleared.
    #[must_use]
    pub fn synced_count(&self) -> usize {
        let state = self.state.read();
        state.outbox.len() - state.outbox.pending_len() - state.outbox.failed_len()
    }

    /// Number of events in the outbox.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.state.read().outbox.len()
    }

    /// Marks an event acknowledged by the remote.
    ///
    /// The mutated record is flagged synced in the same commit when no
    /// other pending event targets it and it has not been written since.
    /// Returns `false` if the event had already left the pending set.
    ///
    /// # Errors
    ///
    /// `EventNotFound` for an unknown id.
    pub fn mark_synced(&self, id: &EventId) -> CoreResult<bool> {
        self.commit_with(|state, _| {
            let event = state.outbox.get(id).ok_or(CoreError::EventNotFound(*id))?;
            if !event.is_pending() {
                return Ok((Vec::new(), false));
            }

            let mut ops = vec![WriteOp::Settle {
                id: *id,
                status: EventStatus::Synced,
            }];
            let collection = &event.kind.collection;
            let others = state
                .outbox
                .pending_for_record(collection, &event.record_id)
                .saturating_sub(1);
            let record = state.collection(collection).and_then(|c| c.get(&event.record_id));
            if let Some(record) = record {
                if others == 0 && !record.synced && record.updated_at <= event.timestamp {
                    ops.push(WriteOp::MarkRecordSynced {
                        collection: collection.clone(),
                        id: event.record_id.clone(),
                    });
                }
            }
            Ok((ops, true))
        })
    }

    /// Marks an event permanently rejected. It stays in the outbox for
    /// inspection and is never retried.
    ///
    /// # Errors
    ///
    /// `EventNotFound` for an unknown id.
    pub fn mark_failed(&self, id: &EventId, reason: &str) -> CoreResult<bool> {
        self.commit_with(|state, _| {
            let event = state.outbox.get(id).ok_or(CoreError::EventNotFound(*id))?;
            if !event.is_pending() {
                return Ok((Vec::new(), false));
            }
            let ops = vec![WriteOp::Settle {
                id: *id,
                status: EventStatus::Failed {
                    reason: reason.to_string(),
                },
            }];
            Ok((ops, true))
        })
    }

    /// Removes the given events if they are synced. Pending, failed and
    /// unknown ids are ignored. Returns how many were removed.
    pub fn delete_synced(&self, ids: &[EventId]) -> CoreResult<usize> {
        self.commit_with(|state, _| {
            let removable: BTreeSet<EventId> = ids
                .iter()
                .filter(|id| state.outbox.get(id).is_some_and(SyncEvent::is_synced))
                .copied()
                .collect();
            let count = removable.len();
            if count == 0 {
                return Ok((Vec::new(), 0));
            }
            let ops = vec![WriteOp::Purge {
                ids: removable.into_iter().collect(),
            }];
            Ok((ops, count))
        })
    }

    /// Removes every synced event. Returns how many were removed.
    pub fn clear_synced(&self) -> CoreResult<usize> {
        let ids = self.state.read().outbox.synced_ids();
        let removed = self.delete_synced(&ids)?;
        info!(removed, "cleared synced events");
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Rewrites the log as a single snapshot of the current state.
    pub fn compact(&self) -> CoreResult<()> {
        let mut writer = self.writer.lock();
        let before = writer.log.size()?;
        let snapshot = self.state.read().snapshot(writer.clock.last());
        writer.log.replace(&LogEntry::Snapshot(snapshot))?;
        info!(before, after = writer.log.size()?, "commit log compacted");
        Ok(())
    }

    /// Current log size in bytes.
    pub fn log_size(&self) -> CoreResult<u64> {
        self.writer.lock().log.size()
    }

    /// Sequence number of the last commit.
    #[must_use]
    pub fn last_sequence(&self) -> u64 {
        self.state.read().last_sequence
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path())
            .field("sequence", &self.last_sequence())
            .finish_non_exhaustive()
    }
}
