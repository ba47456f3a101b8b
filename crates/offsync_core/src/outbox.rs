//! In-memory view of the outbox.
//!
//! Events are ordered by `(timestamp, commit order)`. The commit order is
//! assigned while the log is replayed, so it is stable across restarts and
//! breaks ties between events that share a timestamp.

use crate::event::{EventStatus, SyncEvent};
use offsync_sync_protocol::EventId;
use std::collections::{BTreeMap, HashMap};

type OrderKey = (u64, u64);

#[derive(Debug, Clone)]
struct Slot {
    event: SyncEvent,
    key: OrderKey,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Outbox {
    slots: HashMap<EventId, Slot>,
    order: BTreeMap<OrderKey, EventId>,
    pending: BTreeMap<OrderKey, EventId>,
    pending_per_record: HashMap<(String, String), usize>,
    failed: usize,
    next_seq: u64,
}

fn record_key(event: &SyncEvent) -> (String, String) {
    (event.kind.collection.clone(), event.record_id.clone())
}

impl Outbox {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn contains(&self, id: &EventId) -> bool {
        self.slots.contains_key(id)
    }

    pub(crate) fn get(&self, id: &EventId) -> Option<&SyncEvent> {
        self.slots.get(id).map(|slot| &slot.event)
    }

    /// Inserts an event. Returns false, leaving the outbox untouched, if
    /// the id is already present.
    pub(crate) fn insert(&mut self, event: SyncEvent) -> bool {
        if self.slots.contains_key(&event.id) {
            return false;
        }
        let key = (event.timestamp, self.next_seq);
        self.next_seq += 1;

        self.order.insert(key, event.id);
        match event.status {
            EventStatus::Pending => {
                self.pending.insert(key, event.id);
                *self.pending_per_record.entry(record_key(&event)).or_insert(0) += 1;
            }
            EventStatus::Failed { .. } => self.failed += 1,
            EventStatus::Synced => {}
        }
        self.slots.insert(event.id, Slot { event, key });
        true
    }

    /// Moves a pending event to a terminal status. Terminal events never
    /// change again; returns false for them and for unknown ids.
    pub(crate) fn settle(&mut self, id: &EventId, status: EventStatus) -> bool {
        if !status.is_terminal() {
            return false;
        }
        let Some(slot) = self.slots.get_mut(id) else {
            return false;
        };
        if slot.event.status.is_terminal() {
            return false;
        }

        self.pending.remove(&slot.key);
        let rk = record_key(&slot.event);
        if let Some(count) = self.pending_per_record.get_mut(&rk) {
            *count -= 1;
            if *count == 0 {
                self.pending_per_record.remove(&rk);
            }
        }
        if matches!(status, EventStatus::Failed { .. }) {
            self.failed += 1;
        }
        slot.event.status = status;
        true
    }

    /// Removes a synced event. Pending and failed events are kept.
    pub(crate) fn purge_synced(&mut self, id: &EventId) -> bool {
        match self.slots.get(id) {
            Some(slot) if slot.event.is_synced() => {
                let key = slot.key;
                self.order.remove(&key);
                self.slots.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Pending events in delivery order.
    pub(crate) fn pending(&self) -> impl Iterator<Item = &SyncEvent> {
        self.pending
            .values()
            .filter_map(|id| self.slots.get(id).map(|slot| &slot.event))
    }

    /// All events in delivery order.
    pub(crate) fn all(&self) -> impl Iterator<Item = &SyncEvent> {
        self.order
            .values()
            .filter_map(|id| self.slots.get(id).map(|slot| &slot.event))
    }

    /// Ids of every synced event.
    pub(crate) fn synced_ids(&self) -> Vec<EventId> {
        self.all().filter(|e| e.is_synced()).map(|e| e.id).collect()
    }

    pub(crate) fn pending_for_record(&self, collection: &str, record_id: &str) -> usize {
        self.pending_per_record
            .get(&(collection.to_string(), record_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn failed_len(&self) -> usize {
        self.failed
    }
}
