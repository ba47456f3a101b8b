//! The engine's view of the local outbox.

use crate::error::SyncResult;
use offsync_core::{Database, EventId, SyncEvent};
use std::sync::Arc;

/// Outbox operations the sync engine needs.
///
/// Implemented for [`offsync_core::Database`]; tests can substitute their
/// own store to inject failures.
pub trait OutboxStore: Send + Sync {
    /// Pending events in delivery order.
    fn list_pending(&self) -> SyncResult<Vec<SyncEvent>>;

    /// Marks an event acknowledged, flipping its record's `synced` flag
    /// when no other pending event targets that record.
    fn mark_synced(&self, id: &EventId) -> SyncResult<()>;

    /// Marks an event permanently rejected.
    fn mark_failed(&self, id: &EventId, reason: &str) -> SyncResult<()>;

    /// Number of pending events.
    fn pending_count(&self) -> usize;

    /// Number of rejected events.
    fn failed_count(&self) -> usize;
}

impl OutboxStore for Database {
    fn list_pending(&self) -> SyncResult<Vec<SyncEvent>> {
        Ok(Database::list_pending(self))
    }

    fn mark_synced(&self, id: &EventId) -> SyncResult<()> {
        Database::mark_synced(self, id)?;
        Ok(())
    }

    fn mark_failed(&self, id: &EventId, reason: &str) -> SyncResult<()> {
        Database::mark_failed(self, id, reason)?;
        Ok(())
    }

    fn pending_count(&self) -> usize {
        Database::pending_count(self)
    }

    fn failed_count(&self) -> usize {
        Database::failed_count(self)
    }
}

impl<S: OutboxStore + ?Sized> OutboxStore for Arc<S> {
    fn list_pending(&self) -> SyncResult<Vec<SyncEvent>> {
        (**self).list_pending()
    }

    fn mark_synced(&self, id: &EventId) -> SyncResult<()> {
        (**self).mark_synced(id)
    }

    fn mark_failed(&self, id: &EventId, reason: &str) -> SyncResult<()> {
        (**self).mark_failed(id, reason)
    }

    fn pending_count(&self) -> usize {
        (**self).pending_count()
    }

    fn failed_count(&self) -> usize {
        (**self).failed_count()
    }
}
