//! # offsync core
//!
//! Durable record store and outbox for offline-first applications.
//!
//! Every record mutation is written together with a sync event describing
//! it, in one atomic commit. The events wait in the outbox until the sync
//! engine has delivered them to the remote.
//!
//! ## Guarantees
//!
//! - A write that returns `Ok` survives a crash or restart
//! - A write that returns `Err` leaves nothing behind
//! - No record change is durable without its event, and no event without
//!   its record change
//! - Pending events are listed by local timestamp, ties broken by commit
//!   order
//!
//! ## Example
//!
//! ```rust
//! use offsync_core::Database;
//! use serde_json::json;
//!
//! let db = Database::open_in_memory().unwrap();
//! db.transaction(&["sales", "inventory"], |txn| {
//!     txn.put("sales", "s-1", json!({"sku": "mat-blue", "total": 30}))?;
//!     txn.put("inventory", "mat-blue", json!({"qty": 11}))?;
//!     Ok(())
//! })
//! .unwrap();
//!
//! assert_eq!(db.pending_count(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod collection;
mod config;
mod database;
mod dir;
mod error;
mod event;
mod index;
pub mod log;
mod outbox;
mod record;
mod state;
mod transaction;

pub use clock::LocalClock;
pub use config::Config;
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use event::{EventStatus, SyncEvent, EVENTS_COLLECTION};
pub use index::{index_key, IndexDefinition};
pub use record::Record;
pub use transaction::Transaction;

pub use offsync_sync_protocol::{EventId, MutationKind, MutationOp};
