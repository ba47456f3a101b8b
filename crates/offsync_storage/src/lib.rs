//! # offsync storage
//!
//! Byte-level log backends for the offsync record store.
//!
//! A backend is an **opaque append-only byte log**. It knows nothing about
//! commit frames, records or events; `offsync_core` owns the format.
//!
//! ## Backends
//!
//! - [`FileBackend`] - a single file, durable across restarts
//! - [`InMemoryBackend`] - shared in-memory buffer for tests, with write-fault
//!   injection to simulate disk or quota failures
//!
//! ## Example
//!
//! ```rust
//! use offsync_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"frame").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"frame");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
