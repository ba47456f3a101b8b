//! Commit log.
//!
//! Every transaction is one CRC-checked frame appended to the log. On open
//! the frames are replayed in order to rebuild collections, indexes, the
//! outbox and the local clock. Compaction rewrites the log as a single
//! snapshot frame.

mod frame;
mod writer;

pub use frame::{compute_crc32, encode_frame, Commit, LogEntry, Snapshot, WriteOp, LOG_MAGIC, LOG_VERSION};
pub use writer::CommitLog;
