//! Append-only commit log on top of a storage backend.

use crate::error::{CoreError, CoreResult};
use crate::log::frame::{decode_frame, encode_frame, Decoded, LogEntry, LOG_MAGIC};
use offsync_storage::StorageBackend;
use tracing::{debug, warn};

/// Writes and replays commit frames.
///
/// A commit is durable once [`append`](Self::append) returns. If any step
/// of the append fails the log is truncated back to its previous size, so
/// a commit that reported an error never reappears after a restart.
pub struct CommitLog {
    backend: Box<dyn StorageBackend>,
    sync_on_commit: bool,
}

impl CommitLog {
    /// Wraps a backend.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend,
            sync_on_commit,
        }
    }

    /// Reads every entry, cutting off a torn tail.
    ///
    /// A crash during an append can leave a partial or garbled last frame.
    /// That tail is truncated and reported at `warn` level. A damaged frame
    /// followed by a valid one is real corruption: the open fails and the
    /// log is left untouched.
    pub fn recover(&mut self) -> CoreResult<Vec<LogEntry>> {
        let data = self.backend.read_all()?;
        let mut entries = Vec::new();
        let mut offset = 0usize;

        while offset < data.len() {
            match decode_frame(&data[offset..]) {
                Decoded::Entry(entry, len) => {
                    entries.push(entry);
                    offset += len;
                }
                Decoded::Incomplete => {
                    self.end_at(&data, offset, "incomplete frame")?;
                    break;
                }
                Decoded::Damaged { reason, len } => {
                    if len.is_some_and(|len| offset + len < data.len()) {
                        return Err(CoreError::log_corruption(offset as u64, reason));
                    }
                    self.end_at(&data, offset, &reason)?;
                    break;
                }
            }
        }

        debug!(entries = entries.len(), bytes = offset, "commit log replayed");
        Ok(entries)
    }

    /// Treats `offset` as the end of the log, unless a valid frame follows.
    fn end_at(&mut self, data: &[u8], offset: usize, reason: &str) -> CoreResult<()> {
        if let Some(next) = next_valid_frame(data, offset + 1) {
            return Err(CoreError::log_corruption(
                offset as u64,
                format!("{reason}, valid frame follows at offset {next}"),
            ));
        }
        self.cut_tail(offset, data.len(), reason)
    }

    fn cut_tail(&mut self, offset: usize, size: usize, reason: &str) -> CoreResult<()> {
        warn!(
            offset,
            discarded = size - offset,
            reason,
            "discarding torn tail of commit log"
        );
        self.backend.truncate(offset as u64)?;
        self.backend.sync()?;
        Ok(())
    }

    /// Appends one entry and makes it durable.
    ///
    /// Returns the offset of the frame.
    pub fn append(&mut self, entry: &LogEntry) -> CoreResult<u64> {
        let frame = encode_frame(entry)?;
        let before = self.backend.size()?;

        let result = self.backend.append(&frame).and_then(|offset| {
            if self.sync_on_commit {
                self.backend.sync()?;
            } else {
                self.backend.flush()?;
            }
            Ok(offset)
        });

        match result {
            Ok(offset) => Ok(offset),
            Err(e) => {
                if let Err(undo) = self.backend.truncate(before) {
                    warn!(error = %undo, "could not roll back failed commit");
                }
                Err(e.into())
            }
        }
    }

    /// Atomically replaces the whole log with a single entry.
    pub fn replace(&mut self, entry: &LogEntry) -> CoreResult<()> {
        let frame = encode_frame(entry)?;
        self.backend.replace(&frame)?;
        Ok(())
    }

    /// Current log size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }
}

/// Offset of the first decodable frame at or after `from`.
fn next_valid_frame(data: &[u8], from: usize) -> Option<usize> {
    let mut start = from;
    while start < data.len() {
        let at = start + data[start..].windows(LOG_MAGIC.len()).position(|w| w == LOG_MAGIC)?;
        if matches!(decode_frame(&data[at..]), Decoded::Entry(..)) {
            return Some(at);
        }
        start = at + 1;
    }
    None
}

impl std::fmt::Debug for CommitLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitLog")
            .field("sync_on_commit", &self.sync_on_commit)
            .finish_non_exhaustive()
    }
}
