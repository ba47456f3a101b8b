//! In-memory log for tests.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An in-memory byte log.
///
/// Clones share the same buffer, so a test can keep a handle, drop the store
/// that owns the other clone (a simulated process kill) and reopen a new store
/// over the surviving bytes.
///
/// ```rust
/// use offsync_storage::{InMemoryBackend, StorageBackend};
///
/// let disk = InMemoryBackend::new();
/// let mut writer = disk.clone();
/// writer.append(b"abc").unwrap();
/// drop(writer);
/// assert_eq!(disk.data(), b"abc");
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryBackend {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log holding `data`.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            fail_writes: Arc::default(),
        }
    }

    /// Copy of the current content.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Makes every subsequent write fail with [`StorageError::WriteRefused`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteRefused("injected write failure".into()));
        }
        Ok(())
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);
        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        Ok(data[offset as usize..end as usize].to_vec())
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        self.check_writable()?;
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.check_writable()
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.check_writable()
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.check_writable()?;
        let mut data = self.data.write();
        let size = data.len() as u64;
        if new_size > size {
            return Err(StorageError::InvalidTruncate {
                requested: new_size,
                size,
            });
        }
        data.truncate(new_size as usize);
        Ok(())
    }

    fn replace(&mut self, bytes: &[u8]) -> StorageResult<()> {
        self.check_writable()?;
        *self.data.write() = bytes.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_returns_offsets() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"ab").unwrap(), 0);
        assert_eq!(backend.append(b"cd").unwrap(), 2);
        assert_eq!(backend.size().unwrap(), 4);
        assert_eq!(backend.read_at(1, 2).unwrap(), b"bc");
    }

    #[test]
    fn clones_share_bytes() {
        let original = InMemoryBackend::new();
        let mut clone = original.clone();
        clone.append(b"shared").unwrap();
        assert_eq!(original.data(), b"shared");
    }

    #[test]
    fn injected_failure_refuses_writes_but_allows_reads() {
        let mut backend = InMemoryBackend::with_data(b"existing".to_vec());
        backend.set_fail_writes(true);

        assert!(matches!(
            backend.append(b"x"),
            Err(StorageError::WriteRefused(_))
        ));
        assert_eq!(backend.read_all().unwrap(), b"existing");

        backend.set_fail_writes(false);
        backend.append(b"!").unwrap();
        assert_eq!(backend.data(), b"existing!");
    }

    #[test]
    fn replace_and_truncate() {
        let mut backend = InMemoryBackend::with_data(b"0123456789".to_vec());
        backend.truncate(3).unwrap();
        assert_eq!(backend.data(), b"012");

        backend.replace(b"fresh").unwrap();
        assert_eq!(backend.data(), b"fresh");
    }

    #[test]
    fn read_out_of_bounds() {
        let backend = InMemoryBackend::with_data(vec![1, 2, 3]);
        assert!(matches!(
            backend.read_at(2, 2),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }
}
