//! In-memory backing store for testing.

use crate::backend::DirectoryBackingStore;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// An in-memory backing store.
///
/// Holds the last saved snapshot in memory. Suitable for:
/// - Unit tests
/// - Integration tests
/// - Directories that don't need to survive the process
///
/// # Example
///
/// ```rust
/// use syncdir_storage::{DirectoryBackingStore, InMemoryBackingStore};
///
/// let store = InMemoryBackingStore::new();
/// store.save(b"v1").unwrap();
/// store.save(b"v2").unwrap();
/// assert_eq!(store.load().unwrap().unwrap(), b"v2");
/// assert_eq!(store.save_count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackingStore {
    snapshot: RwLock<Option<Vec<u8>>>,
    saves: AtomicU64,
    closed: AtomicBool,
}

impl InMemoryBackingStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds a snapshot.
    ///
    /// Useful for testing load and recovery paths.
    #[must_use]
    pub fn with_snapshot(snapshot: Vec<u8>) -> Self {
        Self {
            snapshot: RwLock::new(Some(snapshot)),
            ..Self::default()
        }
    }

    /// Returns a copy of the stored snapshot without touching counters.
    #[must_use]
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.snapshot.read().clone()
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

impl DirectoryBackingStore for InMemoryBackingStore {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.snapshot.read().clone())
    }

    fn save(&self, snapshot: &[u8]) -> StorageResult<()> {
        self.ensure_open()?;
        *self.snapshot.write() = Some(snapshot.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryBackingStore::new();
        assert!(store.load().unwrap().is_none());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn memory_save_replaces_snapshot() {
        let store = InMemoryBackingStore::new();
        store.save(b"first").unwrap();
        store.save(b"second").unwrap();

        assert_eq!(store.load().unwrap().unwrap(), b"second");
        assert_eq!(store.save_count(), 2);
    }

    #[test]
    fn memory_with_snapshot() {
        let store = InMemoryBackingStore::with_snapshot(b"preloaded".to_vec());
        assert_eq!(store.load().unwrap().unwrap(), b"preloaded");
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn memory_closed_rejects_io() {
        let store = InMemoryBackingStore::new();
        store.close();

        assert!(matches!(store.load(), Err(StorageError::Closed)));
        assert!(matches!(store.save(b"x"), Err(StorageError::Closed)));
    }
}
