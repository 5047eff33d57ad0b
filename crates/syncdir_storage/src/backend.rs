//! Backing store trait definition.

use crate::error::StorageResult;

/// Durable home of a directory snapshot.
///
/// Stores are **opaque byte holders**. The directory layer serializes its
/// entries and persisted info into a snapshot and hands the bytes over; the
/// store never interprets them.
///
/// # Invariants
///
/// - `load` returns exactly the bytes of the last successful `save`, or
///   `None` if nothing was ever saved
/// - `save` replaces the previous snapshot atomically: after a crash either
///   the old or the new snapshot is observed, never a mix
/// - Stores must be `Send + Sync`; they are shared behind `Arc`
///
/// # Implementors
///
/// - [`super::InMemoryBackingStore`] - For testing
/// - [`super::FileBackingStore`] - For persistent storage
pub trait DirectoryBackingStore: Send + Sync {
    /// Loads the last saved snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or an I/O error occurs.
    fn load(&self) -> StorageResult<Option<Vec<u8>>>;

    /// Atomically replaces the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the snapshot could not be
    /// made durable.
    fn save(&self, snapshot: &[u8]) -> StorageResult<()>;

    /// Number of successful saves since the store was opened.
    fn save_count(&self) -> u64;

    /// Closes the store. Later loads and saves fail with
    /// [`crate::StorageError::Closed`].
    fn close(&self);
}
