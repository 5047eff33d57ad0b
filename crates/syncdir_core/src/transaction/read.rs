//! Read transactions.

use crate::directory::{DirectoryKernel, PersistedKernelInfo};
use crate::entry::{EntryId, EntryKernel};
use crate::types::MetaHandle;
use parking_lot::RwLockReadGuard;

/// A consistent view of committed directory state.
///
/// Holds the directory's read lock; write transactions wait until every
/// read transaction is dropped.
pub struct ReadTransaction<'a> {
    kernel: RwLockReadGuard<'a, DirectoryKernel>,
}

impl<'a> ReadTransaction<'a> {
    pub(crate) fn new(kernel: RwLockReadGuard<'a, DirectoryKernel>) -> Self {
        Self { kernel }
    }

    /// Looks up an entry by its current id.
    #[must_use]
    pub fn get_by_id(&self, id: &EntryId) -> Option<&EntryKernel> {
        self.kernel.get_by_id(id)
    }

    /// Looks up an entry by meta handle.
    #[must_use]
    pub fn get_by_handle(&self, handle: MetaHandle) -> Option<&EntryKernel> {
        self.kernel.entries.get(&handle)
    }

    /// Returns every entry whose parent is `parent_id`, deleted ones included.
    #[must_use]
    pub fn children_of(&self, parent_id: &EntryId) -> Vec<&EntryKernel> {
        self.kernel
            .children_of(parent_id)
            .into_iter()
            .filter_map(|h| self.kernel.entries.get(&h))
            .collect()
    }

    /// Finds the live child of `parent_id` named `name`.
    #[must_use]
    pub fn child_with_name(&self, parent_id: &EntryId, name: &str) -> Option<&EntryKernel> {
        self.kernel
            .live_child_with_name(parent_id, name, None)
            .and_then(|h| self.kernel.entries.get(&h))
    }

    /// Returns the meta handles of all entries awaiting acknowledgment.
    #[must_use]
    pub fn unsynced_handles(&self) -> Vec<MetaHandle> {
        self.kernel
            .entries
            .values()
            .filter(|e| e.is_unsynced())
            .map(EntryKernel::meta_handle)
            .collect()
    }

    /// Iterates all entries in meta handle order.
    pub fn entries(&self) -> impl Iterator<Item = &EntryKernel> {
        self.kernel.entries.values()
    }

    /// Returns the persisted directory info.
    #[must_use]
    pub fn info(&self) -> &PersistedKernelInfo {
        &self.kernel.info
    }
}
