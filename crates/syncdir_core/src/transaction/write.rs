//! Write transactions.

use crate::directory::{Directory, DirectoryKernel, PersistedKernelInfo};
use crate::entry::{EntryId, EntryKernel};
use crate::error::{CoreError, CoreResult};
use crate::transaction::MutableEntry;
use crate::types::{MetaHandle, WriterTag};
use parking_lot::RwLockWriteGuard;
use std::collections::BTreeSet;
use tracing::debug;

/// State of a write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is open and can stage changes.
    Active,
    /// Changes were published and persisted.
    Committed,
    /// Changes were discarded.
    Aborted,
}

/// One entry changed by a committed transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// Meta handle of the entry.
    pub meta_handle: MetaHandle,
    /// State before the transaction; `None` for created entries.
    pub original: Option<EntryKernel>,
    /// State after the transaction.
    pub current: EntryKernel,
}

/// What a commit did.
#[derive(Debug, Clone)]
pub struct CommitSummary {
    /// Who wrote.
    pub writer: WriterTag,
    /// Entries that actually changed, in meta handle order.
    pub changes: Vec<ChangeRecord>,
    /// Whether persisted directory info changed.
    pub info_changed: bool,
    /// Whether a snapshot was written to the backing store.
    pub saved: bool,
}

impl CommitSummary {
    /// Returns true if the commit changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && !self.info_changed
    }
}

/// An exclusive, all-or-nothing transaction on a directory.
///
/// Holds the directory's write lock for its whole lifetime: a second
/// [`Directory::write_transaction`] blocks until this one is committed,
/// aborted, or dropped. Changes are staged on a private copy of the
/// directory and become visible only when [`commit`](Self::commit)
/// succeeds.
pub struct WriteTransaction<'a> {
    directory: &'a Directory,
    guard: RwLockWriteGuard<'a, DirectoryKernel>,
    staged: DirectoryKernel,
    touched: BTreeSet<MetaHandle>,
    writer: WriterTag,
    state: TransactionState,
}

impl<'a> WriteTransaction<'a> {
    pub(crate) fn new(
        directory: &'a Directory,
        guard: RwLockWriteGuard<'a, DirectoryKernel>,
        writer: WriterTag,
    ) -> Self {
        let staged = guard.clone();
        Self {
            directory,
            guard,
            staged,
            touched: BTreeSet::new(),
            writer,
            state: TransactionState::Active,
        }
    }

    /// Returns the writer tag.
    #[must_use]
    pub fn writer(&self) -> WriterTag {
        self.writer
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns the directory this transaction writes to.
    #[must_use]
    pub fn directory(&self) -> &'a Directory {
        self.directory
    }

    /// Looks up an entry by its current id, staged changes included.
    #[must_use]
    pub fn get_by_id(&self, id: &EntryId) -> Option<&EntryKernel> {
        self.staged.get_by_id(id)
    }

    /// Looks up an entry by meta handle.
    #[must_use]
    pub fn get_by_handle(&self, handle: MetaHandle) -> Option<&EntryKernel> {
        self.staged.entries.get(&handle)
    }

    /// Returns the meta handles of every child of `parent_id`.
    #[must_use]
    pub fn children_of(&self, parent_id: &EntryId) -> Vec<MetaHandle> {
        self.staged.children_of(parent_id)
    }

    /// Finds the live child of `parent_id` named `name`.
    #[must_use]
    pub fn child_with_name(&self, parent_id: &EntryId, name: &str) -> Option<&EntryKernel> {
        self.staged
            .live_child_with_name(parent_id, name, None)
            .and_then(|h| self.staged.entries.get(&h))
    }

    /// Returns the meta handles of all entries awaiting acknowledgment.
    #[must_use]
    pub fn unsynced_handles(&self) -> Vec<MetaHandle> {
        self.staged
            .entries
            .values()
            .filter(|e| e.is_unsynced())
            .map(EntryKernel::meta_handle)
            .collect()
    }

    /// Returns a mutable handle on the entry with this id.
    ///
    /// `None` is the invalid entry: callers must check before mutating.
    pub fn get_mut_by_id(&mut self, id: &EntryId) -> Option<MutableEntry<'_>> {
        let handle = self.staged.handle_for(id)?;
        Some(MutableEntry::new(&mut self.staged, &mut self.touched, handle))
    }

    /// Returns a mutable handle on the entry with this meta handle.
    pub fn get_mut_by_handle(&mut self, handle: MetaHandle) -> Option<MutableEntry<'_>> {
        if !self.staged.entries.contains_key(&handle) {
            return None;
        }
        Some(MutableEntry::new(&mut self.staged, &mut self.touched, handle))
    }

    /// Creates a local entry under `parent_id` with a fresh client id.
    ///
    /// The entry starts unsynced.
    ///
    /// # Errors
    ///
    /// Fails if the parent is missing or not a folder, or if a live sibling
    /// already owns `name`.
    pub fn create_entry(
        &mut self,
        parent_id: &EntryId,
        name: &str,
        is_dir: bool,
    ) -> CoreResult<EntryId> {
        self.check_new_child(parent_id, name)?;
        let id = self.staged.allocate_client_id();
        let handle = self.insert_entry(id.clone(), parent_id.clone(), name, is_dir);
        if let Some(mut entry) = self.get_mut_by_handle(handle) {
            entry.put_is_unsynced(true);
        }
        Ok(id)
    }

    /// Creates an entry with a caller-chosen id and default flags.
    ///
    /// Used for items arriving from the server and for restoring known
    /// local state; callers set versions and flags through the returned
    /// handle's [`MutableEntry`].
    ///
    /// # Errors
    ///
    /// Fails if the id is taken, the parent is missing or not a folder, or
    /// a live sibling already owns `name`.
    pub fn create_entry_with_id(
        &mut self,
        id: EntryId,
        parent_id: &EntryId,
        name: &str,
        is_dir: bool,
    ) -> CoreResult<MetaHandle> {
        if self.staged.ids.contains_key(&id) {
            return Err(CoreError::DuplicateId { id });
        }
        self.check_new_child(parent_id, name)?;
        Ok(self.insert_entry(id, parent_id.clone(), name, is_dir))
    }

    /// Returns the staged directory info.
    #[must_use]
    pub fn info(&self) -> &PersistedKernelInfo {
        &self.staged.info
    }

    /// Stages the initial-sync-ended flag. Returns whether it changed.
    pub fn set_initial_sync_ended(&mut self, value: bool) -> bool {
        let changed = self.staged.info.initial_sync_ended != value;
        self.staged.info.initial_sync_ended = value;
        changed
    }

    /// Stages the last sync timestamp.
    pub fn set_last_sync_timestamp(&mut self, timestamp: i64) {
        self.staged.info.last_sync_timestamp = timestamp;
    }

    /// Stages the store birthday.
    pub fn set_store_birthday(&mut self, birthday: String) {
        self.staged.info.store_birthday = Some(birthday);
    }

    /// Publishes all staged changes and persists the directory.
    ///
    /// If nothing changed the backing store is not touched. If persisting
    /// fails the transaction is abandoned and nothing becomes visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be encoded or saved.
    pub fn commit(mut self) -> CoreResult<CommitSummary> {
        let changes = self.collect_changes();
        let info_changed = self.staged.info != self.guard.info;
        let dirty = !changes.is_empty()
            || info_changed
            || self.staged.next_meta_handle != self.guard.next_meta_handle;

        let saved = if dirty {
            self.directory.persist(&self.staged)?
        } else {
            false
        };

        std::mem::swap(&mut *self.guard, &mut self.staged);
        self.state = TransactionState::Committed;

        debug!(
            directory = %self.directory.name(),
            writer = %self.writer,
            changed = changes.len(),
            info_changed,
            saved,
            "write transaction committed"
        );

        Ok(CommitSummary {
            writer: self.writer,
            changes,
            info_changed,
            saved,
        })
    }

    /// Discards all staged changes.
    pub fn abort(mut self) {
        self.state = TransactionState::Aborted;
        debug!(
            directory = %self.directory.name(),
            writer = %self.writer,
            "write transaction aborted"
        );
    }

    fn check_new_child(&self, parent_id: &EntryId, name: &str) -> CoreResult<()> {
        let parent = self
            .staged
            .get_by_id(parent_id)
            .ok_or_else(|| CoreError::EntryNotFound {
                id: parent_id.clone(),
            })?;
        if !parent.is_dir() {
            return Err(CoreError::invalid_operation(format!(
                "parent {parent_id} is not a folder"
            )));
        }
        if self
            .staged
            .live_child_with_name(parent_id, name, None)
            .is_some()
        {
            return Err(CoreError::NameCollision {
                parent_id: parent_id.clone(),
                name: name.to_owned(),
            });
        }
        Ok(())
    }

    fn insert_entry(
        &mut self,
        id: EntryId,
        parent_id: EntryId,
        name: &str,
        is_dir: bool,
    ) -> MetaHandle {
        let handle = self.staged.allocate_meta_handle();
        let kernel = EntryKernel::new(handle, id.clone(), parent_id, name, is_dir);
        self.staged.ids.insert(id, handle);
        self.staged.entries.insert(handle, kernel);
        self.touched.insert(handle);
        handle
    }

    fn collect_changes(&self) -> Vec<ChangeRecord> {
        self.touched
            .iter()
            .filter_map(|handle| {
                let current = self.staged.entries.get(handle)?;
                let original = self.guard.entries.get(handle);
                if original.is_some_and(|o| o.same_persisted(current)) {
                    return None;
                }
                Some(ChangeRecord {
                    meta_handle: *handle,
                    original: original.cloned(),
                    current: current.clone(),
                })
            })
            .collect()
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            debug!(
                directory = %self.directory.name(),
                writer = %self.writer,
                touched = self.touched.len(),
                "write transaction dropped without commit; discarding changes"
            );
        }
    }
}
