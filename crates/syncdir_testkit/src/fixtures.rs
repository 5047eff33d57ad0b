//! Test fixtures and directory helpers.
//!
//! Provides a directory with its manager and event channel wired together,
//! plus shortcuts for seeding entries in the states the engine expects.

use std::path::PathBuf;
use std::sync::Arc;
use syncdir_core::{
    Directory, DirectoryConfig, DirectoryManager, EntryId, EntryKernel, MetaHandle, WriterTag,
};
use syncdir_engine::{CommitResponseEntry, Session, SyncerEventChannel};
use tempfile::TempDir;

/// Account name used by fixtures.
pub const TEST_ACCOUNT: &str = "test@example.com";

/// A directory, its manager and an event channel, with automatic cleanup.
pub struct TestSync {
    /// The directory manager.
    pub manager: Arc<DirectoryManager>,
    /// The open directory for [`TEST_ACCOUNT`].
    pub directory: Arc<Directory>,
    /// Event channel shared by sessions built from this fixture.
    pub channel: Arc<SyncerEventChannel>,
    temp_dir: Option<TempDir>,
}

impl TestSync {
    /// Creates an in-memory fixture.
    pub fn memory() -> Self {
        Self::with_manager(DirectoryManager::in_memory(), None)
    }

    /// Creates a fixture backed by a file in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let manager = DirectoryManager::on_disk(temp_dir.path(), DirectoryConfig::default());
        Self::with_manager(manager, Some(temp_dir))
    }

    fn with_manager(manager: DirectoryManager, temp_dir: Option<TempDir>) -> Self {
        let manager = Arc::new(manager);
        let directory = manager
            .open(TEST_ACCOUNT)
            .expect("Failed to open test directory");
        Self {
            manager,
            directory,
            channel: Arc::new(SyncerEventChannel::new()),
            temp_dir,
        }
    }

    /// Returns the temporary directory path if file-based.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().to_path_buf())
    }

    /// Builds a session over this fixture with the given responses.
    pub fn session(&self, responses: Vec<CommitResponseEntry>) -> Session {
        Session::new(
            Arc::clone(&self.manager),
            TEST_ACCOUNT,
            Arc::clone(&self.channel),
        )
        .with_responses(responses)
    }

    /// Adds an entry with a local change in flight.
    pub fn add_pending_entry(
        &self,
        id: EntryId,
        parent: &EntryId,
        name: &str,
        is_dir: bool,
    ) -> MetaHandle {
        let mut txn = self
            .directory
            .write_transaction(WriterTag::Unittest)
            .expect("Failed to open write transaction");
        let handle = txn
            .create_entry_with_id(id, parent, name, is_dir)
            .expect("Failed to create entry");
        {
            let mut entry = txn.get_mut_by_handle(handle).expect("entry just created");
            entry.put_is_unsynced(true);
            entry.put_syncing(true);
        }
        txn.commit().expect("Failed to commit");
        handle
    }

    /// Adds an entry the server already acknowledged at `version`.
    pub fn add_synced_entry(
        &self,
        id: EntryId,
        parent: &EntryId,
        name: &str,
        is_dir: bool,
        version: i64,
    ) -> MetaHandle {
        let mut txn = self
            .directory
            .write_transaction(WriterTag::Unittest)
            .expect("Failed to open write transaction");
        let handle = txn
            .create_entry_with_id(id, parent, name, is_dir)
            .expect("Failed to create entry");
        {
            let mut entry = txn.get_mut_by_handle(handle).expect("entry just created");
            entry.put_base_version(version);
            entry.put_server_version(version);
            entry.put_server_name(name);
        }
        txn.commit().expect("Failed to commit");
        handle
    }

    /// Marks an entry deleted locally, leaving it unsynced.
    pub fn delete_locally(&self, id: &EntryId) {
        let mut txn = self
            .directory
            .write_transaction(WriterTag::Unittest)
            .expect("Failed to open write transaction");
        {
            let mut entry = txn.get_mut_by_id(id).expect("entry must exist");
            entry.put_is_del(true).expect("Failed to delete");
            entry.put_is_unsynced(true);
        }
        txn.commit().expect("Failed to commit");
    }

    /// Returns a copy of the committed entry with this id.
    pub fn entry(&self, id: &EntryId) -> Option<EntryKernel> {
        let read = self.directory.read_transaction().expect("Failed to read");
        read.get_by_id(id).cloned()
    }

    /// Returns a copy of the committed entry with this meta handle.
    pub fn entry_by_handle(&self, handle: MetaHandle) -> Option<EntryKernel> {
        let read = self.directory.read_transaction().expect("Failed to read");
        read.get_by_handle(handle).cloned()
    }

    /// Returns copies of every committed entry, root included.
    pub fn entries(&self) -> Vec<EntryKernel> {
        let read = self.directory.read_transaction().expect("Failed to read");
        read.entries().cloned().collect()
    }
}

/// Runs a test with an in-memory fixture.
pub fn with_test_sync<F, R>(f: F) -> R
where
    F: FnOnce(&TestSync) -> R,
{
    let sync = TestSync::memory();
    f(&sync)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A new folder `c1` with `count` new children `c2..`, all pending.
    ///
    /// Returns the folder id and the child ids.
    pub fn pending_folder(sync: &TestSync, count: i64) -> (EntryId, Vec<EntryId>) {
        let folder = EntryId::client(1);
        sync.add_pending_entry(folder.clone(), &EntryId::root(), "folder", true);
        let children = (0..count)
            .map(|i| {
                let id = EntryId::client(i + 2);
                sync.add_pending_entry(id.clone(), &folder, &format!("child-{i}"), false);
                id
            })
            .collect();
        (folder, children)
    }

    /// A synced folder `s<folder>` holding synced children, one of them a
    /// folder with its own synced child.
    ///
    /// Returns the folder id and every descendant id.
    pub fn synced_tree(sync: &TestSync, folder: i64) -> (EntryId, Vec<EntryId>) {
        let root = EntryId::server(folder);
        sync.add_synced_entry(root.clone(), &EntryId::root(), "tree", true, 1);

        let leaf = EntryId::server(folder + 1);
        let sub = EntryId::server(folder + 2);
        let nested = EntryId::server(folder + 3);
        sync.add_synced_entry(leaf.clone(), &root, "leaf", false, 1);
        sync.add_synced_entry(sub.clone(), &root, "sub", true, 1);
        sync.add_synced_entry(nested.clone(), &sub, "nested", false, 1);
        (root, vec![leaf, sub, nested])
    }
}
