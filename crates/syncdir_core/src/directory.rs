//! The directory: one account's entries and persisted info.

use crate::config::DirectoryConfig;
use crate::entry::{EntryId, EntryKernel};
use crate::error::{CoreError, CoreResult};
use crate::snapshot::{DirectorySnapshot, SNAPSHOT_FORMAT_VERSION};
use crate::transaction::{ReadTransaction, WriteTransaction};
use crate::types::{MetaHandle, WriterTag};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use syncdir_storage::DirectoryBackingStore;
use tracing::{debug, info, warn};

/// Directory-level data persisted across runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersistedKernelInfo {
    /// Set once the first full sync for the account completed.
    pub initial_sync_ended: bool,
    /// Index into the account's change list. Not a wall-clock time.
    pub last_sync_timestamp: i64,
    /// Opaque server store birthday.
    pub store_birthday: Option<String>,
    /// Last client id counter value handed out.
    pub next_id: i64,
    /// Unique to this account/client pair; created once.
    pub cache_guid: String,
}

/// In-memory state guarded by the directory lock.
///
/// Write transactions stage their changes on a clone of this and swap it
/// in on commit.
#[derive(Debug, Clone)]
pub(crate) struct DirectoryKernel {
    pub(crate) entries: BTreeMap<MetaHandle, EntryKernel>,
    pub(crate) ids: HashMap<EntryId, MetaHandle>,
    pub(crate) info: PersistedKernelInfo,
    pub(crate) next_meta_handle: MetaHandle,
}

impl DirectoryKernel {
    fn fresh() -> Self {
        let root = EntryKernel::root(MetaHandle::new(1));
        let mut kernel = Self {
            entries: BTreeMap::new(),
            ids: HashMap::new(),
            info: PersistedKernelInfo {
                cache_guid: uuid::Uuid::new_v4().to_string(),
                ..PersistedKernelInfo::default()
            },
            next_meta_handle: MetaHandle::new(2),
        };
        kernel.ids.insert(root.id().clone(), root.meta_handle());
        kernel.entries.insert(root.meta_handle(), root);
        kernel
    }

    fn from_snapshot(snapshot: DirectorySnapshot) -> CoreResult<Self> {
        let mut entries = BTreeMap::new();
        let mut ids = HashMap::new();

        for entry in snapshot.entries {
            if entry.meta_handle() >= snapshot.next_meta_handle {
                return Err(CoreError::invalid_format(format!(
                    "{} is beyond next meta handle {}",
                    entry.meta_handle(),
                    snapshot.next_meta_handle
                )));
            }
            if ids.insert(entry.id().clone(), entry.meta_handle()).is_some() {
                return Err(CoreError::invalid_format(format!(
                    "duplicate id {} in snapshot",
                    entry.id()
                )));
            }
            entries.insert(entry.meta_handle(), entry);
        }

        if !ids.contains_key(&EntryId::root()) {
            return Err(CoreError::invalid_format("snapshot has no root entry"));
        }

        Ok(Self {
            entries,
            ids,
            info: snapshot.info,
            next_meta_handle: snapshot.next_meta_handle,
        })
    }

    pub(crate) fn to_snapshot(&self) -> DirectorySnapshot {
        DirectorySnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            info: self.info.clone(),
            next_meta_handle: self.next_meta_handle,
            entries: self.entries.values().cloned().collect(),
        }
    }

    pub(crate) fn handle_for(&self, id: &EntryId) -> Option<MetaHandle> {
        self.ids.get(id).copied()
    }

    pub(crate) fn get_by_id(&self, id: &EntryId) -> Option<&EntryKernel> {
        self.handle_for(id).and_then(|h| self.entries.get(&h))
    }

    pub(crate) fn children_of(&self, parent_id: &EntryId) -> Vec<MetaHandle> {
        self.entries
            .values()
            .filter(|e| !e.id().is_root() && e.parent_id() == parent_id)
            .map(EntryKernel::meta_handle)
            .collect()
    }

    /// Finds a live sibling other than `exclude` that owns `name`.
    pub(crate) fn live_child_with_name(
        &self,
        parent_id: &EntryId,
        name: &str,
        exclude: Option<MetaHandle>,
    ) -> Option<MetaHandle> {
        self.entries
            .values()
            .find(|e| {
                e.is_live()
                    && Some(e.meta_handle()) != exclude
                    && e.parent_id() == parent_id
                    && e.name() == name
            })
            .map(EntryKernel::meta_handle)
    }

    pub(crate) fn allocate_meta_handle(&mut self) -> MetaHandle {
        let handle = self.next_meta_handle;
        self.next_meta_handle = handle.next();
        handle
    }

    pub(crate) fn allocate_client_id(&mut self) -> EntryId {
        loop {
            self.info.next_id += 1;
            let id = EntryId::client(self.info.next_id);
            if !self.ids.contains_key(&id) {
                return id;
            }
        }
    }
}

/// One account's entries and persisted info.
///
/// A directory is shared behind `Arc`. All mutation goes through a
/// [`WriteTransaction`]; at most one is open at a time and it excludes
/// readers for its lifetime.
pub struct Directory {
    name: String,
    config: DirectoryConfig,
    kernel: RwLock<DirectoryKernel>,
    store: Arc<dyn DirectoryBackingStore>,
    good: AtomicBool,
}

impl Directory {
    /// Opens a directory from its backing store.
    ///
    /// An empty store yields a fresh directory holding only the root entry,
    /// unless `create_if_missing` is off.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read, the snapshot is
    /// invalid, or the directory is missing and may not be created.
    pub fn open(
        name: impl Into<String>,
        store: Arc<dyn DirectoryBackingStore>,
        config: DirectoryConfig,
    ) -> CoreResult<Self> {
        let name = name.into();

        let kernel = match store.load()? {
            Some(bytes) => DirectoryKernel::from_snapshot(DirectorySnapshot::decode(&bytes)?)?,
            None if config.create_if_missing => {
                let kernel = DirectoryKernel::fresh();
                if config.save_on_commit {
                    store.save(&kernel.to_snapshot().encode()?)?;
                }
                kernel
            }
            None => return Err(CoreError::directory_not_found(name)),
        };

        info!(
            directory = %name,
            entries = kernel.entries.len(),
            initial_sync_ended = kernel.info.initial_sync_ended,
            "opened directory"
        );

        Ok(Self {
            name,
            config,
            kernel: RwLock::new(kernel),
            store,
            good: AtomicBool::new(true),
        })
    }

    /// Returns the directory (account) name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration the directory was opened with.
    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DirectoryBackingStore> {
        &self.store
    }

    /// Returns false once the directory is closed or flagged corrupt.
    #[must_use]
    pub fn good(&self) -> bool {
        self.good.load(Ordering::SeqCst)
    }

    /// Flags the directory as unusable. Later transactions fail.
    pub fn mark_corrupt(&self) {
        warn!(directory = %self.name, "directory marked corrupt");
        self.good.store(false, Ordering::SeqCst);
    }

    /// Closes the directory and its backing store.
    pub fn close(&self) {
        if self.good.swap(false, Ordering::SeqCst) {
            debug!(directory = %self.name, "closing directory");
        }
        self.store.close();
    }

    /// Opens a write transaction, blocking while another one is open.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DirectoryUnusable`] if the directory is not good.
    pub fn write_transaction(&self, writer: WriterTag) -> CoreResult<WriteTransaction<'_>> {
        self.ensure_good()?;
        let guard = self.kernel.write();
        Ok(WriteTransaction::new(self, guard, writer))
    }

    /// Opens a write transaction without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DirectoryLocked`] if another transaction holds
    /// the directory, or [`CoreError::DirectoryUnusable`] if it is not good.
    pub fn try_write_transaction(&self, writer: WriterTag) -> CoreResult<WriteTransaction<'_>> {
        self.ensure_good()?;
        let guard = self.kernel.try_write().ok_or(CoreError::DirectoryLocked)?;
        Ok(WriteTransaction::new(self, guard, writer))
    }

    /// Opens a read transaction over committed state.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DirectoryUnusable`] if the directory is not good.
    pub fn read_transaction(&self) -> CoreResult<ReadTransaction<'_>> {
        self.ensure_good()?;
        Ok(ReadTransaction::new(self.kernel.read()))
    }

    /// Returns whether the first full sync has completed.
    #[must_use]
    pub fn initial_sync_ended(&self) -> bool {
        self.kernel.read().info.initial_sync_ended
    }

    /// Sets the initial-sync-ended flag and persists it.
    ///
    /// Returns whether the flag changed. Setting the current value is a
    /// no-op that does not touch the backing store.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is unusable or the save fails.
    pub fn set_initial_sync_ended(&self, value: bool) -> CoreResult<bool> {
        let mut txn = self.write_transaction(WriterTag::Syncer)?;
        let changed = txn.set_initial_sync_ended(value);
        txn.commit()?;
        Ok(changed)
    }

    /// Returns the last sync timestamp.
    #[must_use]
    pub fn last_sync_timestamp(&self) -> i64 {
        self.kernel.read().info.last_sync_timestamp
    }

    /// Sets the last sync timestamp and persists it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is unusable or the save fails.
    pub fn set_last_sync_timestamp(&self, timestamp: i64) -> CoreResult<()> {
        let mut txn = self.write_transaction(WriterTag::Syncer)?;
        txn.set_last_sync_timestamp(timestamp);
        txn.commit()?;
        Ok(())
    }

    /// Returns the store birthday, if the server assigned one.
    #[must_use]
    pub fn store_birthday(&self) -> Option<String> {
        self.kernel.read().info.store_birthday.clone()
    }

    /// Sets the store birthday and persists it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is unusable or the save fails.
    pub fn set_store_birthday(&self, birthday: impl Into<String>) -> CoreResult<()> {
        let mut txn = self.write_transaction(WriterTag::Syncer)?;
        txn.set_store_birthday(birthday.into());
        txn.commit()?;
        Ok(())
    }

    /// Returns the client id counter; the next local entry gets a higher one.
    #[must_use]
    pub fn next_id(&self) -> i64 {
        self.kernel.read().info.next_id
    }

    /// Returns the cache guid of this account/client pair.
    #[must_use]
    pub fn cache_guid(&self) -> String {
        self.kernel.read().info.cache_guid.clone()
    }

    /// Returns the number of entries, including the root and deleted ones.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.kernel.read().entries.len()
    }

    /// Writes a snapshot of `kernel` to the backing store.
    pub(crate) fn persist(&self, kernel: &DirectoryKernel) -> CoreResult<bool> {
        if !self.config.save_on_commit {
            return Ok(false);
        }
        let bytes = kernel.to_snapshot().encode()?;
        self.store.save(&bytes)?;
        Ok(true)
    }

    fn ensure_good(&self) -> CoreResult<()> {
        if self.good() {
            Ok(())
        } else {
            Err(CoreError::directory_unusable(&self.name))
        }
    }
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("name", &self.name)
            .field("good", &self.good())
            .finish_non_exhaustive()
    }
}
