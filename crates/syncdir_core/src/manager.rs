//! Directory manager: one open directory per account.

use crate::config::DirectoryConfig;
use crate::directory::Directory;
use crate::error::{CoreError, CoreResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use syncdir_storage::{
    DirectoryBackingStore, FileBackingStore, InMemoryBackingStore, StorageResult,
};
use tracing::{debug, info};

/// Builds the backing store for a named directory.
pub type StoreFactory =
    Box<dyn Fn(&str) -> StorageResult<Arc<dyn DirectoryBackingStore>> + Send + Sync>;

/// Opens, hands out and closes directories by account name.
///
/// The manager is passed explicitly to whoever needs a directory; there is
/// no process-wide instance.
pub struct DirectoryManager {
    config: DirectoryConfig,
    factory: StoreFactory,
    open: RwLock<BTreeMap<String, Arc<Directory>>>,
}

impl DirectoryManager {
    /// Creates a manager with a custom store factory.
    pub fn new(config: DirectoryConfig, factory: StoreFactory) -> Self {
        Self {
            config,
            factory,
            open: RwLock::new(BTreeMap::new()),
        }
    }

    /// Creates a manager whose directories live in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::in_memory_with_config(DirectoryConfig::default())
    }

    /// Creates an in-memory manager with a specific configuration.
    #[must_use]
    pub fn in_memory_with_config(config: DirectoryConfig) -> Self {
        Self::new(
            config,
            Box::new(|_name| {
                let store: Arc<dyn DirectoryBackingStore> = Arc::new(InMemoryBackingStore::new());
                Ok(store)
            }),
        )
    }

    /// Creates a manager storing one file per directory under `root`.
    #[must_use]
    pub fn on_disk(root: &Path, config: DirectoryConfig) -> Self {
        let root: PathBuf = root.to_path_buf();
        Self::new(
            config,
            Box::new(move |name| {
                let path = root.join(format!("{}.syncdir", sanitize(name)));
                let store: Arc<dyn DirectoryBackingStore> =
                    Arc::new(FileBackingStore::open_with_create_dirs(&path)?);
                Ok(store)
            }),
        )
    }

    /// Opens the directory for `name`, or returns it if already open.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be opened or holds an
    /// invalid snapshot.
    pub fn open(&self, name: &str) -> CoreResult<Arc<Directory>> {
        let mut open = self.open.write();
        if let Some(dir) = open.get(name) {
            if dir.good() {
                return Ok(Arc::clone(dir));
            }
            debug!(directory = %name, "replacing unusable directory");
        }

        let store = (self.factory)(name)?;
        let dir = Arc::new(Directory::open(name, store, self.config.clone())?);
        open.insert(name.to_owned(), Arc::clone(&dir));
        Ok(dir)
    }

    /// Returns the open directory for `name`.
    ///
    /// Callers must still check [`Directory::good`] before relying on it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DirectoryNotFound`] if no such directory is open.
    pub fn lookup(&self, name: &str) -> CoreResult<Arc<Directory>> {
        self.open
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::directory_not_found(name))
    }

    /// Closes and forgets the directory for `name`.
    ///
    /// Returns false if it was not open.
    pub fn close(&self, name: &str) -> bool {
        match self.open.write().remove(name) {
            Some(dir) => {
                dir.close();
                info!(directory = %name, "closed directory");
                true
            }
            None => false,
        }
    }

    /// Closes every open directory.
    pub fn close_all(&self) {
        let dirs = std::mem::take(&mut *self.open.write());
        for dir in dirs.values() {
            dir.close();
        }
    }

    /// Returns the names of all open directories.
    #[must_use]
    pub fn directory_names(&self) -> Vec<String> {
        self.open.read().keys().cloned().collect()
    }
}

impl std::fmt::Debug for DirectoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryManager")
            .field("config", &self.config)
            .field("open", &self.directory_names())
            .finish_non_exhaustive()
    }
}

/// Maps an account name onto a safe file stem.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
