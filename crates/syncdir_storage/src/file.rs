//! File-based backing store for persistent directories.

use crate::backend::DirectoryBackingStore;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// A file-based backing store.
///
/// The snapshot lives in a single file. Saves write a sibling temporary
/// file, sync it, then rename it over the snapshot, so a crash never leaves
/// a half-written snapshot behind.
///
/// # Exclusivity
///
/// An advisory exclusive lock is taken on `<path>.lock` for the lifetime of
/// the store. A second store on the same path (in this or another process)
/// fails with [`StorageError::Locked`].
///
/// # Example
///
/// ```no_run
/// use syncdir_storage::{DirectoryBackingStore, FileBackingStore};
/// use std::path::Path;
///
/// let store = FileBackingStore::open(Path::new("account.syncdir")).unwrap();
/// store.save(b"snapshot").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackingStore {
    path: PathBuf,
    /// Held lock file; `None` once closed.
    lock: Mutex<Option<File>>,
    saves: AtomicU64,
}

impl FileBackingStore {
    /// Opens the store at `path`, taking the exclusive lock.
    ///
    /// The snapshot file itself is created lazily by the first save.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created or is held
    /// elsewhere.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let lock_path = Self::lock_path(path);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        FileExt::try_lock_exclusive(&lock_file).map_err(|err| {
            if err.kind() == fs2::lock_contended_error().kind() {
                StorageError::Locked {
                    path: path.display().to_string(),
                }
            } else {
                StorageError::Io(err)
            }
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            lock: Mutex::new(Some(lock_file)),
            saves: AtomicU64::new(0),
        })
    }

    /// Opens the store, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the store
    /// cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl DirectoryBackingStore for FileBackingStore {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        let guard = self.lock.lock();
        if guard.is_none() {
            return Err(StorageError::Closed);
        }

        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Ok(Some(buffer))
    }

    fn save(&self, snapshot: &[u8]) -> StorageResult<()> {
        let guard = self.lock.lock();
        if guard.is_none() {
            return Err(StorageError::Closed);
        }

        let temp = self.temp_path();
        {
            let mut file = File::create(&temp)?;
            file.write_all(snapshot)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;

        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if let Some(file) = self.lock.lock().take() {
            // Dropping the handle releases the lock as well.
            let _ = FileExt::unlock(&file);
        }
    }
}

impl Drop for FileBackingStore {
    fn drop(&mut self) {
        self.close();
    }
}
