//! # syncdir core
//!
//! Versioned entry store for the syncdir engine.
//!
//! This crate provides:
//! - Entries keyed by stable meta handles and addressable by id
//! - Single-writer write transactions with all-or-nothing commit
//! - Consistent read transactions over committed state
//! - Persisted directory info (`initial_sync_ended`, timestamps, birthday)
//! - A directory manager that opens one directory per account
//!
//! ## Example
//!
//! ```rust
//! use syncdir_core::{DirectoryManager, EntryId, WriterTag};
//!
//! let manager = DirectoryManager::in_memory();
//! let dir = manager.open("alice@example.com").unwrap();
//!
//! let mut txn = dir.write_transaction(WriterTag::Unittest).unwrap();
//! let id = txn.create_entry(&EntryId::root(), "Bookmarks", true).unwrap();
//! txn.commit().unwrap();
//!
//! let read = dir.read_transaction().unwrap();
//! assert!(read.get_by_id(&id).unwrap().is_unsynced());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod directory;
mod entry;
mod error;
mod manager;
mod snapshot;
mod transaction;
mod types;

pub use config::DirectoryConfig;
pub use directory::{Directory, PersistedKernelInfo};
pub use entry::{EntryId, EntryKernel};
pub use error::{CoreError, CoreResult};
pub use manager::{DirectoryManager, StoreFactory};
pub use snapshot::{DirectorySnapshot, SNAPSHOT_FORMAT_VERSION};
pub use transaction::{
    ChangeRecord, CommitSummary, MutableEntry, ReadTransaction, TransactionState,
    WriteTransaction,
};
pub use types::{MetaHandle, WriterTag};
