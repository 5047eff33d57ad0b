//! # syncdir storage
//!
//! Backing store trait and implementations for syncdir directories.
//!
//! A backing store holds exactly one **opaque snapshot** of a directory.
//! The directory layer owns the snapshot format; stores only load the last
//! saved bytes and atomically replace them.
//!
//! ## Available Stores
//!
//! - [`InMemoryBackingStore`] - For testing and ephemeral directories
//! - [`FileBackingStore`] - Persistent, crash-safe replacement via rename
//!
//! ## Example
//!
//! ```rust
//! use syncdir_storage::{DirectoryBackingStore, InMemoryBackingStore};
//!
//! let store = InMemoryBackingStore::new();
//! assert!(store.load().unwrap().is_none());
//! store.save(b"snapshot").unwrap();
//! assert_eq!(store.load().unwrap().as_deref(), Some(&b"snapshot"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::DirectoryBackingStore;
pub use error::{StorageError, StorageResult};
pub use file::FileBackingStore;
pub use memory::InMemoryBackingStore;
