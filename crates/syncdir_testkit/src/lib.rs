//! # syncdir testkit
//!
//! Test utilities for syncdir.
//!
//! This crate provides:
//! - Fixtures: directories with pre-populated entries and sessions over them
//! - Listeners that record, fail or panic, for channel tests
//! - Property-based generators for commit response batches
//! - Test logging setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use syncdir_testkit::prelude::*;
//!
//! #[test]
//! fn commit_is_acknowledged() {
//!     let sync = TestSync::memory();
//!     sync.add_pending_entry(EntryId::client(100), &EntryId::root(), "a", false);
//!     let session = sync.session(vec![CommitResponseEntry::success(
//!         EntryId::client(100),
//!         "5000",
//!         1,
//!     )]);
//!     ProcessCommitResponseCommand::new().execute(&session).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod listeners;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::listeners::*;
    pub use crate::logging::*;
    pub use syncdir_core::{EntryId, EntryKernel, MetaHandle, WriterTag};
    pub use syncdir_engine::{
        CommitResponseEntry, ProcessCommitResponseCommand, ResponseType, SyncSession,
        SyncerEndCommand, SyncerEventChannel,
    };
}

pub use fixtures::*;
pub use generators::*;
pub use listeners::*;
pub use logging::*;
