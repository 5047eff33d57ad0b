//! Transactions over a directory.
//!
//! - **Write transactions** hold the directory exclusively, stage every
//!   change on a private copy and publish it all at once on commit.
//!   Dropping a write transaction without committing discards its changes.
//! - **Read transactions** see committed state only.
//!
//! A write transaction moves `Active -> Committed` or `Active -> Aborted`;
//! both `commit` and `abort` consume it, so it can never be reused.

mod mutable;
mod read;
mod write;

pub use mutable::MutableEntry;
pub use read::ReadTransaction;
pub use write::{ChangeRecord, CommitSummary, TransactionState, WriteTransaction};
