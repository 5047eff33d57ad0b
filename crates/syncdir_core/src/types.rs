//! Core type definitions for syncdir.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Local primary key of an entry.
///
/// Meta handles are assigned when an entry is created and never change,
/// even when the entry's id is rewritten after a commit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MetaHandle(pub i64);

impl MetaHandle {
    /// Creates a new meta handle.
    #[must_use]
    pub const fn new(handle: i64) -> Self {
        Self(handle)
    }

    /// Returns the raw handle value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Returns the next handle.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for MetaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "meta:{}", self.0)
    }
}

/// Which body of code owns a write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriterTag {
    /// The syncer applying server responses.
    Syncer,
    /// Authentication bookkeeping.
    AuthWatcher,
    /// Local model changes coming through the sync API.
    SyncApi,
    /// Tests.
    Unittest,
}

impl fmt::Display for WriterTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriterTag::Syncer => "syncer",
            WriterTag::AuthWatcher => "authwatcher",
            WriterTag::SyncApi => "syncapi",
            WriterTag::Unittest => "unittest",
        };
        f.write_str(name)
    }
}
