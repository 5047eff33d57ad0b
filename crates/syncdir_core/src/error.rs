//! Error types for syncdir core.

use crate::entry::EntryId;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in directory operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Backing store error.
    #[error("storage error: {0}")]
    Storage(#[from] syncdir_storage::StorageError),

    /// Snapshot could not be encoded or decoded.
    #[error("snapshot codec error: {message}")]
    Snapshot {
        /// Description of the failure.
        message: String,
    },

    /// Invalid snapshot format or version.
    #[error("invalid directory format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// No directory is open under this name.
    #[error("directory not found: {name}")]
    DirectoryNotFound {
        /// Account or directory name.
        name: String,
    },

    /// The directory is closed or was flagged corrupt.
    #[error("directory unusable: {name}")]
    DirectoryUnusable {
        /// Account or directory name.
        name: String,
    },

    /// A write transaction is already open on the directory.
    #[error("directory locked: a write transaction is already open")]
    DirectoryLocked,

    /// Entry not found.
    #[error("entry not found: {id}")]
    EntryNotFound {
        /// The id that was looked up.
        id: EntryId,
    },

    /// Another entry already owns this id.
    #[error("duplicate id: {id}")]
    DuplicateId {
        /// The contended id.
        id: EntryId,
    },

    /// A live sibling already owns this name.
    #[error("name collision: {name:?} under parent {parent_id}")]
    NameCollision {
        /// Parent of both entries.
        parent_id: EntryId,
        /// The contended name.
        name: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a snapshot codec error.
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a directory not found error.
    pub fn directory_not_found(name: impl Into<String>) -> Self {
        Self::DirectoryNotFound { name: name.into() }
    }

    /// Creates a directory unusable error.
    pub fn directory_unusable(name: impl Into<String>) -> Self {
        Self::DirectoryUnusable { name: name.into() }
    }
}
