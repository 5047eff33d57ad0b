//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another process holds the directory file.
    #[error("backing store locked: {path}")]
    Locked {
        /// Path of the contended store.
        path: String,
    },

    /// The stored snapshot is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The store has been closed.
    #[error("storage is closed")]
    Closed,
}
