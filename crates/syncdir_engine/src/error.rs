//! Error types for the sync engine.

use syncdir_core::{CoreError, EntryId};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that fail a whole engine step.
///
/// Problems with single responses are never surfaced here; they are
/// logged, counted in [`crate::SyncerStatus`] and skipped.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The account's directory is not open or not good.
    #[error("directory lookup failed for account {account}")]
    DirectoryLookup {
        /// Account name that was looked up.
        account: String,
    },

    /// Directory error while applying changes.
    #[error("directory error: {0}")]
    Directory(#[from] CoreError),

    /// A child response precedes its parent's response in the batch.
    #[error("out-of-order commit batch: {child} precedes its parent {parent}")]
    OutOfOrderBatch {
        /// Pre-commit id of the child.
        child: EntryId,
        /// Pre-commit id of the parent.
        parent: EntryId,
    },
}

impl SyncError {
    /// Creates a directory lookup error.
    pub fn directory_lookup(account: impl Into<String>) -> Self {
        Self::DirectoryLookup {
            account: account.into(),
        }
    }

    /// Returns true if the error stops the current engine step.
    ///
    /// Every variant does today; per-entry problems never become a
    /// `SyncError`.
    pub fn is_fatal_to_step(&self) -> bool {
        true
    }

    /// Returns true if retrying the cycle later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::DirectoryLookup { .. } => true,
            SyncError::Directory(err) => matches!(
                err,
                CoreError::Storage(_) | CoreError::DirectoryLocked
            ),
            SyncError::OutOfOrderBatch { .. } => false,
        }
    }
}

/// Errors a listener reports back to the event channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    /// The listener could not handle the event.
    #[error("listener rejected event: {0}")]
    Rejected(String),

    /// The listener's receiving side is gone.
    #[error("listener disconnected")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::directory_lookup("alice").is_retryable());
        assert!(SyncError::Directory(CoreError::DirectoryLocked).is_retryable());
        assert!(!SyncError::Directory(CoreError::invalid_operation("x")).is_retryable());
        assert!(!SyncError::OutOfOrderBatch {
            child: EntryId::client(2),
            parent: EntryId::client(1),
        }
        .is_retryable());
    }

    #[test]
    fn every_error_stops_the_step() {
        assert!(SyncError::directory_lookup("alice").is_fatal_to_step());
    }

    #[test]
    fn error_display() {
        let err = SyncError::directory_lookup("alice");
        assert_eq!(err.to_string(), "directory lookup failed for account alice");

        let err = ListenerError::Rejected("busy".into());
        assert_eq!(err.to_string(), "listener rejected event: busy");
    }
}
