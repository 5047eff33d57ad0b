//! Sync session: what one cycle needs to see.

use crate::event::SyncerEventChannel;
use crate::response::CommitResponseEntry;
use crate::status::SyncerStatus;
use parking_lot::Mutex;
use std::sync::Arc;
use syncdir_core::DirectoryManager;

/// Context handed to the engine commands.
///
/// The session owns nothing global: the directory manager and the event
/// channel are injected by whoever drives the cycle.
pub trait SyncSession {
    /// Returns the directory manager.
    fn dirman(&self) -> &DirectoryManager;

    /// Returns the account whose directory is being synced.
    fn account_name(&self) -> &str;

    /// Returns true if another round is needed before the cycle is done.
    fn should_sync_again(&self) -> bool;

    /// Returns true if the server has no updates left for this client.
    fn got_zero_updates(&self) -> bool;

    /// Returns the channel cycle events are broadcast on.
    fn syncer_event_channel(&self) -> &SyncerEventChannel;

    /// Returns the server's responses to the last commit.
    fn commit_responses(&self) -> &[CommitResponseEntry];

    /// Returns the session counters.
    fn status(&self) -> &Mutex<SyncerStatus>;
}

/// Default [`SyncSession`].
pub struct Session {
    dirman: Arc<DirectoryManager>,
    account_name: String,
    channel: Arc<SyncerEventChannel>,
    responses: Vec<CommitResponseEntry>,
    has_more_to_sync: bool,
    updates_remaining: u64,
    status: Mutex<SyncerStatus>,
}

impl Session {
    /// Creates a session with no responses and nothing left to sync.
    pub fn new(
        dirman: Arc<DirectoryManager>,
        account_name: impl Into<String>,
        channel: Arc<SyncerEventChannel>,
    ) -> Self {
        Self {
            dirman,
            account_name: account_name.into(),
            channel,
            responses: Vec::new(),
            has_more_to_sync: false,
            updates_remaining: 0,
            status: Mutex::new(SyncerStatus::new()),
        }
    }

    /// Sets the commit responses.
    #[must_use]
    pub fn with_responses(mut self, responses: Vec<CommitResponseEntry>) -> Self {
        self.responses = responses;
        self
    }

    /// Replaces the commit responses for the next round.
    pub fn set_responses(&mut self, responses: Vec<CommitResponseEntry>) {
        self.responses = responses;
    }

    /// Records whether local changes are still waiting to be committed.
    pub fn set_has_more_to_sync(&mut self, value: bool) {
        self.has_more_to_sync = value;
    }

    /// Records how many updates the server still holds for this client.
    pub fn set_updates_remaining(&mut self, remaining: u64) {
        self.updates_remaining = remaining;
    }

    /// Returns a copy of the counters.
    #[must_use]
    pub fn status_snapshot(&self) -> SyncerStatus {
        self.status.lock().clone()
    }
}

impl SyncSession for Session {
    fn dirman(&self) -> &DirectoryManager {
        &self.dirman
    }

    fn account_name(&self) -> &str {
        &self.account_name
    }

    fn should_sync_again(&self) -> bool {
        self.has_more_to_sync
    }

    fn got_zero_updates(&self) -> bool {
        self.updates_remaining == 0
    }

    fn syncer_event_channel(&self) -> &SyncerEventChannel {
        &self.channel
    }

    fn commit_responses(&self) -> &[CommitResponseEntry] {
        &self.responses
    }

    fn status(&self) -> &Mutex<SyncerStatus> {
        &self.status
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("account_name", &self.account_name)
            .field("responses", &self.responses.len())
            .field("has_more_to_sync", &self.has_more_to_sync)
            .field("updates_remaining", &self.updates_remaining)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncdir_core::EntryId;

    #[test]
    fn session_flags() {
        let mut session = Session::new(
            Arc::new(DirectoryManager::in_memory()),
            "alice",
            Arc::new(SyncerEventChannel::new()),
        );
        assert!(!session.should_sync_again());
        assert!(session.got_zero_updates());

        session.set_has_more_to_sync(true);
        session.set_updates_remaining(3);
        assert!(session.should_sync_again());
        assert!(!session.got_zero_updates());
    }

    #[test]
    fn responses_are_replaced() {
        let mut session = Session::new(
            Arc::new(DirectoryManager::in_memory()),
            "alice",
            Arc::new(SyncerEventChannel::new()),
        )
        .with_responses(vec![CommitResponseEntry::conflict(EntryId::client(1))]);
        assert_eq!(session.commit_responses().len(), 1);

        session.set_responses(Vec::new());
        assert!(session.commit_responses().is_empty());
    }
}
