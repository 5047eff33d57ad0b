//! Per-session sync status counters.

/// Summary of one commit-response pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitOutcome {
    /// Nothing was applied.
    #[default]
    NoOp,
    /// At least one success and nothing left pending.
    Ok,
    /// At least one conflict.
    Conflict,
    /// At least one retryable error.
    TransientError,
    /// The server reported the account over quota.
    OverQuota,
}

/// Conflict-resolution counts for the current cycle.
///
/// Filled by the cycle-end finalizer from the session counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConflictTally {
    /// Conflicting commits seen this cycle.
    pub conflicting_commits: u64,
    /// Conflicts resolved this cycle.
    pub conflicts_resolved: u64,
}

impl ConflictTally {
    /// Returns true if every conflict seen was resolved.
    #[must_use]
    pub fn all_resolved(&self) -> bool {
        self.conflicts_resolved >= self.conflicting_commits
    }
}

/// Counters kept for the life of a sync session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncerStatus {
    /// Responses applied as successes.
    pub num_successful_commits: u64,
    /// Conflict responses.
    pub num_conflicting_commits: u64,
    /// Retry and transient error responses.
    pub num_transient_errors: u64,
    /// Responses skipped as malformed.
    pub num_malformed_responses: u64,
    /// Responses with no matching local entry.
    pub num_missing_entries: u64,
    /// Set when the server reported the account over quota.
    pub over_quota: bool,
    /// True while a cycle is running.
    pub syncing: bool,
    /// Conflicts resolved by the update side.
    pub conflicts_resolved: u64,
    /// Updates applied by the update side.
    pub num_updates_applied: u64,
    /// Outcome of the last commit-response pass.
    pub commit_outcome: CommitOutcome,
    /// Per-cycle conflict view.
    pub cycle_conflicts: ConflictTally,
}

impl SyncerStatus {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of responses that were not applied.
    #[must_use]
    pub fn num_skipped(&self) -> u64 {
        self.num_malformed_responses + self.num_missing_entries
    }
}
