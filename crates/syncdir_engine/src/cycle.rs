//! One sync cycle: process commit responses, then finalize.

use crate::commit::{CommitResponseOutcome, ProcessCommitResponseCommand};
use crate::config::EngineConfig;
use crate::error::SyncResult;
use crate::finalizer::SyncerEndCommand;
use crate::session::SyncSession;
use crate::status::SyncerStatus;
use tracing::{info_span, warn};

/// Result of a cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// What the commit-response pass did.
    pub commit: CommitResponseOutcome,
    /// Session counters after the cycle.
    pub status: SyncerStatus,
}

/// Runs the engine commands in order for a session.
#[derive(Debug, Clone, Default)]
pub struct Syncer {
    processor: ProcessCommitResponseCommand,
    finalizer: SyncerEndCommand,
}

impl Syncer {
    /// Creates a syncer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a syncer with a specific configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            processor: ProcessCommitResponseCommand::with_config(config),
            finalizer: SyncerEndCommand::new(),
        }
    }

    /// Processes the session's commit responses and ends the cycle.
    ///
    /// The finalizer runs even if processing fails, so listeners always
    /// hear about the end of the cycle.
    ///
    /// # Errors
    ///
    /// Returns the processing error if there was one, otherwise the
    /// finalizer's error.
    pub fn run_cycle<S: SyncSession + ?Sized>(&self, session: &S) -> SyncResult<CycleReport> {
        let span = info_span!("sync_cycle", account = %session.account_name());
        let _enter = span.enter();

        session.status().lock().syncing = true;

        let processed = self.processor.execute(session);
        if let Err(err) = &processed {
            warn!(error = %err, "commit response processing failed");
        }
        let finalized = self.finalizer.execute(session);

        let commit = processed?;
        finalized?;
        Ok(CycleReport {
            commit,
            status: session.status().lock().clone(),
        })
    }
}
