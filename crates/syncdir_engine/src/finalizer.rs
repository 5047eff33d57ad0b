//! End-of-cycle bookkeeping.

use crate::error::{SyncError, SyncResult};
use crate::event::{SyncSessionSnapshot, SyncerEvent};
use crate::session::SyncSession;
use crate::status::ConflictTally;
use tracing::{debug, error, info};

/// Closes a sync cycle.
///
/// Marks the directory's first full sync as done once the server has
/// nothing left to send and the client nothing left to commit, then
/// announces the end of the cycle. The announcement is made on every path,
/// including when the directory is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncerEndCommand;

impl SyncerEndCommand {
    /// Creates the command.
    pub fn new() -> Self {
        Self
    }

    /// Runs the cycle-end steps for `session`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::DirectoryLookup`] if the directory was needed
    /// and unavailable, or [`SyncError::Directory`] if the flag could not be
    /// saved. Listeners have been notified in both cases.
    pub fn execute<S: SyncSession + ?Sized>(&self, session: &S) -> SyncResult<()> {
        let account = session.account_name();

        {
            let mut status = session.status().lock();
            status.cycle_conflicts = ConflictTally {
                conflicting_commits: status.num_conflicting_commits,
                conflicts_resolved: status.conflicts_resolved,
            };
            status.syncing = false;
        }

        let finished = !session.should_sync_again() && session.got_zero_updates();
        let dir = session
            .dirman()
            .lookup(account)
            .ok()
            .filter(|dir| dir.good());

        let mut failure = None;
        let initial_sync_ended = match dir {
            Some(dir) => {
                if finished {
                    match dir.set_initial_sync_ended(true) {
                        Ok(true) => info!(account = %account, "initial sync ended"),
                        Ok(false) => debug!(account = %account, "initial sync already ended"),
                        Err(err) => {
                            error!(account = %account, error = %err, "could not save initial sync state");
                            failure = Some(SyncError::Directory(err));
                        }
                    }
                }
                Some(dir.initial_sync_ended())
            }
            None if finished => {
                error!(account = %account, "directory lookup failed; initial sync state not updated");
                failure = Some(SyncError::directory_lookup(account));
                None
            }
            None => {
                debug!(account = %account, "directory unavailable at cycle end");
                None
            }
        };

        let event = SyncerEvent::sync_cycle_ended(SyncSessionSnapshot::capture(
            session,
            initial_sync_ended,
        ));
        let report = session.syncer_event_channel().notify_listeners(&event);
        debug!(
            account = %account,
            delivered = report.delivered,
            failed = report.failed,
            "sync cycle ended"
        );

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
