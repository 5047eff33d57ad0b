//! Applies the server's commit responses to the local directory.

use crate::commit::name_aside::NameAside;
use crate::commit::ordering::order_parents_first;
use crate::config::EngineConfig;
use crate::error::{SyncError, SyncResult};
use crate::response::{CommitResponseEntry, ResponseType};
use crate::session::SyncSession;
use crate::status::CommitOutcome;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use syncdir_core::{Directory, EntryId, MetaHandle, WriteTransaction, WriterTag};
use tracing::{debug, error, info, warn};

/// What one processing pass found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitResponseOutcome {
    /// New folders the server rejected with a conflict, by pre-commit id.
    pub conflicting_new_folder_ids: BTreeSet<EntryId>,
    /// Deleted folders acknowledged in this pass, by final id.
    pub deleted_folders: BTreeSet<EntryId>,
    /// Responses applied as successes.
    pub successes: usize,
    /// Responses skipped as malformed, stale or unmatched.
    pub skipped: usize,
    /// Children marked deleted under a deleted folder.
    pub cascaded_deletions: usize,
    /// Server names applied through the name aside.
    pub names_applied: usize,
    /// Summary of the pass.
    pub result: CommitOutcome,
}

/// Tallies kept while the batch is applied.
#[derive(Debug, Default)]
struct PassCounters {
    successes: u64,
    conflicts: u64,
    transient: u64,
    invalid: u64,
    malformed: u64,
    missing: u64,
    stale: u64,
    over_quota: bool,
}

impl PassCounters {
    fn outcome(&self) -> CommitOutcome {
        if self.over_quota {
            CommitOutcome::OverQuota
        } else if self.conflicts > 0 {
            CommitOutcome::Conflict
        } else if self.transient > 0 || self.invalid > 0 {
            CommitOutcome::TransientError
        } else if self.successes > 0 {
            CommitOutcome::Ok
        } else {
            CommitOutcome::NoOp
        }
    }

    fn skipped(&self) -> u64 {
        self.malformed + self.missing + self.stale
    }
}

/// Reconciles a batch of commit responses in one write transaction.
#[derive(Debug, Clone, Default)]
pub struct ProcessCommitResponseCommand {
    config: EngineConfig,
}

impl ProcessCommitResponseCommand {
    /// Creates the command with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the command with a specific configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Applies `session.commit_responses()` to the session's directory.
    ///
    /// Individual bad responses are logged, counted in the session status
    /// and skipped. Either every change of the pass becomes visible or,
    /// on error, none does.
    ///
    /// # Errors
    ///
    /// - [`SyncError::DirectoryLookup`] if the directory is missing or unusable
    /// - [`SyncError::OutOfOrderBatch`] under [`crate::ParentOrdering::Reject`]
    /// - [`SyncError::Directory`] if the transaction cannot be committed
    pub fn execute<S: SyncSession + ?Sized>(&self, session: &S) -> SyncResult<CommitResponseOutcome> {
        let account = session.account_name();
        let dir = lookup_directory(session)?;
        let responses = session.commit_responses();

        let order = {
            let read = dir.read_transaction()?;
            order_parents_first(responses, self.config.ordering, |id| {
                read.get_by_id(id).map(|e| e.parent_id().clone())
            })?
        };

        let mut txn = dir.write_transaction(WriterTag::Syncer)?;
        let mut pass = Pass {
            txn: &mut txn,
            aside: NameAside::new(&self.config),
            counters: PassCounters::default(),
            outcome: CommitResponseOutcome::default(),
        };

        for index in order {
            pass.process_response(&responses[index])?;
        }
        pass.outcome.cascaded_deletions = pass.cascade_deleted_folders()?;
        pass.outcome.names_applied = pass.aside.apply_final_names(pass.txn)?;

        let Pass {
            counters,
            mut outcome,
            ..
        } = pass;
        let summary = txn.commit()?;

        outcome.successes = usize::try_from(counters.successes).unwrap_or(usize::MAX);
        outcome.skipped = usize::try_from(counters.skipped()).unwrap_or(usize::MAX);
        outcome.result = counters.outcome();

        {
            let mut status = session.status().lock();
            status.num_successful_commits += counters.successes;
            status.num_conflicting_commits += counters.conflicts;
            status.num_transient_errors += counters.transient;
            status.num_malformed_responses += counters.malformed;
            status.num_missing_entries += counters.missing;
            status.over_quota |= counters.over_quota;
            status.commit_outcome = outcome.result;
        }

        info!(
            account = %account,
            responses = responses.len(),
            successes = outcome.successes,
            skipped = outcome.skipped,
            conflicts = outcome.conflicting_new_folder_ids.len(),
            deleted_folders = outcome.deleted_folders.len(),
            changed = summary.changes.len(),
            result = ?outcome.result,
            "processed commit responses"
        );
        Ok(outcome)
    }
}

fn lookup_directory<S: SyncSession + ?Sized>(session: &S) -> SyncResult<Arc<Directory>> {
    let account = session.account_name();
    match session.dirman().lookup(account) {
        Ok(dir) if dir.good() => Ok(dir),
        Ok(_) => {
            error!(account = %account, "directory is not usable");
            Err(SyncError::directory_lookup(account))
        }
        Err(err) => {
            error!(account = %account, error = %err, "directory lookup failed");
            Err(SyncError::directory_lookup(account))
        }
    }
}

struct Pass<'p, 'a> {
    txn: &'p mut WriteTransaction<'a>,
    aside: NameAside,
    counters: PassCounters,
    outcome: CommitResponseOutcome,
}

impl Pass<'_, '_> {
    fn process_response(&mut self, response: &CommitResponseEntry) -> SyncResult<()> {
        if let Err(reason) = response.validate() {
            warn!(
                pre_commit_id = ?response.pre_commit_id,
                response_type = %response.response_type,
                %reason,
                "skipping malformed commit response"
            );
            self.counters.malformed += 1;
            return Ok(());
        }
        let Some(pre_commit_id) = response.pre_commit_id.as_ref() else {
            return Ok(());
        };

        let Some(handle) = self.txn.get_by_id(pre_commit_id).map(|e| e.meta_handle()) else {
            if self.already_applied_elsewhere(response) {
                debug!(pre_commit_id = %pre_commit_id, "response already applied");
                return Ok(());
            }
            warn!(
                pre_commit_id = %pre_commit_id,
                response_type = %response.response_type,
                "no local entry for commit response"
            );
            self.counters.missing += 1;
            return Ok(());
        };

        if let Some(mut entry) = self.txn.get_mut_by_handle(handle) {
            entry.put_syncing(false);
        }

        match response.response_type {
            ResponseType::Success => self.process_success(response, pre_commit_id, handle)?,
            ResponseType::Conflict => {
                let new_folder = self
                    .txn
                    .get_by_handle(handle)
                    .is_some_and(|e| e.is_new() && e.is_dir());
                if new_folder {
                    self.outcome
                        .conflicting_new_folder_ids
                        .insert(pre_commit_id.clone());
                }
                info!(pre_commit_id = %pre_commit_id, new_folder, "commit conflict");
                self.counters.conflicts += 1;
            }
            ResponseType::Retry | ResponseType::TransientError => {
                debug!(
                    pre_commit_id = %pre_commit_id,
                    response_type = %response.response_type,
                    "entry will be committed again"
                );
                self.counters.transient += 1;
            }
            ResponseType::OverQuota => {
                warn!(pre_commit_id = %pre_commit_id, "account over quota");
                self.counters.over_quota = true;
            }
            ResponseType::InvalidMessage => {
                error!(
                    pre_commit_id = %pre_commit_id,
                    message = response.error_message.as_deref().unwrap_or(""),
                    "server rejected commit as invalid"
                );
                self.counters.invalid += 1;
            }
        }
        Ok(())
    }

    /// The pre-commit id is gone because an earlier pass rewrote it.
    fn already_applied_elsewhere(&self, response: &CommitResponseEntry) -> bool {
        let (Some(server_id), Some(version)) = (response.server_id(), response.version) else {
            return false;
        };
        response.response_type == ResponseType::Success
            && self
                .txn
                .get_by_id(&server_id)
                .is_some_and(|e| !e.is_unsynced() && e.base_version() >= version)
    }

    fn process_success(
        &mut self,
        response: &CommitResponseEntry,
        pre_commit_id: &EntryId,
        handle: MetaHandle,
    ) -> SyncResult<()> {
        let (Some(server_id), Some(version)) = (response.server_id(), response.version) else {
            self.counters.malformed += 1;
            return Ok(());
        };
        let Some(entry) = self.txn.get_by_handle(handle) else {
            return Ok(());
        };

        if !entry.is_unsynced() && entry.base_version() >= version {
            debug!(pre_commit_id = %pre_commit_id, version, "entry already reconciled");
            return Ok(());
        }
        if version < entry.base_version() {
            warn!(
                pre_commit_id = %pre_commit_id,
                version,
                base_version = entry.base_version(),
                "server version older than local base version"
            );
            self.counters.stale += 1;
            return Ok(());
        }

        if &server_id != entry.id() {
            if !entry.is_new() {
                warn!(
                    pre_commit_id = %pre_commit_id,
                    server_id = %server_id,
                    "existing entry committed under a different id"
                );
                self.counters.malformed += 1;
                return Ok(());
            }
            if let Some(owner) = self.txn.get_by_id(&server_id) {
                error!(
                    pre_commit_id = %pre_commit_id,
                    server_id = %server_id,
                    owner = %owner.meta_handle(),
                    "server id already belongs to another entry"
                );
                self.counters.malformed += 1;
                return Ok(());
            }
        }

        let local_name = entry.name().to_owned();
        let (is_dir, is_del) = (entry.is_dir(), entry.is_del());

        if let Some(mut entry) = self.txn.get_mut_by_handle(handle) {
            let moved = entry.change_entry_id_and_update_children(server_id.clone())?;
            if entry.id() != pre_commit_id {
                debug!(
                    pre_commit_id = %pre_commit_id,
                    server_id = %server_id,
                    meta_handle = %handle,
                    children = moved,
                    "new entry took server id"
                );
            }
            entry.put_base_version(version);
            entry.put_server_version(version);
            entry.put_is_unsynced(false);
            if let Some(position) = response.position_in_parent {
                entry.put_server_position_in_parent(position);
            }
        }

        if is_dir && is_del {
            self.outcome.deleted_folders.insert(server_id);
        }

        match response.name.as_deref() {
            Some(name) if name != local_name => {
                let non_unique = response.non_unique_name.as_deref().unwrap_or(name);
                match self.aside.set_aside(self.txn, handle, name, non_unique) {
                    Ok(true) => {}
                    Ok(false) => self.keep_local_name(handle, name, non_unique),
                    Err(err) => {
                        warn!(
                            pre_commit_id = %pre_commit_id,
                            meta_handle = %handle,
                            error = %err,
                            "could not set name aside; keeping the local name"
                        );
                        self.keep_local_name(handle, name, non_unique);
                    }
                }
            }
            name => {
                let name = name.unwrap_or(local_name.as_str()).to_owned();
                if let Some(mut entry) = self.txn.get_mut_by_handle(handle) {
                    if let Some(non_unique) = &response.non_unique_name {
                        entry.put_non_unique_name(non_unique.clone());
                    }
                    entry.put_server_name(name);
                }
            }
        }

        self.counters.successes += 1;
        Ok(())
    }

    /// Records the server's name without renaming the entry.
    fn keep_local_name(&mut self, handle: MetaHandle, server_name: &str, non_unique: &str) {
        if let Some(mut entry) = self.txn.get_mut_by_handle(handle) {
            entry.put_server_name(server_name.to_owned());
            entry.put_non_unique_name(non_unique.to_owned());
        }
    }

    /// Marks synced descendants of every deleted folder as deleted.
    ///
    /// Unsynced descendants keep their pending change and are not descended
    /// into. Returns the number of entries newly marked deleted.
    fn cascade_deleted_folders(&mut self) -> SyncResult<usize> {
        let mut marked = 0;
        let mut visited: HashSet<EntryId> = HashSet::new();
        let mut stack: Vec<EntryId> = self.outcome.deleted_folders.iter().cloned().collect();

        while let Some(folder) = stack.pop() {
            if !visited.insert(folder.clone()) {
                continue;
            }
            for child in self.txn.children_of(&folder) {
                let Some(entry) = self.txn.get_by_handle(child) else {
                    continue;
                };
                if entry.is_unsynced() {
                    debug!(meta_handle = %child, parent = %folder, "child change pending; not deleted");
                    continue;
                }
                let (id, is_dir, already) = (entry.id().clone(), entry.is_dir(), entry.is_del());
                if !already {
                    if let Some(mut entry) = self.txn.get_mut_by_handle(child) {
                        entry.put_is_del(true)?;
                        marked += 1;
                    }
                }
                if is_dir {
                    stack.push(id);
                }
            }
        }

        if marked > 0 {
            info!(deleted = marked, "cascaded folder deletions");
        }
        Ok(marked)
    }
}
