//! Property-based test generators using proptest.
//!
//! Provides strategies for commit response batches together with the local
//! entries they answer.

use crate::fixtures::TestSync;
use proptest::prelude::*;
use syncdir_core::EntryId;
use syncdir_engine::{CommitResponseEntry, ResponseType};

/// First client id used by generated entries.
pub const FIRST_CLIENT_ID: i64 = 100;

/// Offset between a generated entry's client id and its server id.
pub const SERVER_ID_OFFSET: i64 = 5000;

/// One local entry awaiting acknowledgment.
#[derive(Debug, Clone)]
pub struct PlannedEntry {
    /// Client id.
    pub id: EntryId,
    /// Unique name under the root.
    pub name: String,
    /// Folder or not.
    pub is_dir: bool,
}

/// A generated batch and the entries it refers to.
#[derive(Debug, Clone)]
pub struct BatchCase {
    /// Entries to seed, all pending under the root.
    pub entries: Vec<PlannedEntry>,
    /// Responses, some of which name ids that do not exist.
    pub responses: Vec<CommitResponseEntry>,
}

impl BatchCase {
    /// Seeds the fixture with the planned entries.
    pub fn install(&self, sync: &TestSync) {
        for entry in &self.entries {
            sync.add_pending_entry(entry.id.clone(), &EntryId::root(), &entry.name, entry.is_dir);
        }
    }

    /// Returns true if `id` is one of the seeded entries.
    pub fn is_planned(&self, id: &EntryId) -> bool {
        self.entries.iter().any(|e| &e.id == id)
    }
}

/// Strategy for response types.
pub fn response_type_strategy() -> impl Strategy<Value = ResponseType> {
    prop_oneof![
        4 => Just(ResponseType::Success),
        1 => Just(ResponseType::Conflict),
        1 => Just(ResponseType::Retry),
        1 => Just(ResponseType::TransientError),
        1 => Just(ResponseType::OverQuota),
        1 => Just(ResponseType::InvalidMessage),
    ]
}

/// Strategy for a batch over up to `max_entries` pending entries.
///
/// Each entry gets at most one response; about one response in six names
/// an id with no local entry. Successes map client id `n` to server id
/// `n + SERVER_ID_OFFSET`.
pub fn batch_strategy(max_entries: usize) -> impl Strategy<Value = BatchCase> {
    prop::collection::vec(
        (
            any::<bool>(),
            prop::option::weighted(0.85, (response_type_strategy(), 1_i64..10)),
        ),
        1..=max_entries.max(1),
    )
    .prop_flat_map(|plans| {
        let len = plans.len();
        (Just(plans), prop::collection::vec(0..len + 3, 0..3))
    })
    .prop_map(|(plans, ghosts)| {
        let mut entries = Vec::new();
        let mut responses = Vec::new();
        for (offset, (is_dir, response)) in plans.into_iter().enumerate() {
            let n = FIRST_CLIENT_ID + i64::try_from(offset).unwrap_or(0);
            let id = EntryId::client(n);
            entries.push(PlannedEntry {
                id: id.clone(),
                name: format!("entry-{n}"),
                is_dir,
            });
            if let Some((response_type, version)) = response {
                responses.push(build_response(response_type, id, n, version));
            }
        }
        for (k, at) in ghosts.into_iter().enumerate() {
            let n = 10_000 + i64::try_from(k).unwrap_or(0);
            let ghost = CommitResponseEntry::success(
                EntryId::client(n),
                (n + SERVER_ID_OFFSET).to_string(),
                1,
            );
            responses.insert(at.min(responses.len()), ghost);
        }
        BatchCase { entries, responses }
    })
}

fn build_response(
    response_type: ResponseType,
    id: EntryId,
    n: i64,
    version: i64,
) -> CommitResponseEntry {
    match response_type {
        ResponseType::Success => {
            CommitResponseEntry::success(id, (n + SERVER_ID_OFFSET).to_string(), version)
        }
        other => CommitResponseEntry::new(other, id),
    }
}
