//! Parent-before-child ordering of a response batch.

use crate::config::ParentOrdering;
use crate::error::{SyncError, SyncResult};
use crate::response::CommitResponseEntry;
use std::collections::HashMap;
use syncdir_core::EntryId;

/// Returns the order in which to apply `responses`, as indices.
///
/// `parent_of` maps a pre-commit id to the local entry's parent id. A
/// response whose parent is answered later in the same batch is out of
/// order: with [`ParentOrdering::Reorder`] parents are moved in front of
/// their children (otherwise the batch order is kept), with
/// [`ParentOrdering::Reject`] the first such pair is reported.
///
/// # Errors
///
/// Returns [`SyncError::OutOfOrderBatch`] under `Reject`.
pub fn order_parents_first<F>(
    responses: &[CommitResponseEntry],
    ordering: ParentOrdering,
    parent_of: F,
) -> SyncResult<Vec<usize>>
where
    F: Fn(&EntryId) -> Option<EntryId>,
{
    let mut position: HashMap<&EntryId, usize> = HashMap::new();
    for (index, response) in responses.iter().enumerate() {
        if let Some(id) = &response.pre_commit_id {
            position.entry(id).or_insert(index);
        }
    }

    let parent_index: Vec<Option<usize>> = responses
        .iter()
        .enumerate()
        .map(|(index, response)| {
            let id = response.pre_commit_id.as_ref()?;
            let parent = parent_of(id)?;
            position.get(&parent).copied().filter(|&p| p != index)
        })
        .collect();

    if ordering == ParentOrdering::Reject {
        for (index, parent) in parent_index.iter().enumerate() {
            if let Some(parent) = *parent {
                if parent > index {
                    return Err(SyncError::OutOfOrderBatch {
                        child: pre_commit_id(&responses[index]),
                        parent: pre_commit_id(&responses[parent]),
                    });
                }
            }
        }
        return Ok((0..responses.len()).collect());
    }

    let mut emitted = vec![false; responses.len()];
    let mut in_chain = vec![false; responses.len()];
    let mut order = Vec::with_capacity(responses.len());
    for start in 0..responses.len() {
        let mut chain = Vec::new();
        let mut current = Some(start);
        while let Some(index) = current {
            if emitted[index] || in_chain[index] {
                break;
            }
            in_chain[index] = true;
            chain.push(index);
            current = parent_index[index];
        }
        for index in chain.into_iter().rev() {
            in_chain[index] = false;
            emitted[index] = true;
            order.push(index);
        }
    }
    Ok(order)
}

fn pre_commit_id(response: &CommitResponseEntry) -> EntryId {
    response.pre_commit_id.clone().unwrap_or_else(EntryId::root)
}
