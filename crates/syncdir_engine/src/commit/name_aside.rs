//! Two-phase rename for names acknowledged by the server.
//!
//! Applying server names one response at a time can collide: two siblings
//! that swapped names locally would each find the other still holding the
//! name. Phase one parks every renamed entry on a temporary name no
//! sibling holds; phase two, once the whole batch was processed, moves
//! each entry onto its final name.

use crate::config::EngineConfig;
use std::collections::BTreeMap;
use syncdir_core::{CoreError, CoreResult, EntryId, MetaHandle, WriteTransaction};
use tracing::{debug, error, warn};

/// Where an entry is in the rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameAsideState {
    /// The entry keeps its local name.
    Untouched,
    /// The entry sits on a temporary name until phase two.
    SetAside {
        /// Name the entry currently has.
        temp_name: String,
        /// Name the server acknowledged.
        final_name: String,
    },
    /// The final name was applied, possibly uniquified.
    Applied {
        /// Name the entry ended up with.
        name: String,
    },
}

#[derive(Debug)]
struct Pending {
    state: NameAsideState,
    non_unique_name: String,
}

/// Per-batch rename state.
#[derive(Debug)]
pub struct NameAside {
    suffix: String,
    max_attempts: u32,
    order: Vec<MetaHandle>,
    entries: BTreeMap<MetaHandle, Pending>,
}

impl NameAside {
    /// Creates an empty rename set.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            suffix: config.name_aside_suffix.clone(),
            max_attempts: config.max_uniquify_attempts,
            order: Vec::new(),
            entries: BTreeMap::new(),
        }
    }

    /// Returns the state of one entry.
    pub fn state(&self, handle: MetaHandle) -> NameAsideState {
        self.entries
            .get(&handle)
            .map_or(NameAsideState::Untouched, |p| p.state.clone())
    }

    /// Returns the number of entries waiting for phase two.
    pub fn pending(&self) -> usize {
        self.entries
            .values()
            .filter(|p| matches!(p.state, NameAsideState::SetAside { .. }))
            .count()
    }

    /// Phase one: moves the entry onto `<final_name><suffix>.<meta handle>`.
    ///
    /// If a live sibling already holds that name, a `.<n>` counter is
    /// appended until a free one is found. When none is, the entry keeps
    /// its local name and `false` is returned. Setting aside the same entry
    /// twice keeps the first temporary name and replaces the final name.
    ///
    /// # Errors
    ///
    /// Fails if the entry is gone.
    pub fn set_aside(
        &mut self,
        txn: &mut WriteTransaction<'_>,
        handle: MetaHandle,
        final_name: &str,
        non_unique_name: &str,
    ) -> CoreResult<bool> {
        if let Some(pending) = self.entries.get_mut(&handle) {
            if let NameAsideState::SetAside {
                final_name: name, ..
            } = &mut pending.state
            {
                *name = final_name.to_owned();
                pending.non_unique_name = non_unique_name.to_owned();
                return Ok(true);
            }
        }

        let parent = txn
            .get_by_handle(handle)
            .map(|e| e.parent_id().clone())
            .ok_or_else(|| CoreError::invalid_operation(format!("no entry for {handle}")))?;
        let base = format!("{final_name}{}.{}", self.suffix, handle.as_i64());
        let Some(temp_name) = free_temp_name(txn, &parent, handle, &base, self.max_attempts)
        else {
            warn!(
                meta_handle = %handle,
                temp_name = %base,
                "no free temporary name; keeping the local name"
            );
            return Ok(false);
        };

        let Some(mut entry) = txn.get_mut_by_handle(handle) else {
            return Err(CoreError::invalid_operation(format!("no entry for {handle}")));
        };
        entry.put_name(temp_name.clone())?;

        debug!(meta_handle = %handle, temp_name = %temp_name, final_name, "name set aside");
        self.order.push(handle);
        self.entries.insert(
            handle,
            Pending {
                state: NameAsideState::SetAside {
                    temp_name,
                    final_name: final_name.to_owned(),
                },
                non_unique_name: non_unique_name.to_owned(),
            },
        );
        Ok(true)
    }

    /// Phase two: applies every final name, in set-aside order.
    ///
    /// A name still held by a live sibling outside the batch gets a ` (n)`
    /// suffix. If no free suffix is found the entry keeps its temporary
    /// name. Returns the number of names applied.
    ///
    /// # Errors
    ///
    /// Propagates directory errors from the rename.
    pub fn apply_final_names(&mut self, txn: &mut WriteTransaction<'_>) -> CoreResult<usize> {
        let mut applied = 0;
        for handle in std::mem::take(&mut self.order) {
            let Some(pending) = self.entries.get_mut(&handle) else {
                continue;
            };
            let NameAsideState::SetAside { final_name, .. } = &pending.state else {
                continue;
            };
            let final_name = final_name.clone();

            let Some(entry) = txn.get_by_handle(handle) else {
                continue;
            };
            let parent = entry.parent_id().clone();
            let live = !entry.is_del();

            let name = if live {
                match free_name(txn, &parent, handle, &final_name, self.max_attempts) {
                    Some(name) => name,
                    None => {
                        error!(
                            meta_handle = %handle,
                            name = %final_name,
                            "no free name left; keeping the temporary name"
                        );
                        continue;
                    }
                }
            } else {
                final_name.clone()
            };

            if let Some(mut entry) = txn.get_mut_by_handle(handle) {
                entry.put_name(name.clone())?;
                entry.put_server_name(final_name);
                entry.put_non_unique_name(pending.non_unique_name.clone());
            }
            debug!(meta_handle = %handle, name = %name, "final name applied");
            pending.state = NameAsideState::Applied { name };
            applied += 1;
        }
        Ok(applied)
    }
}

fn is_free(txn: &WriteTransaction<'_>, parent: &EntryId, handle: MetaHandle, name: &str) -> bool {
    txn.child_with_name(parent, name)
        .map_or(true, |owner| owner.meta_handle() == handle)
}

fn free_temp_name(
    txn: &WriteTransaction<'_>,
    parent: &EntryId,
    handle: MetaHandle,
    base: &str,
    max_attempts: u32,
) -> Option<String> {
    if is_free(txn, parent, handle, base) {
        return Some(base.to_owned());
    }
    (1..=max_attempts)
        .map(|n| format!("{base}.{n}"))
        .find(|candidate| is_free(txn, parent, handle, candidate))
}

fn free_name(
    txn: &WriteTransaction<'_>,
    parent: &EntryId,
    handle: MetaHandle,
    name: &str,
    max_attempts: u32,
) -> Option<String> {
    if is_free(txn, parent, handle, name) {
        return Some(name.to_owned());
    }
    (2..max_attempts.saturating_add(2))
        .map(|n| format!("{name} ({n})"))
        .find(|candidate| is_free(txn, parent, handle, candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncdir_core::{DirectoryManager, WriterTag};

    #[test]
    fn swap_needs_no_intermediate_collision() {
        let manager = DirectoryManager::in_memory();
        let dir = manager.open("alice").unwrap();
        let mut txn = dir.write_transaction(WriterTag::Unittest).unwrap();
        let x = txn.create_entry(&EntryId::root(), "x", false).unwrap();
        let y = txn.create_entry(&EntryId::root(), "y", false).unwrap();
        let hx = txn.get_by_id(&x).unwrap().meta_handle();
        let hy = txn.get_by_id(&y).unwrap().meta_handle();

        let mut aside = NameAside::new(&EngineConfig::default());
        aside.set_aside(&mut txn, hx, "y", "y").unwrap();
        aside.set_aside(&mut txn, hy, "x", "x").unwrap();

        assert_eq!(aside.pending(), 2);
        assert_eq!(
            txn.get_by_handle(hx).unwrap().name(),
            format!("y~aside.{}", hx.as_i64())
        );

        assert_eq!(aside.apply_final_names(&mut txn).unwrap(), 2);
        assert_eq!(txn.get_by_id(&x).unwrap().name(), "y");
        assert_eq!(txn.get_by_id(&y).unwrap().name(), "x");
        assert_eq!(txn.get_by_id(&x).unwrap().server_name(), "y");
        assert_eq!(
            aside.state(hx),
            NameAsideState::Applied { name: "y".into() }
        );
    }

    #[test]
    fn taken_name_is_uniquified() {
        let manager = DirectoryManager::in_memory();
        let dir = manager.open("alice").unwrap();
        let mut txn = dir.write_transaction(WriterTag::Unittest).unwrap();
        txn.create_entry(&EntryId::root(), "report", false).unwrap();
        txn.create_entry(&EntryId::root(), "report (2)", false).unwrap();
        let id = txn.create_entry(&EntryId::root(), "draft", false).unwrap();
        let handle = txn.get_by_id(&id).unwrap().meta_handle();

        let mut aside = NameAside::new(&EngineConfig::default());
        aside.set_aside(&mut txn, handle, "report", "report").unwrap();
        aside.apply_final_names(&mut txn).unwrap();

        let entry = txn.get_by_id(&id).unwrap();
        assert_eq!(entry.name(), "report (3)");
        assert_eq!(entry.server_name(), "report");
        assert_eq!(entry.non_unique_name(), "report");
    }

    #[test]
    fn exhausted_attempts_keep_temp_name() {
        let manager = DirectoryManager::in_memory();
        let dir = manager.open("alice").unwrap();
        let mut txn = dir.write_transaction(WriterTag::Unittest).unwrap();
        txn.create_entry(&EntryId::root(), "a", false).unwrap();
        let id = txn.create_entry(&EntryId::root(), "b", false).unwrap();
        let handle = txn.get_by_id(&id).unwrap().meta_handle();

        let config = EngineConfig::default().with_max_uniquify_attempts(0);
        let mut aside = NameAside::new(&config);
        aside.set_aside(&mut txn, handle, "a", "a").unwrap();

        assert_eq!(aside.apply_final_names(&mut txn).unwrap(), 0);
        assert!(matches!(aside.state(handle), NameAsideState::SetAside { .. }));
        assert!(txn.get_by_id(&id).unwrap().name().starts_with("a~aside."));
    }

    #[test]
    fn taken_temp_name_gets_a_counter() {
        let manager = DirectoryManager::in_memory();
        let dir = manager.open("alice").unwrap();
        let mut txn = dir.write_transaction(WriterTag::Unittest).unwrap();
        let id = txn.create_entry(&EntryId::root(), "a", false).unwrap();
        let handle = txn.get_by_id(&id).unwrap().meta_handle();
        let squatter = format!("b~aside.{}", handle.as_i64());
        txn.create_entry(&EntryId::root(), &squatter, false).unwrap();

        let mut aside = NameAside::new(&EngineConfig::default());
        assert!(aside.set_aside(&mut txn, handle, "b", "b").unwrap());
        assert_eq!(txn.get_by_id(&id).unwrap().name(), format!("{squatter}.1"));

        aside.apply_final_names(&mut txn).unwrap();
        assert_eq!(txn.get_by_id(&id).unwrap().name(), "b");
    }

    #[test]
    fn no_free_temp_name_keeps_local_name() {
        let manager = DirectoryManager::in_memory();
        let dir = manager.open("alice").unwrap();
        let mut txn = dir.write_transaction(WriterTag::Unittest).unwrap();
        let id = txn.create_entry(&EntryId::root(), "a", false).unwrap();
        let handle = txn.get_by_id(&id).unwrap().meta_handle();
        txn.create_entry(&EntryId::root(), &format!("b~aside.{}", handle.as_i64()), false)
            .unwrap();

        let config = EngineConfig::default().with_max_uniquify_attempts(0);
        let mut aside = NameAside::new(&config);
        assert!(!aside.set_aside(&mut txn, handle, "b", "b").unwrap());
        assert_eq!(aside.state(handle), NameAsideState::Untouched);
        assert_eq!(txn.get_by_id(&id).unwrap().name(), "a");
    }

    #[test]
    fn untouched_entries_report_untouched() {
        let aside = NameAside::new(&EngineConfig::default());
        assert_eq!(aside.state(MetaHandle::new(42)), NameAsideState::Untouched);
        assert_eq!(aside.pending(), 0);
    }
}
