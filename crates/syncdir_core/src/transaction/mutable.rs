//! Mutable entries.

use crate::directory::DirectoryKernel;
use crate::entry::{EntryId, EntryKernel};
use crate::error::{CoreError, CoreResult};
use crate::types::MetaHandle;
use std::collections::BTreeSet;
use std::ops::Deref;

/// A writable view of one entry inside a [`crate::WriteTransaction`].
///
/// Reads go through `Deref<Target = EntryKernel>`. Setters that touch an
/// index (id, name, parent, deletion) validate against the staged
/// directory and fail instead of breaking uniqueness.
pub struct MutableEntry<'t> {
    kernel: &'t mut DirectoryKernel,
    touched: &'t mut BTreeSet<MetaHandle>,
    handle: MetaHandle,
}

impl<'t> MutableEntry<'t> {
    pub(crate) fn new(
        kernel: &'t mut DirectoryKernel,
        touched: &'t mut BTreeSet<MetaHandle>,
        handle: MetaHandle,
    ) -> Self {
        Self {
            kernel,
            touched,
            handle,
        }
    }

    /// Rewrites the entry's id.
    ///
    /// # Errors
    ///
    /// Fails for the root entry and if another entry already owns `new_id`.
    pub fn put_id(&mut self, new_id: EntryId) -> CoreResult<()> {
        let old_id = self.id().clone();
        if old_id == new_id {
            return Ok(());
        }
        if old_id.is_root() {
            return Err(CoreError::invalid_operation("the root id cannot change"));
        }
        if self.kernel.ids.contains_key(&new_id) {
            return Err(CoreError::DuplicateId { id: new_id });
        }

        self.kernel.ids.remove(&old_id);
        self.kernel.ids.insert(new_id.clone(), self.handle);
        self.update(|e| e.set_id(new_id));
        Ok(())
    }

    /// Rewrites the entry's id and re-parents every child onto it.
    ///
    /// Returns the number of children that followed.
    ///
    /// # Errors
    ///
    /// Same as [`put_id`](Self::put_id).
    pub fn change_entry_id_and_update_children(&mut self, new_id: EntryId) -> CoreResult<usize> {
        let old_id = self.id().clone();
        self.put_id(new_id.clone())?;

        let children = self.kernel.children_of(&old_id);
        for child in &children {
            if let Some(entry) = self.kernel.entries.get_mut(child) {
                entry.set_parent_id(new_id.clone());
                self.touched.insert(*child);
            }
        }
        Ok(children.len())
    }

    /// Moves the entry under another parent.
    ///
    /// # Errors
    ///
    /// Fails if the parent is missing, or a live sibling under it already
    /// owns this entry's name.
    pub fn put_parent_id(&mut self, parent_id: EntryId) -> CoreResult<()> {
        if self.parent_id() == &parent_id {
            return Ok(());
        }
        if self.kernel.get_by_id(&parent_id).is_none() {
            return Err(CoreError::EntryNotFound { id: parent_id });
        }
        if self.is_live() {
            self.check_name_free(&parent_id, self.name())?;
        }
        self.update(|e| e.set_parent_id(parent_id));
        Ok(())
    }

    /// Renames the entry.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NameCollision`] if a live sibling owns `name`.
    pub fn put_name(&mut self, name: impl Into<String>) -> CoreResult<()> {
        let name = name.into();
        if self.name() == name {
            return Ok(());
        }
        if self.is_live() {
            self.check_name_free(self.parent_id(), &name)?;
        }
        self.update(|e| e.set_name(name));
        Ok(())
    }

    /// Marks the entry deleted or undeleted.
    ///
    /// # Errors
    ///
    /// Undeleting fails if a live sibling took the name meanwhile.
    pub fn put_is_del(&mut self, value: bool) -> CoreResult<()> {
        if self.is_del() == value {
            return Ok(());
        }
        if !value {
            self.check_name_free(self.parent_id(), self.name())?;
        }
        self.update(|e| e.set_is_del(value));
        Ok(())
    }

    /// Sets the name before uniquification.
    pub fn put_non_unique_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.update(|e| e.set_non_unique_name(name));
    }

    /// Sets the name last acknowledged by the server.
    pub fn put_server_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.update(|e| e.set_server_name(name));
    }

    /// Sets the base version.
    pub fn put_base_version(&mut self, version: i64) {
        self.update(|e| e.set_base_version(version));
    }

    /// Sets the server version.
    pub fn put_server_version(&mut self, version: i64) {
        self.update(|e| e.set_server_version(version));
    }

    /// Sets the server position among siblings.
    pub fn put_server_position_in_parent(&mut self, position: i64) {
        self.update(|e| e.set_server_position_in_parent(position));
    }

    /// Sets the pending-acknowledgment flag.
    pub fn put_is_unsynced(&mut self, value: bool) {
        self.update(|e| e.set_is_unsynced(value));
    }

    /// Sets the in-flight commit bit. Not persisted.
    pub fn put_syncing(&mut self, value: bool) {
        self.update(|e| e.set_syncing(value));
    }

    fn check_name_free(&self, parent_id: &EntryId, name: &str) -> CoreResult<()> {
        match self
            .kernel
            .live_child_with_name(parent_id, name, Some(self.handle))
        {
            Some(_) => Err(CoreError::NameCollision {
                parent_id: parent_id.clone(),
                name: name.to_owned(),
            }),
            None => Ok(()),
        }
    }

    fn update(&mut self, f: impl FnOnce(&mut EntryKernel)) {
        if let Some(entry) = self.kernel.entries.get_mut(&self.handle) {
            f(entry);
            self.touched.insert(self.handle);
        }
    }
}

impl Deref for MutableEntry<'_> {
    type Target = EntryKernel;

    fn deref(&self) -> &EntryKernel {
        &self.kernel.entries[&self.handle]
    }
}
