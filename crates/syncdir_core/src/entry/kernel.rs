//! Entry kernel: the stored state of one entry.

use crate::entry::EntryId;
use crate::types::MetaHandle;
use serde::{Deserialize, Serialize};

/// The full state of one synchronizable entry.
///
/// Kernels are read through [`crate::ReadTransaction`] and
/// [`crate::WriteTransaction`], and mutated only through
/// [`crate::MutableEntry`] inside a write transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryKernel {
    meta_handle: MetaHandle,
    id: EntryId,
    parent_id: EntryId,
    /// Version last acknowledged by the server; 0 until the first commit.
    base_version: i64,
    server_version: i64,
    is_dir: bool,
    is_del: bool,
    is_unsynced: bool,
    /// Unique among live siblings.
    name: String,
    non_unique_name: String,
    server_name: String,
    server_position_in_parent: i64,
    /// Set while the entry is part of an in-flight commit. Never persisted.
    #[serde(skip)]
    syncing: bool,
}

impl EntryKernel {
    pub(crate) fn new(
        meta_handle: MetaHandle,
        id: EntryId,
        parent_id: EntryId,
        name: impl Into<String>,
        is_dir: bool,
    ) -> Self {
        let name = name.into();
        Self {
            meta_handle,
            id,
            parent_id,
            base_version: 0,
            server_version: 0,
            is_dir,
            is_del: false,
            is_unsynced: false,
            non_unique_name: name.clone(),
            name,
            server_name: String::new(),
            server_position_in_parent: 0,
            syncing: false,
        }
    }

    pub(crate) fn root(meta_handle: MetaHandle) -> Self {
        let mut root = Self::new(meta_handle, EntryId::root(), EntryId::root(), "", true);
        root.base_version = 1;
        root.server_version = 1;
        root
    }

    /// Returns the meta handle.
    #[must_use]
    pub fn meta_handle(&self) -> MetaHandle {
        self.meta_handle
    }

    /// Returns the current id.
    #[must_use]
    pub fn id(&self) -> &EntryId {
        &self.id
    }

    /// Returns the parent id.
    #[must_use]
    pub fn parent_id(&self) -> &EntryId {
        &self.parent_id
    }

    /// Returns the base version.
    #[must_use]
    pub fn base_version(&self) -> i64 {
        self.base_version
    }

    /// Returns the last version seen from the server.
    #[must_use]
    pub fn server_version(&self) -> i64 {
        self.server_version
    }

    /// Returns true for folders.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Returns true if the entry is marked deleted.
    #[must_use]
    pub fn is_del(&self) -> bool {
        self.is_del
    }

    /// Returns true while a local change awaits acknowledgment.
    #[must_use]
    pub fn is_unsynced(&self) -> bool {
        self.is_unsynced
    }

    /// Returns the local, sibling-unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name before uniquification.
    #[must_use]
    pub fn non_unique_name(&self) -> &str {
        &self.non_unique_name
    }

    /// Returns the name last acknowledged by the server.
    #[must_use]
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Returns the server-assigned position among siblings.
    #[must_use]
    pub fn server_position_in_parent(&self) -> i64 {
        self.server_position_in_parent
    }

    /// Returns true while the entry is part of an in-flight commit.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.syncing
    }

    /// Returns true if the server has never acknowledged this entry.
    #[must_use]
    pub fn is_new(&self) -> bool {
        !self.id.server_knows()
    }

    /// Returns true if the entry takes part in sibling name uniqueness.
    pub(crate) fn is_live(&self) -> bool {
        !self.is_del && !self.id.is_root()
    }

    pub(crate) fn set_id(&mut self, id: EntryId) {
        self.id = id;
    }

    pub(crate) fn set_parent_id(&mut self, parent_id: EntryId) {
        self.parent_id = parent_id;
    }

    pub(crate) fn set_base_version(&mut self, version: i64) {
        self.base_version = version;
    }

    pub(crate) fn set_server_version(&mut self, version: i64) {
        self.server_version = version;
    }

    pub(crate) fn set_is_del(&mut self, value: bool) {
        self.is_del = value;
    }

    pub(crate) fn set_is_unsynced(&mut self, value: bool) {
        self.is_unsynced = value;
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_non_unique_name(&mut self, name: String) {
        self.non_unique_name = name;
    }

    pub(crate) fn set_server_name(&mut self, name: String) {
        self.server_name = name;
    }

    pub(crate) fn set_server_position_in_parent(&mut self, position: i64) {
        self.server_position_in_parent = position;
    }

    pub(crate) fn set_syncing(&mut self, value: bool) {
        self.syncing = value;
    }

    /// Compares everything a snapshot stores, ignoring in-memory flags.
    pub(crate) fn same_persisted(&self, other: &Self) -> bool {
        let aligned = Self {
            syncing: other.syncing,
            ..self.clone()
        };
        aligned == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_defaults() {
        let kernel = EntryKernel::new(
            MetaHandle::new(2),
            EntryId::client(1),
            EntryId::root(),
            "Folder",
            true,
        );
        assert!(kernel.is_new());
        assert!(kernel.is_live());
        assert_eq!(kernel.base_version(), 0);
        assert_eq!(kernel.non_unique_name(), "Folder");
        assert!(!kernel.is_unsynced());
    }

    #[test]
    fn root_is_known_and_not_live() {
        let root = EntryKernel::root(MetaHandle::new(1));
        assert!(!root.is_new());
        assert!(!root.is_live());
        assert!(root.is_dir());
    }

    #[test]
    fn syncing_is_not_persisted() {
        let mut kernel = EntryKernel::new(
            MetaHandle::new(2),
            EntryId::client(1),
            EntryId::root(),
            "a",
            false,
        );
        kernel.set_syncing(true);

        let mut bytes = Vec::new();
        ciborium::into_writer(&kernel, &mut bytes).unwrap();
        let decoded: EntryKernel = ciborium::from_reader(bytes.as_slice()).unwrap();
        assert!(!decoded.is_syncing());
        assert_eq!(decoded.name(), "a");
    }
}
