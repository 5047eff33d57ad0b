//! Directory snapshot format.
//!
//! A snapshot is the CBOR encoding of [`DirectorySnapshot`]. The backing
//! store holds exactly one snapshot per directory and every commit that
//! changed something replaces it.

use crate::directory::PersistedKernelInfo;
use crate::entry::EntryKernel;
use crate::error::{CoreError, CoreResult};
use crate::types::MetaHandle;
use serde::{Deserialize, Serialize};

/// Snapshot format version written by this build.
pub const SNAPSHOT_FORMAT_VERSION: u16 = 1;

/// Everything a directory persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    /// Format version of this snapshot.
    pub format_version: u16,
    /// Persisted directory info.
    pub info: PersistedKernelInfo,
    /// Next meta handle to hand out.
    pub next_meta_handle: MetaHandle,
    /// All entries, ordered by meta handle.
    pub entries: Vec<EntryKernel>,
}

impl DirectorySnapshot {
    /// Encodes the snapshot to CBOR bytes.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|err| CoreError::snapshot(err.to_string()))?;
        Ok(bytes)
    }

    /// Decodes a snapshot, rejecting unknown format versions.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        let snapshot: Self =
            ciborium::from_reader(bytes).map_err(|err| CoreError::snapshot(err.to_string()))?;

        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }
}
