//! Entry identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

const ROOT: &str = "r";
const CLIENT_PREFIX: char = 'c';
const SERVER_PREFIX: char = 's';

/// Identifier of an entry.
///
/// An id is either:
/// - the root id (`r`)
/// - a client id (`c<n>`), speculative and local until the server accepts
///   the entry; this is the id sent as the pre-commit id
/// - a server id (`s<value>`), durable and assigned by the server
///
/// An entry has exactly one current id. Committing a new entry rewrites its
/// client id to the server id; the entry's meta handle stays the same.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId(String);

impl EntryId {
    /// Returns the root id.
    #[must_use]
    pub fn root() -> Self {
        Self(ROOT.to_owned())
    }

    /// Creates a client id from a local counter value.
    #[must_use]
    pub fn client(n: i64) -> Self {
        Self(format!("{CLIENT_PREFIX}{n}"))
    }

    /// Creates an id from the raw id string the server sent.
    ///
    /// Returns `None` for an empty string.
    #[must_use]
    pub fn from_server_id(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            None
        } else {
            Some(Self(format!("{SERVER_PREFIX}{raw}")))
        }
    }

    /// Creates a server id from any displayable value.
    #[must_use]
    pub fn server(value: impl fmt::Display) -> Self {
        Self(format!("{SERVER_PREFIX}{value}"))
    }

    /// Returns true for the root id.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == ROOT
    }

    /// Returns false exactly for client ids the server has never seen.
    #[must_use]
    pub fn server_knows(&self) -> bool {
        !self.0.starts_with(CLIENT_PREFIX)
    }

    /// Returns the id without its kind prefix, as sent on the wire.
    #[must_use]
    pub fn value(&self) -> &str {
        if self.is_root() {
            &self.0
        } else {
            self.0.get(1..).unwrap_or("")
        }
    }

    /// Returns the full id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
