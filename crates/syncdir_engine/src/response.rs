//! Per-entry commit responses from the server.

use syncdir_core::EntryId;
use std::fmt;

/// How the server handled one committed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    /// The entry was accepted.
    Success,
    /// The entry conflicts with server state.
    Conflict,
    /// The server asks the client to try again.
    Retry,
    /// The server could not understand the entry.
    InvalidMessage,
    /// The account is over its storage quota.
    OverQuota,
    /// A temporary server-side failure.
    TransientError,
}

impl ResponseType {
    /// Returns true if the entry should be committed again next cycle.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        !matches!(self, ResponseType::Success)
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResponseType::Success => "SUCCESS",
            ResponseType::Conflict => "CONFLICT",
            ResponseType::Retry => "RETRY",
            ResponseType::InvalidMessage => "INVALID_MESSAGE",
            ResponseType::OverQuota => "OVER_QUOTA",
            ResponseType::TransientError => "TRANSIENT_ERROR",
        };
        f.write_str(s)
    }
}

/// Why a response cannot be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedResponse {
    /// The response does not say which local entry it answers.
    MissingPreCommitId,
    /// A success without the server id.
    MissingIdString,
    /// A success without the new version.
    MissingVersion,
}

impl fmt::Display for MalformedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MalformedResponse::MissingPreCommitId => "missing pre_commit_id",
            MalformedResponse::MissingIdString => "success without id_string",
            MalformedResponse::MissingVersion => "success without version",
        };
        f.write_str(s)
    }
}

/// The server's acknowledgment for a single committed entry.
///
/// Matched back to the local entry through `pre_commit_id`, the id the
/// client sent with the commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResponseEntry {
    /// Outcome for this entry.
    pub response_type: ResponseType,
    /// Local id that was sent.
    pub pre_commit_id: Option<EntryId>,
    /// Server id, without kind prefix.
    pub id_string: Option<String>,
    /// New version.
    pub version: Option<i64>,
    /// Position among siblings.
    pub position_in_parent: Option<i64>,
    /// Name the server stored, if it reports one.
    pub name: Option<String>,
    /// Name before uniquification.
    pub non_unique_name: Option<String>,
    /// Parent's server id.
    pub parent_id_string: Option<String>,
    /// Human readable error.
    pub error_message: Option<String>,
}

impl CommitResponseEntry {
    /// Creates a bare response of the given type.
    pub fn new(response_type: ResponseType, pre_commit_id: EntryId) -> Self {
        Self {
            response_type,
            pre_commit_id: Some(pre_commit_id),
            id_string: None,
            version: None,
            position_in_parent: None,
            name: None,
            non_unique_name: None,
            parent_id_string: None,
            error_message: None,
        }
    }

    /// Creates a success response.
    pub fn success(pre_commit_id: EntryId, id_string: impl Into<String>, version: i64) -> Self {
        let mut response = Self::new(ResponseType::Success, pre_commit_id);
        response.id_string = Some(id_string.into());
        response.version = Some(version);
        response
    }

    /// Creates a conflict response.
    pub fn conflict(pre_commit_id: EntryId) -> Self {
        Self::new(ResponseType::Conflict, pre_commit_id)
    }

    /// Creates a transient error response.
    pub fn transient_error(pre_commit_id: EntryId) -> Self {
        Self::new(ResponseType::TransientError, pre_commit_id)
    }

    /// Creates an over quota response.
    pub fn over_quota(pre_commit_id: EntryId) -> Self {
        Self::new(ResponseType::OverQuota, pre_commit_id)
    }

    /// Sets the position in parent.
    #[must_use]
    pub fn with_position(mut self, position: i64) -> Self {
        self.position_in_parent = Some(position);
        self
    }

    /// Sets the name the server stored.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the non-unique name.
    #[must_use]
    pub fn with_non_unique_name(mut self, name: impl Into<String>) -> Self {
        self.non_unique_name = Some(name.into());
        self
    }

    /// Sets the error message.
    #[must_use]
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Checks that the fields this response type needs are present.
    ///
    /// # Errors
    ///
    /// Returns the first missing field.
    pub fn validate(&self) -> Result<(), MalformedResponse> {
        if self.pre_commit_id.is_none() {
            return Err(MalformedResponse::MissingPreCommitId);
        }
        if self.response_type == ResponseType::Success {
            if self.id_string.as_deref().map_or(true, str::is_empty) {
                return Err(MalformedResponse::MissingIdString);
            }
            if self.version.is_none() {
                return Err(MalformedResponse::MissingVersion);
            }
        }
        Ok(())
    }

    /// Returns the server id this response assigns, if any.
    #[must_use]
    pub fn server_id(&self) -> Option<EntryId> {
        self.id_string.as_deref().and_then(EntryId::from_server_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_requires_id_and_version() {
        let ok = CommitResponseEntry::success(EntryId::client(100), "5000", 1);
        assert!(ok.validate().is_ok());
        assert_eq!(ok.server_id(), Some(EntryId::server(5000)));

        let mut missing_id = ok.clone();
        missing_id.id_string = Some(String::new());
        assert_eq!(
            missing_id.validate(),
            Err(MalformedResponse::MissingIdString)
        );

        let mut missing_version = ok;
        missing_version.version = None;
        assert_eq!(
            missing_version.validate(),
            Err(MalformedResponse::MissingVersion)
        );
    }

    #[test]
    fn every_type_requires_pre_commit_id() {
        let mut conflict = CommitResponseEntry::conflict(EntryId::client(1));
        assert!(conflict.validate().is_ok());

        conflict.pre_commit_id = None;
        assert_eq!(
            conflict.validate(),
            Err(MalformedResponse::MissingPreCommitId)
        );
    }

    #[test]
    fn only_success_is_final() {
        assert!(!ResponseType::Success.is_retryable());
        assert!(ResponseType::OverQuota.is_retryable());
        assert_eq!(ResponseType::TransientError.to_string(), "TRANSIENT_ERROR");
    }
}
