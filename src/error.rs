//! Error types for forgecore
//!
//! Exit codes:
//! - 0: Success (including "nothing to change" outcomes)
//! - 2: User error (validation failure, unknown user/project/issue/tag)
//! - 3: Not authorized (actor lacks the required access tier)
//! - 4: Operation failed (storage, lock, serialization)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the forgecore CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const NOT_AUTHORIZED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Coarse classification of every error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Authorization,
    NoOp,
    Storage,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Authorization => "authorization",
            ErrorKind::NoOp => "no_op",
            ErrorKind::Storage => "storage",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Main error type for forgecore operations
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Access level not found: {0}")]
    AccessLevelNotFound(String),

    #[error("Invalid watch status: {0}")]
    InvalidWatchStatus(String),

    #[error("Invalid priority: {0}")]
    InvalidPriority(String),

    #[error("Invalid close status: {0}")]
    InvalidCloseStatus(String),

    #[error("An issue cannot depend on itself (#{0})")]
    SelfDependency(u64),

    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    #[error("Tag already exists: {0}")]
    DuplicateTag(String),

    #[error("Invalid group: {0}")]
    InvalidGroup(String),

    #[error("Group already exists: {0}")]
    DuplicateGroup(String),

    #[error("User already exists: {0}")]
    DuplicateUser(String),

    #[error("Project already exists: {0}")]
    DuplicateProject(String),

    #[error("Invalid value for custom field {field}: {reason}")]
    InvalidCustomValue { field: String, reason: String },

    #[error("{0}")]
    OwnerAccess(String),

    #[error("Forge not initialized at {0}")]
    NotInitialized(PathBuf),

    // Not-found errors (exit code 2)
    #[error("No user found: {0}")]
    UserNotFound(String),

    #[error("No group found: {0}")]
    GroupNotFound(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Issue #{id} not found in {project}")]
    IssueNotFound { project: String, id: u64 },

    #[error("Tag not found: {0}")]
    TagNotFound(String),

    #[error("{principal} has no access on {project}")]
    GrantNotFound { project: String, principal: String },

    #[error("User `{user}` could not be found in the group `{group}`")]
    MembershipNotFound { user: String, group: String },

    #[error("Custom field not found: {0}")]
    CustomFieldNotFound(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    // Authorization errors (exit code 3)
    #[error("`{actor}` is not allowed to {action}")]
    NotAuthorized { actor: String, action: String },

    // No-op outcome (exit code 0)
    #[error("{0}")]
    NoChange(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::AccessLevelNotFound(_)
            | Error::InvalidWatchStatus(_)
            | Error::InvalidPriority(_)
            | Error::InvalidCloseStatus(_)
            | Error::SelfDependency(_)
            | Error::InvalidTag(_)
            | Error::DuplicateTag(_)
            | Error::InvalidGroup(_)
            | Error::DuplicateGroup(_)
            | Error::DuplicateUser(_)
            | Error::DuplicateProject(_)
            | Error::InvalidCustomValue { .. }
            | Error::OwnerAccess(_)
            | Error::NotInitialized(_) => ErrorKind::Validation,

            Error::UserNotFound(_)
            | Error::GroupNotFound(_)
            | Error::ProjectNotFound(_)
            | Error::IssueNotFound { .. }
            | Error::TagNotFound(_)
            | Error::GrantNotFound { .. }
            | Error::MembershipNotFound { .. }
            | Error::CustomFieldNotFound(_)
            | Error::JobNotFound(_) => ErrorKind::NotFound,

            Error::NotAuthorized { .. } => ErrorKind::Authorization,

            Error::NoChange(_) => ErrorKind::NoOp,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_) => ErrorKind::Storage,

            Error::OperationFailed(_) => ErrorKind::Internal,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::NoOp => exit_codes::SUCCESS,
            ErrorKind::Validation | ErrorKind::NotFound => exit_codes::USER_ERROR,
            ErrorKind::Authorization => exit_codes::NOT_AUTHORIZED,
            ErrorKind::Storage | ErrorKind::Internal => exit_codes::OPERATION_FAILED,
        }
    }

    /// True when the request was valid but would not change anything
    pub fn is_no_op(&self) -> bool {
        self.kind() == ErrorKind::NoOp
    }

    /// Structured fields for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::IssueNotFound { project, id } => Some(serde_json::json!({
                "project": project,
                "issue": id,
            })),
            Error::NotAuthorized { actor, action } => Some(serde_json::json!({
                "actor": actor,
                "action": action,
            })),
            Error::GrantNotFound { project, principal } => Some(serde_json::json!({
                "project": project,
                "principal": principal,
            })),
            Error::MembershipNotFound { user, group } => Some(serde_json::json!({
                "user": user,
                "group": group,
            })),
            Error::InvalidCustomValue { field, reason } => Some(serde_json::json!({
                "field": field,
                "reason": reason,
            })),
            Error::LockFailed(path) | Error::NotInitialized(path) => Some(serde_json::json!({
                "path": path.display().to_string(),
            })),
            _ => None,
        }
    }
}

/// Result type alias for forgecore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            kind: err.kind().as_str(),
            details: err.details(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_exit_codes() {
        assert_eq!(
            Error::AccessLevelNotFound("owner".into()).exit_code(),
            exit_codes::USER_ERROR
        );
        assert_eq!(
            Error::TagNotFound("foo".into()).exit_code(),
            exit_codes::USER_ERROR
        );
        assert_eq!(
            Error::NotAuthorized {
                actor: "foo".into(),
                action: "grant access".into()
            }
            .exit_code(),
            exit_codes::NOT_AUTHORIZED
        );
        assert_eq!(
            Error::LockFailed(PathBuf::from("x")).exit_code(),
            exit_codes::OPERATION_FAILED
        );
        assert_eq!(
            Error::NoChange("Nothing changed".into()).exit_code(),
            exit_codes::SUCCESS
        );
    }

    #[test]
    fn unknown_level_and_unknown_principal_are_distinct_kinds() {
        let level = Error::AccessLevelNotFound("owner".into());
        let user = Error::UserNotFound("ralph".into());
        assert_eq!(level.kind(), ErrorKind::Validation);
        assert_eq!(user.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn json_error_carries_details() {
        let err = Error::IssueNotFound {
            project: "test".into(),
            id: 4,
        };
        let json = serde_json::to_value(JsonError::from(&err)).expect("serialize");
        assert_eq!(json["kind"], "not_found");
        assert_eq!(json["details"]["issue"], 4);
        assert_eq!(json["error"], "Issue #4 not found in test");
    }
}
