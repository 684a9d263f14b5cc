use std::path::PathBuf;

use forgecore::error::{exit_codes, Error, JsonError};

#[test]
fn exit_codes_map_correctly() {
    let user = Error::InvalidArgument("bad".to_string());
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let missing = Error::IssueNotFound {
        project: "test".to_string(),
        id: 4,
    };
    assert_eq!(missing.exit_code(), exit_codes::USER_ERROR);

    let denied = Error::NotAuthorized {
        actor: "foo".to_string(),
        action: "edit tags".to_string(),
    };
    assert_eq!(denied.exit_code(), exit_codes::NOT_AUTHORIZED);

    let no_op = Error::NoChange("Nothing to add".to_string());
    assert_eq!(no_op.exit_code(), exit_codes::SUCCESS);
    assert!(no_op.is_no_op());

    let op = Error::LockFailed(PathBuf::from(".forge/lock"));
    assert_eq!(op.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn json_error_includes_code_and_details() {
    let err = Error::IssueNotFound {
        project: "test".to_string(),
        id: 4,
    };
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::USER_ERROR);
    assert_eq!(json.kind, "not_found");
    assert!(json.error.contains("Issue #4 not found"));
    let details = json.details.expect("details");
    assert_eq!(details["issue"], 4);
}

#[test]
fn not_initialized_is_a_validation_error() {
    let err = Error::NotInitialized(PathBuf::from("/tmp/forge"));
    let json = JsonError::from(&err);
    assert_eq!(json.kind, "validation");
    assert_eq!(json.details.expect("details")["path"], "/tmp/forge");
}
