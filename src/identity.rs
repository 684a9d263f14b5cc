//! Users and groups.

use std::collections::BTreeSet;

use chrono::Utc;

use crate::config::GroupsConfig;
use crate::error::{Error, Result};
use crate::model::{Group, User};
use crate::notify::{Notification, Topic};
use crate::session::Session;

/// Register a user.
pub fn create_user(
    session: &mut Session,
    name: &str,
    fullname: &str,
    emails: &[String],
) -> Result<String> {
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(Error::InvalidArgument(format!("invalid username '{name}'")));
    }
    let state = session.state();
    if state.users.contains_key(name) {
        return Err(Error::DuplicateUser(name.to_string()));
    }
    let emails: Vec<String> = emails
        .iter()
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty())
        .collect();
    if let Some(taken) = emails.iter().find(|email| state.find_user(email).is_some()) {
        return Err(Error::DuplicateUser(taken.clone()));
    }

    session.state_mut().users.insert(
        name.to_string(),
        User {
            name: name.to_string(),
            fullname: fullname.trim().to_string(),
            emails,
            created_at: Utc::now(),
        },
    );
    tracing::info!(user = name, "user created");
    Ok(format!("User `{name}` created"))
}

/// Parameters for `add_group`.
#[derive(Debug, Clone)]
pub struct NewGroup<'a> {
    pub name: &'a str,
    pub display_name: &'a str,
    pub description: &'a str,
    pub group_type: &'a str,
    pub creator: &'a str,
}

fn valid_group_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'))
}

/// Create a group; the creator becomes its first member and admin.
pub fn add_group(session: &mut Session, new: &NewGroup<'_>, rules: &GroupsConfig) -> Result<String> {
    let name = new.name.trim();
    let display_name = new.display_name.trim();

    if !valid_group_name(name) {
        return Err(Error::InvalidGroup(format!(
            "Invalid group name: {name}"
        )));
    }
    if rules.blacklist.iter().any(|blocked| blocked == name) {
        return Err(Error::InvalidGroup(
            "This group name has been blacklisted, please choose another one".to_string(),
        ));
    }
    if !rules.types.iter().any(|allowed| allowed == new.group_type) {
        return Err(Error::InvalidGroup(format!(
            "Invalid type for this group: {}",
            new.group_type
        )));
    }

    let state = session.state();
    let creator = state.require_user(new.creator)?.name.clone();
    if state.groups.contains_key(name) {
        return Err(Error::DuplicateGroup(format!(
            "There is already a group named {name}"
        )));
    }
    if state
        .groups
        .values()
        .any(|group| group.display_name == display_name)
    {
        return Err(Error::DuplicateGroup(format!(
            "There is already a group with display name `{display_name}` created"
        )));
    }

    session.state_mut().groups.insert(
        name.to_string(),
        Group {
            name: name.to_string(),
            display_name: display_name.to_string(),
            description: new.description.trim().to_string(),
            group_type: new.group_type.to_string(),
            creator: creator.clone(),
            members: BTreeSet::from([creator.clone()]),
            admins: BTreeSet::from([creator.clone()]),
            created_at: Utc::now(),
        },
    );
    tracing::info!(group = name, creator = %creator, "group created");

    Ok(format!("User `{creator}` added to the group `{name}`."))
}

/// Add `user` to `group`; only group admins may do this.
pub fn add_user_to_group(
    session: &mut Session,
    user: &str,
    group: &str,
    actor: &str,
    as_admin: bool,
) -> Result<String> {
    let state = session.state();
    let username = state.require_user(user)?.name.clone();
    let actor_name = state.require_user(actor)?.name.clone();
    let record = state.group(group)?;

    if !record.is_admin(&actor_name) {
        return Err(Error::NotAuthorized {
            actor: actor_name,
            action: format!("add users to the group `{group}`"),
        });
    }
    if record.is_member(&username) && (!as_admin || record.is_admin(&username)) {
        return Ok(format!(
            "User `{username}` already in the group, nothing to change."
        ));
    }

    let record = session.state_mut().group_mut(group)?;
    record.members.insert(username.clone());
    if as_admin {
        record.admins.insert(username.clone());
    }

    let message = format!("User `{username}` added to the group `{group}`.");
    session.record(
        Notification::new(Topic::GroupUserAdded, &actor_name)
            .with_messages([message.clone()])
            .with_payload(serde_json::json!({ "group": group, "user": username })),
    );
    Ok(message)
}

/// Remove `user` from `group`. The creator can never be removed.
pub fn delete_user_of_group(
    session: &mut Session,
    user: &str,
    group: &str,
    actor: &str,
) -> Result<String> {
    let state = session.state();
    let username = state.require_user(user)?.name.clone();
    let actor_name = state.require_user(actor)?.name.clone();
    let record = state.group(group)?;

    if record.creator == username {
        return Err(Error::InvalidGroup(
            "The creator of a group cannot be removed".to_string(),
        ));
    }
    if !record.is_member(&username) {
        return Err(Error::MembershipNotFound {
            user: username,
            group: group.to_string(),
        });
    }
    if actor_name != username && !record.is_admin(&actor_name) {
        return Err(Error::NotAuthorized {
            actor: actor_name,
            action: format!("remove users from the group `{group}`"),
        });
    }

    let record = session.state_mut().group_mut(group)?;
    record.members.remove(&username);
    record.admins.remove(&username);

    let message = format!("User `{username}` removed from the group `{group}`");
    session.record(
        Notification::new(Topic::GroupUserRemoved, &actor_name)
            .with_messages([message.clone()])
            .with_payload(serde_json::json!({ "group": group, "user": username })),
    );
    Ok(message)
}

/// Change a group's display name and description.
pub fn edit_group_info(
    session: &mut Session,
    group: &str,
    display_name: Option<&str>,
    description: Option<&str>,
    actor: &str,
) -> Result<String> {
    let state = session.state();
    let actor_name = state.require_user(actor)?.name.clone();
    let record = state.group(group)?;
    if !record.is_admin(&actor_name) {
        return Err(Error::NotAuthorized {
            actor: actor_name,
            action: format!("edit the group `{group}`"),
        });
    }

    let new_display = display_name
        .map(str::trim)
        .filter(|value| !value.is_empty() && *value != record.display_name);
    let new_description = description
        .map(str::trim)
        .filter(|value| *value != record.description);

    if new_display.is_none() && new_description.is_none() {
        return Err(Error::NoChange("Nothing changed".to_string()));
    }
    if let Some(display) = new_display {
        if state
            .groups
            .values()
            .any(|other| other.name != group && other.display_name == display)
        {
            return Err(Error::DuplicateGroup(format!(
                "There is already a group with display name `{display}` created"
            )));
        }
    }
    let new_display = new_display.map(str::to_string);
    let new_description = new_description.map(str::to_string);

    let record = session.state_mut().group_mut(group)?;
    if let Some(display) = new_display {
        record.display_name = display;
    }
    if let Some(description) = new_description {
        record.description = description;
    }
    let message = format!("Group \"{}\" ({group}) edited", record.display_name);

    session.record(
        Notification::new(Topic::GroupEdit, &actor_name)
            .with_messages([message.clone()])
            .with_payload(serde_json::json!({ "group": group })),
    );
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn new_group<'a>(name: &'a str, display: &'a str, creator: &'a str) -> NewGroup<'a> {
        NewGroup {
            name,
            display_name: display,
            description: "",
            group_type: "user",
            creator,
        }
    }

    #[test]
    fn create_user_rejects_duplicates() {
        let mut session = fixtures::session();
        let err = create_user(&mut session, "foo", "Foo", &[]).unwrap_err();
        assert!(matches!(err, Error::DuplicateUser(_)));
        let err = create_user(&mut session, "ralph", "Ralph", &["foo@bar.com".to_string()])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateUser(email) if email == "foo@bar.com"));
        let err = create_user(&mut session, "two words", "", &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn add_group_validation() {
        let mut session = fixtures::session();
        let rules = GroupsConfig::default();

        let err = add_group(&mut session, &new_group("foo bar", "foo group", "pingou"), &rules)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidGroup(_)));

        let err = add_group(&mut session, &new_group("group", "foo group", "pingou"), &rules)
            .unwrap_err();
        assert!(err.to_string().contains("blacklisted"));

        let err = add_group(&mut session, &new_group("foo", "foo group", "ralph"), &rules)
            .unwrap_err();
        assert!(matches!(err, Error::UserNotFound(_)));

        let mut bad_type = new_group("foo", "foo group", "pingou");
        bad_type.group_type = "bar";
        let err = add_group(&mut session, &bad_type, &rules).unwrap_err();
        assert!(err.to_string().contains("Invalid type"));

        let msg = add_group(&mut session, &new_group("foo", "foo group", "pingou"), &rules).unwrap();
        assert_eq!(msg, "User `pingou` added to the group `foo`.");

        let err = add_group(&mut session, &new_group("foo", "other", "pingou"), &rules).unwrap_err();
        assert!(matches!(err, Error::DuplicateGroup(_)));
        let err = add_group(&mut session, &new_group("foo2", "foo group", "pingou"), &rules)
            .unwrap_err();
        assert!(err.to_string().contains("display name"));
    }

    #[test]
    fn group_membership_flow() {
        let mut session = fixtures::session();
        add_group(&mut session, &new_group("foo", "foo group", "pingou"), &GroupsConfig::default())
            .unwrap();

        let err = add_user_to_group(&mut session, "foo", "foo", "foo", false).unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));

        assert_eq!(
            add_user_to_group(&mut session, "foo", "foo", "pingou", false).unwrap(),
            "User `foo` added to the group `foo`."
        );
        assert_eq!(
            add_user_to_group(&mut session, "foo", "foo", "pingou", false).unwrap(),
            "User `foo` already in the group, nothing to change."
        );

        let err = delete_user_of_group(&mut session, "pingou", "foo", "pingou").unwrap_err();
        assert!(err.to_string().contains("creator"));

        delete_user_of_group(&mut session, "foo", "foo", "foo").unwrap();
        let err = delete_user_of_group(&mut session, "foo", "foo", "pingou").unwrap_err();
        assert!(matches!(err, Error::MembershipNotFound { .. }));
    }

    #[test]
    fn edit_group_info_reports_changes() {
        let mut session = fixtures::session();
        add_group(&mut session, &new_group("foo", "foo group", "pingou"), &GroupsConfig::default())
            .unwrap();

        let err = edit_group_info(&mut session, "foo", Some("foo group"), Some(""), "pingou")
            .unwrap_err();
        assert!(err.is_no_op());
        assert_eq!(err.to_string(), "Nothing changed");

        let msg = edit_group_info(&mut session, "foo", Some("edited name"), Some("Lorem"), "pingou")
            .unwrap();
        assert_eq!(msg, "Group \"edited name\" (foo) edited");

        let err = edit_group_info(&mut session, "foo", Some("x"), None, "foo").unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));
    }
}
