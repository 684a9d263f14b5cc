//! Projects, forks, and per-project issue settings.

use std::collections::BTreeMap;

use chrono::Utc;
use ulid::Ulid;

use crate::access::{self, AccessLevel};
use crate::error::{Error, Result};
use crate::model::Project;
use crate::notify::{Notification, Topic};
use crate::session::Session;

/// Parameters for `create`.
#[derive(Debug, Clone)]
pub struct NewProject<'a> {
    pub name: &'a str,
    pub namespace: Option<&'a str>,
    pub owner: &'a str,
    pub description: &'a str,
    pub private: bool,
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'))
}

/// Create a project and return its full name.
pub fn create(
    session: &mut Session,
    new: &NewProject<'_>,
    close_statuses: &[String],
) -> Result<(String, String)> {
    let name = new.name.trim();
    if !valid_name(name) {
        return Err(Error::InvalidArgument(format!("invalid project name '{name}'")));
    }
    let namespace = new
        .namespace
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
        .map(str::to_string);
    if let Some(ns) = &namespace {
        if !valid_name(ns) || ns == "forks" {
            return Err(Error::InvalidArgument(format!("invalid namespace '{ns}'")));
        }
    }

    let owner = session.state().require_user(new.owner)?.name.clone();
    let project = Project {
        uid: Ulid::new().to_string(),
        name: name.to_string(),
        namespace,
        parent: None,
        owner: owner.clone(),
        description: new.description.trim().to_string(),
        private: new.private,
        settings: BTreeMap::from([("issue_tracker".to_string(), "true".to_string())]),
        priorities: BTreeMap::new(),
        close_statuses: close_statuses.to_vec(),
        milestones: Vec::new(),
        custom_fields: Vec::new(),
        open_tickets: 0,
        open_tickets_public: 0,
        created_at: Utc::now(),
    };
    let fullname = project.fullname();
    if session.state().projects.contains_key(&fullname) {
        return Err(Error::DuplicateProject(fullname));
    }

    session.state_mut().projects.insert(fullname.clone(), project);
    tracing::info!(project = %fullname, owner = %owner, "project created");

    let message = format!("Project \"{fullname}\" created");
    let notification = Notification::for_project(session.state(), &fullname, Topic::ProjectNew, &owner)
        .with_messages([message.clone()]);
    session.record(notification);
    Ok((fullname, message))
}

/// Fork `project` for `user`. The fork keeps the parent's issue settings.
pub fn fork(session: &mut Session, project: &str, user: &str) -> Result<(String, String)> {
    let state = session.state();
    let parent = state.project(project)?;
    let owner = state.require_user(user)?.name.clone();
    if parent.private && !access::has_access(state, project, &owner, AccessLevel::Ticket) {
        return Err(Error::ProjectNotFound(project.to_string()));
    }

    let fork = Project {
        uid: Ulid::new().to_string(),
        parent: Some(project.to_string()),
        owner: owner.clone(),
        open_tickets: 0,
        open_tickets_public: 0,
        created_at: Utc::now(),
        ..parent.clone()
    };
    let fullname = fork.fullname();
    if state.projects.contains_key(&fullname) {
        return Err(Error::DuplicateProject(fullname));
    }

    session.state_mut().projects.insert(fullname.clone(), fork);
    tracing::info!(parent = project, fork = %fullname, "project forked");

    let message = format!(
        "Repo \"{project}\" cloned to \"{owner}/{}\"",
        project.rsplit('/').next().unwrap_or(project)
    );
    let notification = Notification::for_project(session.state(), project, Topic::ProjectForked, &owner)
        .with_messages([message.clone()])
        .with_payload(serde_json::json!({ "fork": fullname }));
    session.record(notification);
    Ok((fullname, message))
}

fn record_edit(session: &mut Session, project: &str, actor: &str, message: &str, payload: serde_json::Value) {
    let notification = Notification::for_project(session.state(), project, Topic::ProjectEdit, actor)
        .with_messages([message])
        .with_payload(payload);
    session.record(notification);
}

/// Replace the priority map (weight -> label).
pub fn set_priorities(
    session: &mut Session,
    project: &str,
    priorities: BTreeMap<i32, String>,
    actor: &str,
) -> Result<String> {
    access::require_level(session.state(), project, actor, AccessLevel::Admin, "edit priorities")?;
    if priorities.values().any(|label| label.trim().is_empty()) {
        return Err(Error::InvalidPriority("priority labels cannot be empty".to_string()));
    }
    let record = session.state_mut().project_mut(project)?;
    if record.priorities == priorities {
        return Err(Error::NoChange("Priorities unchanged".to_string()));
    }
    record.priorities = priorities.clone();

    // issues pointing at a dropped weight lose their priority
    for issue in session
        .state_mut()
        .issues
        .iter_mut()
        .filter(|issue| issue.project == project)
    {
        if issue.priority.is_some_and(|weight| !priorities.contains_key(&weight)) {
            issue.priority = None;
        }
    }

    record_edit(session, project, actor, "Priorities updated", serde_json::json!({ "priorities": priorities }));
    Ok("Priorities updated".to_string())
}

/// Replace the list of close statuses.
pub fn set_close_statuses(
    session: &mut Session,
    project: &str,
    statuses: Vec<String>,
    actor: &str,
) -> Result<String> {
    access::require_level(session.state(), project, actor, AccessLevel::Admin, "edit close statuses")?;
    let statuses = dedupe_trimmed(statuses);
    let record = session.state_mut().project_mut(project)?;
    if record.close_statuses == statuses {
        return Err(Error::NoChange("Close statuses unchanged".to_string()));
    }
    record.close_statuses = statuses.clone();

    let message = "List of close status updated";
    record_edit(session, project, actor, message, serde_json::json!({ "close_statuses": statuses }));
    Ok(message.to_string())
}

/// Replace the list of milestones.
pub fn set_milestones(
    session: &mut Session,
    project: &str,
    milestones: Vec<String>,
    actor: &str,
) -> Result<String> {
    access::require_level(session.state(), project, actor, AccessLevel::Admin, "edit milestones")?;
    let milestones = dedupe_trimmed(milestones);
    let record = session.state_mut().project_mut(project)?;
    if record.milestones == milestones {
        return Err(Error::NoChange("Milestones unchanged".to_string()));
    }
    record.milestones = milestones.clone();

    record_edit(session, project, actor, "Milestones updated", serde_json::json!({ "milestones": milestones }));
    Ok("Milestones updated".to_string())
}

/// Set or clear (empty value) one feature setting.
pub fn set_setting(
    session: &mut Session,
    project: &str,
    key: &str,
    value: &str,
    actor: &str,
) -> Result<String> {
    access::require_level(session.state(), project, actor, AccessLevel::Admin, "edit settings")?;
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::InvalidArgument("setting name cannot be empty".to_string()));
    }
    let value = value.trim();
    let record = session.state_mut().project_mut(project)?;
    let current = record.settings.get(key).map(String::as_str).unwrap_or("");
    if current == value {
        return Err(Error::NoChange(format!("Setting {key} unchanged")));
    }
    if value.is_empty() {
        record.settings.remove(key);
    } else {
        record.settings.insert(key.to_string(), value.to_string());
    }

    let message = "Edited successfully settings of repo";
    record_edit(session, project, actor, message, serde_json::json!({ "setting": key, "value": value }));
    Ok(message.to_string())
}

fn dedupe_trimmed(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let trimmed = value.trim();
        if !trimmed.is_empty() && !out.iter().any(|seen| seen == trimmed) {
            out.push(trimmed.to_string());
        }
    }
    out
}
