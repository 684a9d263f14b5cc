//! Watch resolution: which notification classes a user receives for a
//! project, and who receives a given notification.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::access::{self, AccessLevel, Membership};
use crate::error::{Error, Result};
use crate::model::{ForgeState, IssueKey, IssueWatcher, Project, Watcher};
use crate::notify::{Notification, Topic};
use crate::session::Session;

/// Explicit watch level stored in a `Watcher` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchLevel {
    Off,
    Issues,
    Commits,
    All,
}

impl WatchLevel {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(WatchLevel::Off),
            1 => Some(WatchLevel::Issues),
            2 => Some(WatchLevel::Commits),
            3 => Some(WatchLevel::All),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            WatchLevel::Off => 0,
            WatchLevel::Issues => 1,
            WatchLevel::Commits => 2,
            WatchLevel::All => 3,
        }
    }

    pub fn classes(self) -> Vec<WatchClass> {
        match self {
            WatchLevel::Off => Vec::new(),
            WatchLevel::Issues => vec![WatchClass::Issues],
            WatchLevel::Commits => vec![WatchClass::Commits],
            WatchLevel::All => vec![WatchClass::Issues, WatchClass::Commits],
        }
    }

    fn confirmation(self) -> &'static str {
        match self {
            WatchLevel::Off => "You are no longer watching this project",
            WatchLevel::Issues => "You are now watching issues and PRs on this project",
            WatchLevel::Commits => "You are now watching commits on this project",
            WatchLevel::All => "You are now watching issues, PRs, and commits on this project",
        }
    }
}

/// A notification class a user can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchClass {
    Issues,
    Commits,
}

impl WatchClass {
    pub fn as_str(self) -> &'static str {
        match self {
            WatchClass::Issues => "issues",
            WatchClass::Commits => "commits",
        }
    }
}

impl fmt::Display for WatchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested change: a level, or `-1` to drop the explicit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchRequest {
    Reset,
    Set(WatchLevel),
}

impl FromStr for WatchRequest {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let token = raw.trim();
        if token == "-1" {
            return Ok(WatchRequest::Reset);
        }
        token
            .parse::<u8>()
            .ok()
            .and_then(WatchLevel::from_code)
            .map(WatchRequest::Set)
            .ok_or_else(|| Error::InvalidWatchStatus(raw.to_string()))
    }
}

fn explicit_row<'a>(state: &'a ForgeState, project: &str, user: &str) -> Option<&'a Watcher> {
    state
        .watchers
        .iter()
        .find(|row| row.project == project && row.user == user)
}

/// Classes `user` receives for `project`, issues first.
///
/// Unknown users or projects resolve to nothing.
pub fn get_level(state: &ForgeState, project: &str, user: &str) -> Vec<WatchClass> {
    let Some(user) = state.find_user(user) else {
        return Vec::new();
    };
    if !state.projects.contains_key(project) {
        return Vec::new();
    }

    if let Some(row) = explicit_row(state, project, &user.name) {
        return row.level.classes();
    }

    if access::user_level(state, project, &user.name).is_some() {
        vec![WatchClass::Issues]
    } else {
        Vec::new()
    }
}

/// Change the explicit watch level of `user` on `project`.
pub fn set_status(
    session: &mut Session,
    project: &str,
    user: &str,
    request: WatchRequest,
) -> Result<String> {
    let state = session.state();
    state.project(project)?;
    let username = state.require_user(user)?.name.clone();
    let existing = explicit_row(state, project, &username).map(|row| row.level);

    let (message, changed) = match request {
        WatchRequest::Reset => {
            if existing.is_none() {
                ("Watch status is already reset", false)
            } else {
                session
                    .state_mut()
                    .watchers
                    .retain(|row| !(row.project == project && row.user == username));
                ("Watch status reset", true)
            }
        }
        WatchRequest::Set(level) => {
            let state = session.state_mut();
            match state
                .watchers
                .iter_mut()
                .find(|row| row.project == project && row.user == username)
            {
                Some(row) if row.level == level => (level.confirmation(), false),
                Some(row) => {
                    row.level = level;
                    (level.confirmation(), true)
                }
                None => {
                    state.watchers.push(Watcher {
                        project: project.to_string(),
                        user: username.clone(),
                        level,
                    });
                    (level.confirmation(), true)
                }
            }
        }
    };

    if changed {
        tracing::info!(project, user = %username, ?request, "watch status updated");
        let mut notification = Notification::new(Topic::ProjectWatchUpdated, &username)
            .with_messages([message])
            .with_payload(serde_json::json!({
                "user": username,
                "watch": get_level(session.state(), project, &username),
            }));
        notification.project = Some(project.to_string());
        session.record(notification);
    }

    Ok(message.to_string())
}

/// Projects `user` receives anything for, by project name.
pub fn user_watch_list<'a>(state: &'a ForgeState, user: &str) -> Vec<&'a Project> {
    let mut projects: Vec<&Project> = state
        .projects
        .iter()
        .filter(|(fullname, _)| !get_level(state, fullname, user).is_empty())
        .map(|(_, project)| project)
        .collect();
    projects.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.fullname().cmp(&b.fullname())));
    projects
}

/// Watch or unwatch a single issue.
pub fn watch_issue(session: &mut Session, issue: &IssueKey, user: &str, watch: bool) -> Result<String> {
    let state = session.state();
    let record = state.issue(issue)?;
    let username = state.require_user(user)?.name.clone();
    if record.private
        && record.author != username
        && record.assignee.as_deref() != Some(username.as_str())
        && !access::has_access(state, &issue.project, &username, AccessLevel::Ticket)
    {
        return Err(Error::IssueNotFound {
            project: issue.project.clone(),
            id: issue.id,
        });
    }

    let state = session.state_mut();
    match state
        .issue_watchers
        .iter_mut()
        .find(|row| &row.issue == issue && row.user == username)
    {
        Some(row) => row.watch = watch,
        None => state.issue_watchers.push(IssueWatcher {
            issue: issue.clone(),
            user: username.clone(),
            watch,
        }),
    }

    let message = if watch {
        "You are now watching this issue"
    } else {
        "You are no longer watching this issue"
    };
    let mut notification = Notification::new(Topic::IssueWatchUpdated, &username)
        .with_messages([message])
        .with_payload(serde_json::json!({ "issue": issue, "watch": watch }));
    notification.project = Some(issue.project.clone());
    session.record(notification);

    Ok(message.to_string())
}

/// Users whose watch level includes `class`.
pub fn watchers_of(state: &ForgeState, project: &str, class: WatchClass) -> BTreeSet<String> {
    let Ok(record) = state.project(project) else {
        return BTreeSet::new();
    };

    let mut candidates: BTreeSet<String> =
        access::users_with(state, project, AccessLevel::Ticket, Membership::AtLeast)
            .unwrap_or_default();
    candidates.insert(record.owner.clone());
    candidates.extend(
        state
            .watchers
            .iter()
            .filter(|row| row.project == project)
            .map(|row| row.user.clone()),
    );

    candidates
        .into_iter()
        .filter(|user| get_level(state, project, user).contains(&class))
        .filter(|user| !record.private || access::user_level(state, project, user).is_some())
        .collect()
}

/// Everyone receiving project-level notifications.
pub fn project_audience(state: &ForgeState, project: &str) -> BTreeSet<String> {
    let mut audience = watchers_of(state, project, WatchClass::Issues);
    audience.extend(watchers_of(state, project, WatchClass::Commits));
    audience
}

/// Everyone receiving notifications about one issue.
pub fn issue_audience(state: &ForgeState, key: &IssueKey) -> BTreeSet<String> {
    let Ok(issue) = state.issue(key) else {
        return BTreeSet::new();
    };

    let mut audience = watchers_of(state, &key.project, WatchClass::Issues);
    audience.insert(issue.author.clone());
    audience.extend(issue.assignee.iter().cloned());
    audience.extend(issue.comments.iter().map(|comment| comment.user.clone()));

    for row in state.issue_watchers.iter().filter(|row| &row.issue == key) {
        if row.watch {
            audience.insert(row.user.clone());
        } else {
            audience.remove(&row.user);
        }
    }

    if issue.private {
        audience.retain(|user| {
            user == &issue.author
                || issue.assignee.as_deref() == Some(user.as_str())
                || access::has_access(state, &key.project, user, AccessLevel::Ticket)
        });
    }

    audience
}
