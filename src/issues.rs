//! Issue lifecycle: creation, edits, assignment and comments.
//!
//! Every mutation recomputes the owning project's ticket counters so that
//! `open_tickets_public <= open_tickets` holds after each call.

use chrono::Utc;
use serde::Serialize;
use ulid::Ulid;

use crate::access::{self, AccessLevel};
use crate::error::{Error, Result};
use crate::model::{Comment, ForgeState, Issue, IssueKey, IssueStatus, Project};
use crate::notify::{Notification, Topic};
use crate::session::Session;

/// Whether `viewer` may see `issue`. Public issues are visible to anyone.
pub fn can_view(state: &ForgeState, issue: &Issue, viewer: &str) -> bool {
    !issue.private
        || issue.author == viewer
        || issue.assignee.as_deref() == Some(viewer)
        || access::has_access(state, &issue.project, viewer, AccessLevel::Ticket)
}

fn require_visible(state: &ForgeState, key: &IssueKey, viewer: &str) -> Result<()> {
    if can_view(state, state.issue(key)?, viewer) {
        Ok(())
    } else {
        Err(Error::IssueNotFound {
            project: key.project.clone(),
            id: key.id,
        })
    }
}

fn tracker_enabled(project: &Project) -> bool {
    project
        .setting("issue_tracker")
        .map_or(true, |value| !value.eq_ignore_ascii_case("false"))
}

fn check_priority(project: &Project, priority: i32) -> Result<()> {
    if project.priorities.contains_key(&priority) {
        Ok(())
    } else {
        Err(Error::InvalidPriority(format!(
            "priority {priority} is not configured on {}",
            project.fullname()
        )))
    }
}

fn check_milestone(project: &Project, milestone: &str) -> Result<()> {
    if project.milestones.iter().any(|known| known == milestone) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "unknown milestone '{milestone}'"
        )))
    }
}

/// Parameters for `new_issue`.
#[derive(Debug, Clone, Default)]
pub struct NewIssue<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub private: bool,
    pub priority: Option<i32>,
    pub assignee: Option<&'a str>,
    pub milestone: Option<&'a str>,
}

/// Open a new issue on `project` authored by `author`.
pub fn new_issue(
    session: &mut Session,
    project: &str,
    new: &NewIssue<'_>,
    author: &str,
) -> Result<IssueKey> {
    let state = session.state();
    let record = state.project(project)?;
    let author = state.require_user(author)?.name.clone();
    if record.private && !access::has_access(state, project, &author, AccessLevel::Ticket) {
        return Err(Error::ProjectNotFound(project.to_string()));
    }
    if !tracker_enabled(record) {
        return Err(Error::InvalidArgument(format!(
            "no issue tracker found for {project}"
        )));
    }
    let title = new.title.trim();
    if title.is_empty() {
        return Err(Error::InvalidArgument("issue title cannot be empty".to_string()));
    }

    let sets_metadata = new.priority.is_some() || new.assignee.is_some() || new.milestone.is_some();
    if sets_metadata && !access::has_access(state, project, &author, AccessLevel::Ticket) {
        return Err(Error::NotAuthorized {
            actor: author,
            action: "set issue metadata".to_string(),
        });
    }
    if let Some(priority) = new.priority {
        check_priority(record, priority)?;
    }
    if let Some(milestone) = new.milestone {
        check_milestone(record, milestone)?;
    }
    let assignee = match new.assignee.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => Some(state.require_user(name)?.name.clone()),
        None => None,
    };

    let id = state.next_issue_id(project);
    let now = Utc::now();
    let issue = Issue {
        uid: Ulid::new().to_string(),
        project: project.to_string(),
        id,
        title: title.to_string(),
        content: new.content.to_string(),
        author: author.clone(),
        status: IssueStatus::Open,
        close_status: None,
        private: new.private,
        priority: new.priority,
        assignee,
        milestone: new.milestone.map(str::to_string),
        custom_values: Default::default(),
        comments: Vec::new(),
        created_at: now,
        updated_at: now,
        closed_at: None,
    };
    let key = issue.key();

    let state = session.state_mut();
    state.issues.push(issue);
    state.recompute_counters(project)?;
    tracing::info!(issue = %key, author = %author, "issue created");

    let notification = Notification::for_issue(session.state(), &key, Topic::IssueNew, &author)
        .with_messages([format!("Issue #{id} created")])
        .with_payload(serde_json::json!({ "issue": key, "title": title }));
    session.record(notification);
    Ok(key)
}

/// Requested changes for `edit_issue`. `None` leaves a field alone; for the
/// optional fields `Some(None)` clears them.
#[derive(Debug, Clone, Default)]
pub struct IssueEdit {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<IssueStatus>,
    pub close_status: Option<String>,
    pub private: Option<bool>,
    pub priority: Option<Option<i32>>,
    pub milestone: Option<Option<String>>,
}

/// What `edit_issue` changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditOutcome {
    pub messages: Vec<String>,
    pub fields: Vec<&'static str>,
}

fn python_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Apply an edit and report every change, in a fixed order.
pub fn edit_issue(
    session: &mut Session,
    key: &IssueKey,
    edit: &IssueEdit,
    actor: &str,
) -> Result<EditOutcome> {
    let state = session.state();
    let actor = state.require_user(actor)?.name.clone();
    require_visible(state, key, &actor)?;
    let project = state.project(&key.project)?.clone();
    let issue = state.issue(key)?;

    let touches_text = edit.title.is_some() || edit.content.is_some();
    let touches_meta = edit.status.is_some()
        || edit.close_status.is_some()
        || edit.private.is_some()
        || edit.priority.is_some()
        || edit.milestone.is_some();
    let is_ticket = access::has_access(state, &key.project, &actor, AccessLevel::Ticket);
    if (touches_meta && !is_ticket) || (touches_text && !is_ticket && issue.author != actor) {
        return Err(Error::NotAuthorized {
            actor,
            action: format!("edit issue {key}"),
        });
    }

    if let Some(close_status) = &edit.close_status {
        if !project.close_statuses.iter().any(|known| known == close_status) {
            return Err(Error::InvalidCloseStatus(close_status.clone()));
        }
    }
    if let Some(Some(priority)) = edit.priority {
        check_priority(&project, priority)?;
    }
    if let Some(Some(milestone)) = &edit.milestone {
        check_milestone(&project, milestone)?;
    }
    if let Some(title) = &edit.title {
        if title.trim().is_empty() {
            return Err(Error::InvalidArgument("issue title cannot be empty".to_string()));
        }
    }

    let now = Utc::now();
    let issue = session.state_mut().issue_mut(key)?;
    let mut outcome = EditOutcome::default();

    if let Some(title) = edit.title.as_deref().map(str::trim) {
        if title != issue.title {
            issue.title = title.to_string();
            outcome.fields.push("title");
        }
    }
    if let Some(content) = &edit.content {
        if *content != issue.content {
            issue.content = content.clone();
            outcome.fields.push("content");
        }
    }

    // reopening drops any close status given with it
    let mut close_status = edit.close_status.clone();
    if let Some(status) = edit.status {
        if status != issue.status {
            let old = issue.status;
            issue.status = status;
            match status {
                IssueStatus::Closed => issue.closed_at = Some(now),
                IssueStatus::Open => {
                    issue.closed_at = None;
                    if issue.close_status.take().is_some() {
                        outcome.fields.push("close_status");
                    }
                    close_status = None;
                }
            }
            outcome.fields.push("status");
            outcome
                .messages
                .push(format!("Issue status updated to: {status} (was: {old})"));
        }
    }

    if let Some(requested) = close_status {
        if issue.close_status.as_deref() != Some(requested.as_str()) {
            let mut message = format!("Issue close_status updated to: {requested}");
            if let Some(old) = issue.close_status.replace(requested) {
                message.push_str(&format!(" (was: {old})"));
            }
            if issue.status == IssueStatus::Open {
                issue.status = IssueStatus::Closed;
                issue.closed_at = Some(now);
                outcome.fields.push("status");
            }
            outcome.fields.push("close_status");
            outcome.messages.push(message);
        }
    }

    if let Some(private) = edit.private {
        if private != issue.private {
            let old = issue.private;
            issue.private = private;
            let mut message = format!("Issue private status set to: {}", python_bool(private));
            if old {
                message.push_str(&format!(" (was: {})", python_bool(old)));
            }
            outcome.fields.push("private");
            outcome.messages.push(message);
        }
    }

    if let Some(priority) = edit.priority {
        if priority != issue.priority {
            let label = |weight: Option<i32>| match weight {
                Some(weight) => project
                    .priority_label(weight)
                    .map(str::to_string)
                    .unwrap_or_else(|| weight.to_string()),
                None => "None".to_string(),
            };
            let old = issue.priority;
            issue.priority = priority;
            let mut message = format!("Issue priority set to: {}", label(priority));
            if old.is_some() {
                message.push_str(&format!(" (was: {})", label(old)));
            }
            outcome.fields.push("priority");
            outcome.messages.push(message);
        }
    }

    if let Some(milestone) = &edit.milestone {
        if *milestone != issue.milestone {
            let old = std::mem::replace(&mut issue.milestone, milestone.clone());
            let mut message = format!(
                "Issue set to the milestone: {}",
                milestone.as_deref().unwrap_or("None")
            );
            if let Some(old) = old {
                message.push_str(&format!(" (was: {old})"));
            }
            outcome.fields.push("milestone");
            outcome.messages.push(message);
        }
    }

    if outcome.fields.is_empty() {
        return Err(Error::NoChange("No changes to edit".to_string()));
    }
    issue.updated_at = now;
    session.state_mut().recompute_counters(&key.project)?;
    tracing::info!(issue = %key, fields = ?outcome.fields, "issue edited");

    let notification = Notification::for_issue(session.state(), key, Topic::IssueEdit, &actor)
        .with_messages(outcome.messages.clone())
        .with_payload(serde_json::json!({ "issue": key, "fields": outcome.fields }));
    session.record(notification);
    Ok(outcome)
}

/// Assign the issue, or reset its assignee with `None`.
///
/// The message repeats `assignee` as given, so an email stays an email.
pub fn assign(
    session: &mut Session,
    key: &IssueKey,
    assignee: Option<&str>,
    actor: &str,
) -> Result<Option<String>> {
    let state = session.state();
    access::require_level(state, &key.project, actor, AccessLevel::Ticket, "assign issues")?;
    let actor = state.require_user(actor)?.name.clone();
    let current = state.issue(key)?.assignee.clone();

    let requested = assignee.map(str::trim).filter(|name| !name.is_empty());
    let (message, topic, new_assignee) = match (requested, current) {
        (None, None) => return Ok(None),
        (None, Some(old)) => ("Assignee reset".to_string(), Topic::IssueAssignedReset, (None, Some(old))),
        (Some(given), old) => {
            let username = state.require_user(given)?.name.clone();
            if old.as_deref() == Some(username.as_str()) {
                return Ok(None);
            }
            let message = match &old {
                Some(old) => format!("Issue assigned to {given} (was: {old})"),
                None => format!("Issue assigned to {given}"),
            };
            (message, Topic::IssueAssignedAdded, (Some(username), old))
        }
    };

    let (assignee, previous) = new_assignee;
    let issue = session.state_mut().issue_mut(key)?;
    issue.assignee = assignee.clone();
    issue.updated_at = Utc::now();
    tracing::info!(issue = %key, assignee = ?assignee, "issue assignee changed");

    let mut notification = Notification::for_issue(session.state(), key, topic, &actor)
        .with_messages([message.clone()])
        .with_payload(serde_json::json!({
            "issue": key,
            "assignee": assignee,
            "previous": previous,
        }));
    // the previous assignee still hears about the reset
    if let Some(previous) = previous.filter(|name| *name != actor) {
        notification.audience.insert(previous);
    }
    session.record(notification);
    Ok(Some(message))
}

/// Append a comment to the issue.
pub fn add_comment(session: &mut Session, key: &IssueKey, text: &str, actor: &str) -> Result<String> {
    let state = session.state();
    let actor = state.require_user(actor)?.name.clone();
    require_visible(state, key, &actor)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidArgument("comment cannot be empty".to_string()));
    }

    let now = Utc::now();
    let issue = session.state_mut().issue_mut(key)?;
    let id = issue.comments.iter().map(|comment| comment.id).max().unwrap_or(0) + 1;
    issue.comments.push(Comment {
        id,
        user: actor.clone(),
        comment: text.to_string(),
        created_at: now,
    });
    issue.updated_at = now;

    let message = "Comment added";
    let notification = Notification::for_issue(session.state(), key, Topic::IssueCommentAdded, &actor)
        .with_messages([message])
        .with_payload(serde_json::json!({ "issue": key, "comment_id": id }));
    session.record(notification);
    Ok(message.to_string())
}
