//! Tag vocabulary per project and its links to projects and issues.
//!
//! A project owns a set of `Tag` rows; projects and issues point at them
//! through `TagLink`s keyed by `TagId`, so a rename never breaks a link.

use glob::{MatchOptions, Pattern};

use crate::access::{self, AccessLevel};
use crate::error::{Error, Result};
use crate::model::{ForgeState, Tag, TagId, TagLink, TagTarget};
use crate::notify::{Notification, Topic};
use crate::session::Session;

fn valid_tag(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next().is_some_and(|first| first.is_ascii_alphanumeric())
        && chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | ' ' | '.' | ':'))
}

/// Trim, drop empties and duplicates, keep the order given.
fn normalize(texts: &[String]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for raw in texts {
        let text = raw.trim();
        if text.is_empty() || out.iter().any(|seen| seen == text) {
            continue;
        }
        if !valid_tag(text) {
            return Err(Error::InvalidTag(text.to_string()));
        }
        out.push(text.to_string());
    }
    Ok(out)
}

pub fn find_tag<'a>(state: &'a ForgeState, project: &str, text: &str) -> Option<&'a Tag> {
    state
        .tags
        .iter()
        .find(|tag| tag.project == project && tag.text == text)
}

/// Tags linked to `target`, in link order.
pub fn tags_of<'a>(state: &'a ForgeState, target: &TagTarget) -> Vec<&'a Tag> {
    state
        .tag_links
        .iter()
        .filter(|link| &link.target == target)
        .filter_map(|link| state.tags.iter().find(|tag| tag.id == link.tag))
        .collect()
}

/// The project's vocabulary sorted by text, optionally filtered by a
/// case-insensitive glob.
pub fn tags_of_project<'a>(
    state: &'a ForgeState,
    project: &str,
    pattern: Option<&str>,
) -> Result<Vec<&'a Tag>> {
    state.project(project)?;
    let pattern = pattern
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            Pattern::new(raw).map_err(|err| Error::InvalidArgument(format!("invalid pattern '{raw}': {err}")))
        })
        .transpose()?;
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let mut tags: Vec<&Tag> = state
        .tags
        .iter()
        .filter(|tag| tag.project == project)
        .filter(|tag| {
            pattern
                .as_ref()
                .map_or(true, |pattern| pattern.matches_with(&tag.text, options))
        })
        .collect();
    tags.sort_by(|a, b| a.text.cmp(&b.text));
    Ok(tags)
}

/// Check the target exists and `actor` may tag it. Returns the canonical
/// actor name.
fn authorize(state: &ForgeState, target: &TagTarget, actor: &str) -> Result<String> {
    match target {
        TagTarget::Project { project } => {
            access::require_level(state, project, actor, AccessLevel::Admin, "tag the project")?;
        }
        TagTarget::Issue { issue } => {
            state.issue(issue)?;
            access::require_level(state, &issue.project, actor, AccessLevel::Ticket, "tag issues")?;
        }
    }
    Ok(state.require_user(actor)?.name.clone())
}

fn tag_notification(state: &ForgeState, target: &TagTarget, added: bool, actor: &str) -> Notification {
    match target {
        TagTarget::Project { project } => {
            let topic = if added { Topic::ProjectTagAdded } else { Topic::ProjectTagRemoved };
            Notification::for_project(state, project, topic, actor)
        }
        TagTarget::Issue { issue } => {
            let topic = if added { Topic::IssueTagAdded } else { Topic::IssueTagRemoved };
            Notification::for_issue(state, issue, topic, actor)
        }
    }
}

/// Return the id of `text` in the project's vocabulary, creating it with
/// `color` when missing.
fn ensure_tag(state: &mut ForgeState, project: &str, text: &str, color: &str) -> TagId {
    if let Some(tag) = find_tag(state, project, text) {
        return tag.id;
    }
    let id = TagId(state.next_tag_id.max(1));
    state.next_tag_id = id.0 + 1;
    state.tags.push(Tag {
        id,
        project: project.to_string(),
        text: text.to_string(),
        description: String::new(),
        color: color.to_string(),
    });
    tracing::debug!(project, tag = text, "tag created");
    id
}

fn link(state: &mut ForgeState, target: &TagTarget, tag: TagId) -> bool {
    let exists = state
        .tag_links
        .iter()
        .any(|link| link.tag == tag && &link.target == target);
    if !exists {
        state.tag_links.push(TagLink {
            tag,
            target: target.clone(),
        });
    }
    !exists
}

fn apply_add(state: &mut ForgeState, target: &TagTarget, texts: &[String], color: &str) -> Vec<String> {
    let project = target.owning_project();
    let mut added = Vec::new();
    for text in texts {
        let id = ensure_tag(state, project, text, color);
        if link(state, target, id) {
            added.push(text.clone());
        }
    }
    added
}

fn apply_remove(state: &mut ForgeState, target: &TagTarget, texts: &[String]) -> Vec<String> {
    let project = target.owning_project();
    let ids: Vec<(TagId, String)> = texts
        .iter()
        .filter_map(|text| find_tag(state, project, text).map(|tag| (tag.id, text.clone())))
        .collect();
    let mut removed = Vec::new();
    for (id, text) in ids {
        let before = state.tag_links.len();
        state
            .tag_links
            .retain(|link| !(link.tag == id && &link.target == target));
        if state.tag_links.len() != before {
            removed.push(text);
        }
    }
    removed
}

fn added_message(target: &TagTarget, added: &[String]) -> String {
    format!("{} tagged with: {}", target.label(), added.join(", "))
}

fn removed_message(target: &TagTarget, removed: &[String]) -> String {
    format!("{} **un**tagged with: {}", target.label(), removed.join(", "))
}

/// Associate tags with a project or issue, creating missing tags with
/// `default_color`.
pub fn add(
    session: &mut Session,
    target: &TagTarget,
    texts: &[String],
    actor: &str,
    default_color: &str,
) -> Result<String> {
    let actor = authorize(session.state(), target, actor)?;
    let texts = normalize(texts)?;

    let added = apply_add(session.state_mut(), target, &texts, default_color);
    if added.is_empty() {
        return Err(Error::NoChange("Nothing to add".to_string()));
    }
    let message = added_message(target, &added);
    tracing::info!(object = ?target, tags = ?added, "tags added");

    let notification = tag_notification(session.state(), target, true, &actor)
        .with_messages([message.clone()])
        .with_payload(serde_json::json!({ "target": target, "tags": added }));
    session.record(notification);
    Ok(message)
}

/// Dissociate tags from one object. Each tag must exist on the project.
pub fn remove(session: &mut Session, target: &TagTarget, texts: &[String], actor: &str) -> Result<String> {
    let state = session.state();
    let actor = authorize(state, target, actor)?;
    let texts = normalize(texts)?;
    if let Some(unknown) = texts
        .iter()
        .find(|text| find_tag(state, target.owning_project(), text).is_none())
    {
        return Err(Error::TagNotFound(unknown.clone()));
    }

    let removed = apply_remove(session.state_mut(), target, &texts);
    if removed.is_empty() {
        return Err(Error::NoChange("Nothing to remove".to_string()));
    }
    let message = removed_message(target, &removed);
    tracing::info!(object = ?target, tags = ?removed, "tags removed");

    let notification = tag_notification(session.state(), target, false, &actor)
        .with_messages([message.clone()])
        .with_payload(serde_json::json!({ "target": target, "tags": removed }));
    session.record(notification);
    Ok(message)
}

/// Make the object's tag set equal `desired`. Returns the added message
/// then the removed message; empty when nothing changed.
pub fn reconcile(
    session: &mut Session,
    target: &TagTarget,
    desired: &[String],
    actor: &str,
    default_color: &str,
) -> Result<Vec<String>> {
    let actor = authorize(session.state(), target, actor)?;
    let desired = normalize(desired)?;
    let current: Vec<String> = tags_of(session.state(), target)
        .into_iter()
        .map(|tag| tag.text.clone())
        .collect();

    let to_add: Vec<String> = desired
        .iter()
        .filter(|text| !current.contains(text))
        .cloned()
        .collect();
    let to_remove: Vec<String> = current
        .iter()
        .filter(|text| !desired.contains(text))
        .cloned()
        .collect();

    let mut messages = Vec::new();
    if !to_add.is_empty() {
        let added = apply_add(session.state_mut(), target, &to_add, default_color);
        let message = added_message(target, &added);
        let notification = tag_notification(session.state(), target, true, &actor)
            .with_messages([message.clone()])
            .with_payload(serde_json::json!({ "target": target, "tags": added }));
        session.record(notification);
        messages.push(message);
    }
    if !to_remove.is_empty() {
        let removed = apply_remove(session.state_mut(), target, &to_remove);
        let message = removed_message(target, &removed);
        let notification = tag_notification(session.state(), target, false, &actor)
            .with_messages([message.clone()])
            .with_payload(serde_json::json!({ "target": target, "tags": removed }));
        session.record(notification);
        messages.push(message);
    }
    tracing::debug!(object = ?target, changes = messages.len(), "tags reconciled");
    Ok(messages)
}

/// Rename a tag and/or change its description or color in place.
///
/// `None` keeps the current description or color.
pub fn rename(
    session: &mut Session,
    project: &str,
    old: &str,
    new: &str,
    description: Option<&str>,
    color: Option<&str>,
    actor: &str,
) -> Result<String> {
    let state = session.state();
    access::require_level(state, project, actor, AccessLevel::Admin, "edit tags")?;
    let actor = state.require_user(actor)?.name.clone();

    let old = old.trim();
    if old.is_empty() {
        return Err(Error::InvalidTag("no tag to edit".to_string()));
    }
    let current = find_tag(state, project, old)
        .ok_or_else(|| Error::TagNotFound(old.to_string()))?
        .clone();
    let new = new.trim();
    if !valid_tag(new) {
        return Err(Error::InvalidTag(new.to_string()));
    }
    let description = description
        .map(str::trim)
        .unwrap_or(current.description.as_str())
        .to_string();
    let color = color
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(current.color.as_str())
        .to_string();

    if new == current.text && description == current.description && color == current.color {
        return Err(Error::NoChange(format!(
            "Old tag: \"{old}\" and new tag \"{new}\" are the same, nothing to edit"
        )));
    }
    if new != current.text && find_tag(state, project, new).is_some() {
        return Err(Error::DuplicateTag(new.to_string()));
    }

    let tag = session
        .state_mut()
        .tags
        .iter_mut()
        .find(|tag| tag.id == current.id)
        .ok_or_else(|| Error::TagNotFound(old.to_string()))?;
    tag.text = new.to_string();
    tag.description = description.clone();
    tag.color = color.clone();

    let message = format!(
        "Edited tag: {}({})[{}] to {new}({description})[{color}]",
        current.text, current.description, current.color
    );
    tracing::info!(project, old, new, "tag edited");

    let notification = Notification::for_project(session.state(), project, Topic::ProjectTagEdited, &actor)
        .with_messages([message.clone()])
        .with_payload(serde_json::json!({ "old": current.text, "new": new }));
    session.record(notification);
    Ok(message)
}

/// Delete tags from the project's vocabulary along with every link to them.
pub fn delete_from_project(
    session: &mut Session,
    project: &str,
    texts: &[String],
    actor: &str,
) -> Result<Vec<String>> {
    let state = session.state();
    access::require_level(state, project, actor, AccessLevel::Admin, "delete tags")?;
    let actor = state.require_user(actor)?.name.clone();
    let texts = normalize(texts)?;
    if texts.is_empty() {
        return Err(Error::InvalidTag("no tag to delete".to_string()));
    }

    let mut doomed = Vec::with_capacity(texts.len());
    for text in &texts {
        let tag = find_tag(state, project, text).ok_or_else(|| Error::TagNotFound(text.clone()))?;
        let mut targets = state
            .tag_links
            .iter()
            .filter(|link| link.tag == tag.id)
            .map(|link| &link.target)
            .peekable();
        let label = if targets.peek().is_some()
            && targets.all(|target| matches!(target, TagTarget::Project { .. }))
        {
            "Project"
        } else {
            "Issue"
        };
        doomed.push((tag.id, text.clone(), label));
    }

    let state = session.state_mut();
    let mut messages = Vec::with_capacity(doomed.len());
    for (id, text, label) in &doomed {
        state.tags.retain(|tag| tag.id != *id);
        state.tag_links.retain(|link| link.tag != *id);
        messages.push(format!("{label} **un**tagged with: {text}"));
    }
    tracing::info!(project, tags = ?texts, "tags deleted");

    let notification = Notification::for_project(session.state(), project, Topic::ProjectTagRemoved, &actor)
        .with_messages(messages.clone())
        .with_payload(serde_json::json!({ "tags": texts }));
    session.record(notification);
    Ok(messages)
}
