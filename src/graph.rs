//! Blocking and depends-on edges between issues.
//!
//! An edge `blocking -> blocked` makes `blocked` a child of `blocking` and
//! `blocking` a parent of `blocked`. Edges stay inside one fork family.
//! Cycles are not rejected.

use std::str::FromStr;

use crate::access::{self, AccessLevel};
use crate::error::{Error, Result};
use crate::model::{DependencyEdge, ForgeState, IssueKey};
use crate::notify::{Notification, Topic};
use crate::session::Session;

/// An issue id as users type it: `3` or `#3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IssueRef(pub u64);

impl FromStr for IssueRef {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        trimmed
            .strip_prefix('#')
            .unwrap_or(trimmed)
            .trim()
            .parse::<u64>()
            .map(IssueRef)
            .map_err(|_| Error::InvalidArgument(format!("invalid issue reference '{raw}'")))
    }
}

impl From<u64> for IssueRef {
    fn from(id: u64) -> Self {
        IssueRef(id)
    }
}

/// Parse and de-duplicate ids, keeping the first occurrence's position.
pub fn parse_refs<S: AsRef<str>>(raw: &[S]) -> Result<Vec<IssueRef>> {
    let mut refs: Vec<IssueRef> = Vec::new();
    for value in raw {
        let parsed: IssueRef = value.as_ref().parse()?;
        if !refs.contains(&parsed) {
            refs.push(parsed);
        }
    }
    Ok(refs)
}

/// Find issue `id` in `project`, then in each project it was forked from.
pub fn resolve_ref(state: &ForgeState, project: &str, id: IssueRef) -> Result<IssueKey> {
    state.project(project)?;
    state
        .lineage(project)
        .into_iter()
        .map(|name| IssueKey::new(name, id.0))
        .find(|key| state.issue(key).is_ok())
        .ok_or_else(|| Error::IssueNotFound {
            project: project.to_string(),
            id: id.0,
        })
}

fn same_family(state: &ForgeState, a: &str, b: &str) -> bool {
    let root = |project: &str| state.lineage(project).pop();
    a == b || root(a) == root(b)
}

/// Issues that `key` blocks.
pub fn children(state: &ForgeState, key: &IssueKey) -> Vec<IssueKey> {
    state
        .dependencies
        .iter()
        .filter(|edge| &edge.blocking == key)
        .map(|edge| edge.blocked.clone())
        .collect()
}

/// Issues that `key` depends on.
pub fn parents(state: &ForgeState, key: &IssueKey) -> Vec<IssueKey> {
    state
        .dependencies
        .iter()
        .filter(|edge| &edge.blocked == key)
        .map(|edge| edge.blocking.clone())
        .collect()
}

fn require_ticket(state: &ForgeState, keys: [&IssueKey; 2], actor: &str) -> Result<String> {
    for key in keys {
        state.issue(key)?;
        access::require_level(state, &key.project, actor, AccessLevel::Ticket, "edit issue dependencies")?;
    }
    Ok(state.require_user(actor)?.name.clone())
}

fn has_edge(state: &ForgeState, blocking: &IssueKey, blocked: &IssueKey) -> bool {
    state
        .dependencies
        .iter()
        .any(|edge| &edge.blocking == blocking && &edge.blocked == blocked)
}

fn record(
    session: &mut Session,
    anchor: &IssueKey,
    topic: Topic,
    actor: &str,
    edge: (&IssueKey, &IssueKey),
    message: &str,
) {
    let notification = Notification::for_issue(session.state(), anchor, topic, actor)
        .with_messages([message])
        .with_payload(serde_json::json!({ "blocking": edge.0, "blocked": edge.1 }));
    session.record(notification);
}

/// Add `blocking -> blocked`. Returns `None` if the edge already exists.
pub fn add_edge(
    session: &mut Session,
    blocking: &IssueKey,
    blocked: &IssueKey,
    actor: &str,
) -> Result<Option<String>> {
    if blocking == blocked {
        return Err(Error::SelfDependency(blocking.id));
    }
    let state = session.state();
    let actor = require_ticket(state, [blocking, blocked], actor)?;
    if !same_family(state, &blocking.project, &blocked.project) {
        return Err(Error::InvalidArgument(format!(
            "{blocking} and {blocked} are not in the same project family"
        )));
    }
    if has_edge(state, blocking, blocked) {
        return Ok(None);
    }

    session.state_mut().dependencies.push(DependencyEdge {
        blocking: blocking.clone(),
        blocked: blocked.clone(),
    });
    let message = format!("Issue marked as depending on: #{}", blocked.id);
    tracing::info!(blocking = %blocking, blocked = %blocked, "dependency added");
    record(session, blocking, Topic::IssueDependencyAdded, &actor, (blocking, blocked), &message);
    Ok(Some(message))
}

/// Drop the edge `depends_on -> issue`, i.e. `issue` stops depending on
/// `depends_on`. Called with the pair the other way round this does nothing
/// and returns `None`.
pub fn remove_edge(
    session: &mut Session,
    issue: &IssueKey,
    depends_on: &IssueKey,
    actor: &str,
) -> Result<Option<String>> {
    if issue == depends_on {
        return Err(Error::SelfDependency(issue.id));
    }
    let state = session.state();
    let actor = require_ticket(state, [issue, depends_on], actor)?;
    if !has_edge(state, depends_on, issue) {
        return Ok(None);
    }

    session
        .state_mut()
        .dependencies
        .retain(|edge| !(&edge.blocking == depends_on && &edge.blocked == issue));
    let message = format!("Issue **un**marked as depending on: #{}", depends_on.id);
    tracing::info!(blocking = %depends_on, blocked = %issue, "dependency removed");
    record(session, issue, Topic::IssueDependencyRemoved, &actor, (depends_on, issue), &message);
    Ok(Some(message))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    /// the issue's parents
    Depends,
    /// the issue's children
    Blocks,
}

impl Side {
    fn verb(self) -> &'static str {
        match self {
            Side::Depends => "depending on",
            Side::Blocks => "blocking",
        }
    }

    /// `(blocking, blocked)` for an edge between `issue` and `other`.
    fn edge<'a>(self, issue: &'a IssueKey, other: &'a IssueKey) -> (&'a IssueKey, &'a IssueKey) {
        match self {
            Side::Depends => (other, issue),
            Side::Blocks => (issue, other),
        }
    }
}

fn reconcile(
    session: &mut Session,
    issue: &IssueKey,
    desired: &[IssueRef],
    actor: &str,
    side: Side,
) -> Result<Vec<String>> {
    let state = session.state();
    state.issue(issue)?;
    access::require_level(state, &issue.project, actor, AccessLevel::Ticket, "edit issue dependencies")?;
    let actor = state.require_user(actor)?.name.clone();

    // resolve everything before touching the graph
    let mut wanted: Vec<IssueKey> = Vec::with_capacity(desired.len());
    for id in desired {
        let key = resolve_ref(state, &issue.project, *id)?;
        if &key == issue {
            return Err(Error::SelfDependency(issue.id));
        }
        if !wanted.contains(&key) {
            wanted.push(key);
        }
    }
    let current = match side {
        Side::Depends => parents(state, issue),
        Side::Blocks => children(state, issue),
    };

    let to_add: Vec<IssueKey> = wanted
        .iter()
        .filter(|key| !current.contains(key))
        .cloned()
        .collect();
    let to_remove: Vec<IssueKey> = current
        .iter()
        .filter(|key| !wanted.contains(key))
        .cloned()
        .collect();

    let mut messages = Vec::with_capacity(to_add.len() + to_remove.len());
    for other in &to_add {
        let (blocking, blocked) = side.edge(issue, other);
        session.state_mut().dependencies.push(DependencyEdge {
            blocking: blocking.clone(),
            blocked: blocked.clone(),
        });
        let message = format!("Issue marked as {}: #{}", side.verb(), other.id);
        record(session, issue, Topic::IssueDependencyAdded, &actor, (blocking, blocked), &message);
        messages.push(message);
    }
    for other in &to_remove {
        let (blocking, blocked) = side.edge(issue, other);
        session
            .state_mut()
            .dependencies
            .retain(|edge| !(&edge.blocking == blocking && &edge.blocked == blocked));
        let message = format!("Issue **un**marked as {}: #{}", side.verb(), other.id);
        record(session, issue, Topic::IssueDependencyRemoved, &actor, (blocking, blocked), &message);
        messages.push(message);
    }

    tracing::debug!(issue = %issue, side = ?side, changes = messages.len(), "dependencies reconciled");
    Ok(messages)
}

/// Make the set of issues `issue` depends on equal `desired`.
pub fn reconcile_depends(
    session: &mut Session,
    issue: &IssueKey,
    desired: &[IssueRef],
    actor: &str,
) -> Result<Vec<String>> {
    reconcile(session, issue, desired, actor, Side::Depends)
}

/// Make the set of issues `issue` blocks equal `desired`.
pub fn reconcile_blocks(
    session: &mut Session,
    issue: &IssueKey,
    desired: &[IssueRef],
    actor: &str,
) -> Result<Vec<String>> {
    reconcile(session, issue, desired, actor, Side::Blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn three_issues() -> (Session, Vec<IssueKey>) {
        let mut session = fixtures::session();
        let keys = (1..=3)
            .map(|n| fixtures::issue(&mut session, "test", &format!("Test issue #{n}"), "pingou"))
            .collect();
        (session, keys)
    }

    fn refs(ids: &[&str]) -> Vec<IssueRef> {
        parse_refs(ids).unwrap()
    }

    #[test]
    fn issue_refs_accept_hash_prefix() {
        assert_eq!(refs(&["#3", "3", " 4 ", "# 5"]), vec![IssueRef(3), IssueRef(4), IssueRef(5)]);
        assert!(parse_refs(&["three"]).is_err());
        assert_eq!(IssueRef::from(7), IssueRef(7));
    }

    #[test]
    fn add_and_remove_edge_directions() {
        let (mut session, keys) = three_issues();
        let (one, two) = (&keys[0], &keys[1]);

        assert_eq!(
            add_edge(&mut session, one, two, "pingou").unwrap().as_deref(),
            Some("Issue marked as depending on: #2")
        );
        assert_eq!(children(session.state(), one), vec![two.clone()]);
        assert_eq!(parents(session.state(), two), vec![one.clone()]);
        assert_eq!(add_edge(&mut session, one, two, "pingou").unwrap(), None);

        // swapped arguments leave the edge alone
        assert_eq!(remove_edge(&mut session, one, two, "pingou").unwrap(), None);
        assert_eq!(session.state().dependencies.len(), 1);

        assert_eq!(
            remove_edge(&mut session, two, one, "pingou").unwrap().as_deref(),
            Some("Issue **un**marked as depending on: #1")
        );
        assert!(children(session.state(), one).is_empty());
        assert!(parents(session.state(), two).is_empty());
    }

    #[test]
    fn self_edges_are_rejected() {
        let (mut session, keys) = three_issues();
        let err = add_edge(&mut session, &keys[0], &keys[0], "pingou").unwrap_err();
        assert!(matches!(err, Error::SelfDependency(1)));
        let err = reconcile_depends(&mut session, &keys[0], &refs(&["1"]), "pingou").unwrap_err();
        assert!(matches!(err, Error::SelfDependency(1)));
        let err = remove_edge(&mut session, &keys[0], &keys[0], "pingou").unwrap_err();
        assert!(matches!(err, Error::SelfDependency(1)));
        assert!(session.pending().is_empty());
    }

    #[test]
    fn reconcile_depends_is_a_set_diff() {
        let (mut session, keys) = three_issues();
        let two = &keys[1];

        assert_eq!(
            reconcile_depends(&mut session, two, &refs(&["3"]), "pingou").unwrap(),
            vec!["Issue marked as depending on: #3".to_string()]
        );
        assert_eq!(parents(session.state(), two), vec![keys[2].clone()]);
        assert!(reconcile_depends(&mut session, two, &refs(&["#3", "3"]), "pingou")
            .unwrap()
            .is_empty());

        assert_eq!(
            reconcile_depends(&mut session, two, &refs(&["1"]), "pingou").unwrap(),
            vec![
                "Issue marked as depending on: #1".to_string(),
                "Issue **un**marked as depending on: #3".to_string(),
            ]
        );
        assert_eq!(
            reconcile_depends(&mut session, two, &[], "pingou").unwrap(),
            vec!["Issue **un**marked as depending on: #1".to_string()]
        );
        assert!(session.state().dependencies.is_empty());
    }

    #[test]
    fn reconcile_blocks_sets_children() {
        let (mut session, keys) = three_issues();
        let two = &keys[1];
        assert_eq!(
            reconcile_blocks(&mut session, two, &refs(&["1"]), "pingou").unwrap(),
            vec!["Issue marked as blocking: #1".to_string()]
        );
        assert_eq!(children(session.state(), two), vec![keys[0].clone()]);
        assert_eq!(
            reconcile_blocks(&mut session, two, &[], "pingou").unwrap(),
            vec!["Issue **un**marked as blocking: #1".to_string()]
        );
    }

    #[test]
    fn unknown_ids_leave_the_graph_untouched() {
        let (mut session, keys) = three_issues();
        let err = reconcile_depends(&mut session, &keys[1], &refs(&["3", "42"]), "pingou").unwrap_err();
        assert!(matches!(err, Error::IssueNotFound { id: 42, .. }));
        assert!(session.state().dependencies.is_empty());
    }

    #[test]
    fn forks_resolve_ids_through_their_parent() {
        let (mut session, keys) = three_issues();
        let (fork, _) = crate::project::fork(&mut session, "test", "pingou").unwrap();
        let local = fixtures::issue(&mut session, &fork, "Fork issue", "pingou");
        assert_eq!(local.id, 1);

        // #1 exists in the fork itself, #3 only upstream
        assert_eq!(resolve_ref(session.state(), &fork, IssueRef(1)).unwrap(), local);
        assert_eq!(resolve_ref(session.state(), &fork, IssueRef(3)).unwrap(), keys[2]);
        reconcile_depends(&mut session, &local, &refs(&["3"]), "pingou").unwrap();
        assert_eq!(children(session.state(), &keys[2]), vec![local]);
    }

    #[test]
    fn cross_family_edges_are_rejected() {
        let (mut session, keys) = three_issues();
        let other = fixtures::issue(&mut session, "test2", "Elsewhere", "pingou");
        let err = add_edge(&mut session, &keys[0], &other, "pingou").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn dependencies_need_ticket_access() {
        let (mut session, keys) = three_issues();
        let err = add_edge(&mut session, &keys[0], &keys[1], "foo").unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));
    }
}
