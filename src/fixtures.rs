//! Shared state for unit tests.
//!
//! `session()` holds users `pingou` (bar@pingou.com) and `foo` (foo@bar.com)
//! and two public projects, `test` and `test2`, both owned by `pingou`.
//! Every helper leaves the session with no queued notifications.

use std::collections::BTreeMap;

use crate::config::{Config, GroupsConfig};
use crate::identity::{self, NewGroup};
use crate::issues::{self, NewIssue};
use crate::model::{ForgeState, IssueKey};
use crate::project::{self, NewProject};
use crate::session::Session;

fn settle(session: &mut Session) {
    let taken = std::mem::replace(session, Session::in_memory(ForgeState::new()));
    *session = Session::in_memory(taken.into_state());
}

pub(crate) fn session() -> Session {
    let mut session = Session::in_memory(ForgeState::new());
    identity::create_user(&mut session, "pingou", "PY C", &["bar@pingou.com".to_string()])
        .expect("pingou");
    identity::create_user(&mut session, "foo", "foo bar", &["foo@bar.com".to_string()])
        .expect("foo");

    let close_statuses = Config::default().issues.close_statuses;
    for name in ["test", "test2"] {
        let new = NewProject {
            name,
            namespace: None,
            owner: "pingou",
            description: "test project",
            private: false,
        };
        project::create(&mut session, &new, &close_statuses).expect("project");
    }
    settle(&mut session);
    session
}

pub(crate) fn user(session: &mut Session, name: &str) {
    identity::create_user(session, name, name, &[format!("{name}@example.com")]).expect("user");
}

/// Group created by `pingou` with `member` added.
pub(crate) fn group(session: &mut Session, name: &str, member: &str) {
    let new = NewGroup {
        name,
        display_name: name,
        description: "",
        group_type: "user",
        creator: "pingou",
    };
    identity::add_group(session, &new, &GroupsConfig::default()).expect("group");
    identity::add_user_to_group(session, member, name, "pingou", false).expect("member");
    settle(session);
}

/// Priorities `{1: High, 2: Normal}`.
pub(crate) fn priorities(session: &mut Session, project: &str) {
    let map = BTreeMap::from([(1, "High".to_string()), (2, "Normal".to_string())]);
    project::set_priorities(session, project, map, "pingou").expect("priorities");
    settle(session);
}

pub(crate) fn issue(session: &mut Session, project: &str, title: &str, author: &str) -> IssueKey {
    let new = NewIssue {
        title,
        content: "We should work on this",
        ..NewIssue::default()
    };
    let key = issues::new_issue(session, project, &new, author).expect("issue");
    settle(session);
    key
}
