//! Entities shared by every component and the `ForgeState` aggregate that
//! holds them.
//!
//! Ownership is never stored as a grant row: a project's `owner` field is
//! the only record of it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::AccessGrant;
use crate::error::{Error, Result};
use crate::fields::CustomFieldDef;
use crate::watch::WatchLevel;

pub const STATE_SCHEMA_VERSION: u32 = 1;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub fullname: String,
    #[serde(default)]
    pub emails: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A named set of users. `name` is the immutable key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub group_type: String,
    pub creator: String,
    #[serde(default)]
    pub members: BTreeSet<String>,
    #[serde(default)]
    pub admins: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn is_member(&self, user: &str) -> bool {
        self.members.contains(user)
    }

    pub fn is_admin(&self, user: &str) -> bool {
        self.creator == user || self.admins.contains(user)
    }
}

/// A project or a fork of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Full name of the project this one was forked from.
    #[serde(default)]
    pub parent: Option<String>,
    pub owner: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub priorities: BTreeMap<i32, String>,
    #[serde(default)]
    pub close_statuses: Vec<String>,
    #[serde(default)]
    pub milestones: Vec<String>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldDef>,
    #[serde(default)]
    pub open_tickets: u64,
    #[serde(default)]
    pub open_tickets_public: u64,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// `ns/name`, `name`, or `forks/<owner>/<ns/name>` for forks
    pub fn fullname(&self) -> String {
        let base = match &self.namespace {
            Some(ns) => format!("{ns}/{}", self.name),
            None => self.name.clone(),
        };
        if self.parent.is_some() {
            format!("forks/{}/{base}", self.owner)
        } else {
            base
        }
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn priority_label(&self, priority: i32) -> Option<&str> {
        self.priorities.get(&priority).map(|label| label.as_str())
    }

    pub fn custom_field(&self, name: &str) -> Option<&CustomFieldDef> {
        self.custom_fields.iter().find(|field| field.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueStatus {
    Open,
    Closed,
}

impl IssueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::Open => "Open",
            IssueStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(IssueStatus::Open),
            "closed" => Ok(IssueStatus::Closed),
            other => Err(Error::InvalidArgument(format!(
                "unknown issue status '{other}' (expected Open|Closed)"
            ))),
        }
    }
}

/// Stable reference to an issue: owning project plus sequential id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IssueKey {
    pub project: String,
    pub id: u64,
}

impl IssueKey {
    pub fn new(project: impl Into<String>, id: u64) -> Self {
        Self {
            project: project.into(),
            id,
        }
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.project, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub user: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub uid: String,
    pub project: String,
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub author: String,
    pub status: IssueStatus,
    #[serde(default)]
    pub close_status: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub milestone: Option<String>,
    #[serde(default)]
    pub custom_values: BTreeMap<String, String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Issue {
    pub fn key(&self) -> IssueKey {
        IssueKey::new(self.project.clone(), self.id)
    }

    pub fn is_open(&self) -> bool {
        self.status == IssueStatus::Open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub u64);

/// A tag in a project's vocabulary. Links reference `id`, so renaming keeps
/// every association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub project: String,
    pub text: String,
    #[serde(default)]
    pub description: String,
    pub color: String,
}

/// Object a tag can be attached to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TagTarget {
    Project { project: String },
    Issue { issue: IssueKey },
}

impl TagTarget {
    pub fn project(name: impl Into<String>) -> Self {
        TagTarget::Project {
            project: name.into(),
        }
    }

    pub fn issue(key: IssueKey) -> Self {
        TagTarget::Issue { issue: key }
    }

    /// Project whose vocabulary this target draws from
    pub fn owning_project(&self) -> &str {
        match self {
            TagTarget::Project { project } => project,
            TagTarget::Issue { issue } => &issue.project,
        }
    }

    /// Capitalized object kind used in change messages
    pub fn label(&self) -> &'static str {
        match self {
            TagTarget::Project { .. } => "Project",
            TagTarget::Issue { .. } => "Issue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagLink {
    pub tag: TagId,
    pub target: TagTarget,
}

/// Explicit watch row. Absence means the implicit default applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watcher {
    pub project: String,
    pub user: String,
    pub level: WatchLevel,
}

/// Explicit per-issue watch or unwatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueWatcher {
    pub issue: IssueKey,
    pub user: String,
    pub watch: bool,
}

/// `blocking` blocks `blocked`; `blocked` depends on `blocking`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub blocking: IssueKey,
    pub blocked: IssueKey,
}

/// Everything the core reads and mutates, persisted as one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeState {
    pub schema_version: u32,
    pub users: BTreeMap<String, User>,
    pub groups: BTreeMap<String, Group>,
    pub projects: BTreeMap<String, Project>,
    pub grants: Vec<AccessGrant>,
    pub watchers: Vec<Watcher>,
    pub issues: Vec<Issue>,
    pub tags: Vec<Tag>,
    pub tag_links: Vec<TagLink>,
    pub next_tag_id: u64,
    pub dependencies: Vec<DependencyEdge>,
    pub issue_watchers: Vec<IssueWatcher>,
}

impl ForgeState {
    pub fn new() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            next_tag_id: 1,
            ..Self::default()
        }
    }

    // =========================================================================
    // Identity lookups
    // =========================================================================

    /// Look a user up by name or by any of their emails
    pub fn find_user(&self, name_or_email: &str) -> Option<&User> {
        let needle = name_or_email.trim();
        self.users.get(needle).or_else(|| {
            self.users
                .values()
                .find(|user| user.emails.iter().any(|email| email == needle))
        })
    }

    pub fn require_user(&self, name_or_email: &str) -> Result<&User> {
        self.find_user(name_or_email)
            .ok_or_else(|| Error::UserNotFound(name_or_email.to_string()))
    }

    pub fn group(&self, name: &str) -> Result<&Group> {
        self.groups
            .get(name)
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))
    }

    pub fn group_mut(&mut self, name: &str) -> Result<&mut Group> {
        self.groups
            .get_mut(name)
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))
    }

    /// Groups that list `user` as a member
    pub fn groups_of<'a>(&'a self, user: &'a str) -> impl Iterator<Item = &'a Group> + 'a {
        self.groups.values().filter(move |group| group.is_member(user))
    }

    // =========================================================================
    // Projects
    // =========================================================================

    pub fn project(&self, fullname: &str) -> Result<&Project> {
        self.projects
            .get(fullname)
            .ok_or_else(|| Error::ProjectNotFound(fullname.to_string()))
    }

    pub fn project_mut(&mut self, fullname: &str) -> Result<&mut Project> {
        self.projects
            .get_mut(fullname)
            .ok_or_else(|| Error::ProjectNotFound(fullname.to_string()))
    }

    /// The project followed by each ancestor it was forked from
    pub fn lineage(&self, fullname: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = Some(fullname.to_string());
        while let Some(name) = current {
            if chain.contains(&name) {
                break;
            }
            current = self
                .projects
                .get(&name)
                .and_then(|project| project.parent.clone());
            chain.push(name);
        }
        chain
    }

    // =========================================================================
    // Issues
    // =========================================================================

    pub fn issue(&self, key: &IssueKey) -> Result<&Issue> {
        self.issues
            .iter()
            .find(|issue| issue.project == key.project && issue.id == key.id)
            .ok_or_else(|| Error::IssueNotFound {
                project: key.project.clone(),
                id: key.id,
            })
    }

    pub fn issue_mut(&mut self, key: &IssueKey) -> Result<&mut Issue> {
        self.issues
            .iter_mut()
            .find(|issue| issue.project == key.project && issue.id == key.id)
            .ok_or_else(|| Error::IssueNotFound {
                project: key.project.clone(),
                id: key.id,
            })
    }

    pub fn issues_of<'a>(&'a self, project: &str) -> impl Iterator<Item = &'a Issue> + 'a {
        let project = project.to_string();
        self.issues.iter().filter(move |issue| issue.project == project)
    }

    pub fn next_issue_id(&self, project: &str) -> u64 {
        self.issues_of(project).map(|issue| issue.id).max().unwrap_or(0) + 1
    }

    /// Recompute `open_tickets` and `open_tickets_public` from the issues
    pub fn recompute_counters(&mut self, project: &str) -> Result<()> {
        let (open, open_public) = self
            .issues_of(project)
            .filter(|issue| issue.is_open())
            .fold((0u64, 0u64), |(open, public), issue| {
                (open + 1, public + u64::from(!issue.private))
            });
        let project = self.project_mut(project)?;
        project.open_tickets = open;
        project.open_tickets_public = open_public;
        Ok(())
    }
}
