//! Access resolution: who holds which tier on a project.
//!
//! Tiers are ordered `admin > commit > ticket`. The project owner is an
//! implicit admin; that is applied by `effective_level` before any stored
//! grant is considered and is never written as a grant row.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::jobs::{JobKind, JobRequest};
use crate::model::ForgeState;
use crate::notify::{Notification, Topic};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Ticket,
    Commit,
    Admin,
}

impl AccessLevel {
    /// Highest first
    pub const ALL: [AccessLevel; 3] = [AccessLevel::Admin, AccessLevel::Commit, AccessLevel::Ticket];

    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Ticket => "ticket",
            AccessLevel::Commit => "commit",
            AccessLevel::Admin => "admin",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ticket" => Ok(AccessLevel::Ticket),
            "commit" => Ok(AccessLevel::Commit),
            "admin" => Ok(AccessLevel::Admin),
            _ => Err(Error::AccessLevelNotFound(raw.to_string())),
        }
    }
}

/// A grantee: a user or a group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Principal {
    User(String),
    Group(String),
}

impl Principal {
    pub fn user(name: impl Into<String>) -> Self {
        Principal::User(name.into())
    }

    pub fn group(name: impl Into<String>) -> Self {
        Principal::Group(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Principal::User(name) | Principal::Group(name) => name,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Principal::User(_) => "User",
            Principal::Group(_) => "Group",
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::User(name) => write!(f, "user `{name}`"),
            Principal::Group(name) => write!(f, "group `{name}`"),
        }
    }
}

/// Stored `(project, principal, tier)` record, unique per project and principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub project: String,
    pub principal: Principal,
    pub level: AccessLevel,
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
}

/// How `members_with` reads the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Effective tier is at least the requested one (owner and groups included)
    AtLeast,
    /// Stored grant equals the requested tier exactly
    Literal,
}

/// Effective tier from ownership, a direct grant, and group grants.
pub fn effective_level(
    is_owner: bool,
    direct: Option<AccessLevel>,
    via_groups: impl IntoIterator<Item = AccessLevel>,
) -> Option<AccessLevel> {
    if is_owner {
        return Some(AccessLevel::Admin);
    }
    direct.into_iter().chain(via_groups).max()
}

fn stored_level(state: &ForgeState, project: &str, principal: &Principal) -> Option<AccessLevel> {
    state
        .grants
        .iter()
        .find(|grant| grant.project == project && &grant.principal == principal)
        .map(|grant| grant.level)
}

fn user_level_in(state: &ForgeState, project: &str, owner: &str, user: &str) -> Option<AccessLevel> {
    let direct = stored_level(state, project, &Principal::user(user));
    let via_groups = state
        .groups_of(user)
        .filter_map(|group| stored_level(state, project, &Principal::group(group.name.clone())));
    effective_level(owner == user, direct, via_groups)
}

/// Effective tier of a principal on a project.
pub fn resolve(state: &ForgeState, project: &str, principal: &Principal) -> Result<Option<AccessLevel>> {
    let record = state.project(project)?;
    Ok(match principal {
        Principal::User(user) => user_level_in(state, project, &record.owner, user),
        Principal::Group(_) => stored_level(state, project, principal),
    })
}

/// Effective tier of a user; none for unknown projects.
pub fn user_level(state: &ForgeState, project: &str, user: &str) -> Option<AccessLevel> {
    resolve(state, project, &Principal::user(user)).ok().flatten()
}

pub fn has_access(state: &ForgeState, project: &str, user: &str, required: AccessLevel) -> bool {
    user_level(state, project, user).is_some_and(|level| level >= required)
}

/// Fail unless `actor` is a known user holding at least `required`.
pub fn require_level(
    state: &ForgeState,
    project: &str,
    actor: &str,
    required: AccessLevel,
    action: &str,
) -> Result<()> {
    state.project(project)?;
    let user = state.require_user(actor)?;
    if has_access(state, project, &user.name, required) {
        Ok(())
    } else {
        Err(Error::NotAuthorized {
            actor: actor.to_string(),
            action: action.to_string(),
        })
    }
}

/// Every principal holding `level` on `project` under the given membership rule.
pub fn members_with(
    state: &ForgeState,
    project: &str,
    level: AccessLevel,
    membership: Membership,
) -> Result<BTreeSet<Principal>> {
    let record = state.project(project)?;
    let grants = state.grants.iter().filter(|grant| grant.project == project);

    let members = match membership {
        Membership::Literal => grants
            .filter(|grant| grant.level == level)
            .map(|grant| grant.principal.clone())
            .collect(),
        Membership::AtLeast => {
            let mut candidates = BTreeSet::new();
            candidates.insert(Principal::user(record.owner.clone()));
            for grant in grants {
                candidates.insert(grant.principal.clone());
                if let Principal::Group(name) = &grant.principal {
                    if let Some(group) = state.groups.get(name) {
                        candidates.extend(group.members.iter().cloned().map(Principal::User));
                    }
                }
            }
            candidates
                .into_iter()
                .filter(|principal| {
                    let effective = match principal {
                        Principal::User(user) => user_level_in(state, project, &record.owner, user),
                        Principal::Group(_) => stored_level(state, project, principal),
                    };
                    effective.is_some_and(|found| found >= level)
                })
                .collect()
        }
    };
    Ok(members)
}

/// Usernames from `members_with`.
pub fn users_with(
    state: &ForgeState,
    project: &str,
    level: AccessLevel,
    membership: Membership,
) -> Result<BTreeSet<String>> {
    Ok(members_with(state, project, level, membership)?
        .into_iter()
        .filter_map(|principal| match principal {
            Principal::User(name) => Some(name),
            Principal::Group(_) => None,
        })
        .collect())
}

/// Group names from `members_with`.
pub fn groups_with(
    state: &ForgeState,
    project: &str,
    level: AccessLevel,
    membership: Membership,
) -> Result<BTreeSet<String>> {
    Ok(members_with(state, project, level, membership)?
        .into_iter()
        .filter_map(|principal| match principal {
            Principal::Group(name) => Some(name),
            Principal::User(_) => None,
        })
        .collect())
}

/// Stored grants on a project, highest tier first.
pub fn grants_of<'a>(state: &'a ForgeState, project: &str) -> Vec<&'a AccessGrant> {
    let mut grants: Vec<&AccessGrant> = state
        .grants
        .iter()
        .filter(|grant| grant.project == project)
        .collect();
    grants.sort_by(|a, b| b.level.cmp(&a.level).then_with(|| a.principal.cmp(&b.principal)));
    grants
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    Added,
    Updated { previous: AccessLevel },
}

/// Canonical principal: users resolve by name or email, groups by name.
fn canonical_principal(state: &ForgeState, principal: &Principal) -> Result<Principal> {
    match principal {
        Principal::User(name) => Ok(Principal::user(state.require_user(name)?.name.clone())),
        Principal::Group(name) => Ok(Principal::group(state.group(name)?.name.clone())),
    }
}

/// Give `principal` the tier `level` on `project`.
///
/// Returns `User added`, `User access updated`, `Group added` or
/// `Group access updated`. Re-granting the current tier is `Error::NoChange`.
pub fn grant(
    session: &mut Session,
    project: &str,
    principal: &Principal,
    level: AccessLevel,
    actor: &str,
) -> Result<String> {
    let state = session.state();
    require_level(state, project, actor, AccessLevel::Admin, &format!("manage access on {project}"))?;
    let principal = canonical_principal(state, principal)?;
    let owner = state.project(project)?.owner.clone();
    let actor_name = state.require_user(actor)?.name.clone();

    if principal == Principal::user(actor_name.clone()) && actor_name != owner {
        return Err(Error::OwnerAccess(
            "You cannot change your own access on a project".to_string(),
        ));
    }

    let outcome = match stored_level(state, project, &principal) {
        Some(current) if current == level => {
            return Err(Error::NoChange(format!(
                "This {} is already associated to this project with that access",
                principal.label().to_ascii_lowercase()
            )));
        }
        Some(previous) => GrantOutcome::Updated { previous },
        None => GrantOutcome::Added,
    };

    let now = Utc::now();
    let state = session.state_mut();
    match outcome {
        GrantOutcome::Added => state.grants.push(AccessGrant {
            project: project.to_string(),
            principal: principal.clone(),
            level,
            granted_by: actor_name.clone(),
            granted_at: now,
        }),
        GrantOutcome::Updated { .. } => {
            if let Some(existing) = state
                .grants
                .iter_mut()
                .find(|grant| grant.project == project && grant.principal == principal)
            {
                existing.level = level;
                existing.granted_by = actor_name.clone();
                existing.granted_at = now;
            }
        }
    }

    let (message, topic) = match (&principal, outcome) {
        (Principal::User(_), GrantOutcome::Added) => ("User added", Topic::ProjectUserAdded),
        (Principal::User(_), GrantOutcome::Updated { .. }) => {
            ("User access updated", Topic::ProjectUserAccessUpdated)
        }
        (Principal::Group(_), GrantOutcome::Added) => ("Group added", Topic::ProjectGroupAdded),
        (Principal::Group(_), GrantOutcome::Updated { .. }) => {
            ("Group access updated", Topic::ProjectGroupAccessUpdated)
        }
    };
    tracing::info!(project, principal = %principal, level = level.as_str(), "access granted");

    let previous = match outcome {
        GrantOutcome::Updated { previous } => Some(previous),
        GrantOutcome::Added => None,
    };
    let notification = Notification::for_project(session.state(), project, topic, &actor_name)
        .with_messages([message])
        .with_payload(serde_json::json!({
            "principal": principal,
            "access": level,
            "previous": previous,
        }))
        .with_job(JobRequest::new(JobKind::RefreshAcls, project));
    session.record(notification);

    Ok(message.to_string())
}

/// Remove `principal`'s grant on `project`.
///
/// Admins may remove anyone but the owner; any user may remove themselves.
pub fn revoke(
    session: &mut Session,
    project: &str,
    principal: &Principal,
    actor: &str,
) -> Result<String> {
    let state = session.state();
    let owner = state.project(project)?.owner.clone();
    let actor_name = state.require_user(actor)?.name.clone();
    let principal = canonical_principal(state, principal)?;

    if principal == Principal::user(owner.clone()) {
        return Err(Error::OwnerAccess(
            "The owner of a project cannot have their access revoked".to_string(),
        ));
    }

    let removing_self = principal == Principal::user(actor_name.clone());
    if !removing_self {
        require_level(state, project, actor, AccessLevel::Admin, &format!("manage access on {project}"))?;
    }

    if stored_level(state, project, &principal).is_none() {
        return Err(Error::GrantNotFound {
            project: project.to_string(),
            principal: principal.to_string(),
        });
    }

    session
        .state_mut()
        .grants
        .retain(|grant| !(grant.project == project && grant.principal == principal));

    let (message, topic) = match &principal {
        Principal::User(_) => ("User removed", Topic::ProjectUserRemoved),
        Principal::Group(_) => ("Group removed", Topic::ProjectGroupRemoved),
    };
    tracing::info!(project, principal = %principal, "access revoked");

    let notification = Notification::for_project(session.state(), project, topic, &actor_name)
        .with_messages([message])
        .with_payload(serde_json::json!({ "principal": principal }))
        .with_job(JobRequest::new(JobKind::RefreshAcls, project));
    session.record(notification);

    Ok(message.to_string())
}
