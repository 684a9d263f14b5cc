//! forgecore access command implementations.

use crate::access::{self, AccessGrant, AccessLevel, Membership, Principal};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

use super::context::{apply, Context};
use super::Global;

fn principal(name: &str, group: bool) -> Principal {
    if group {
        Principal::group(name.trim())
    } else {
        Principal::user(name.trim())
    }
}

pub fn run_grant(global: &Global, project: &str, name: &str, level: &str, group: bool) -> Result<()> {
    let level: AccessLevel = level.parse()?;
    let principal = principal(name, group);
    apply(global, "access grant", project, |ctx| {
        let message = access::grant(&mut ctx.session, project, &principal, level, &ctx.actor)?;
        Ok(vec![message])
    })
}

pub fn run_revoke(global: &Global, project: &str, name: &str, group: bool) -> Result<()> {
    let principal = principal(name, group);
    apply(global, "access revoke", project, |ctx| {
        let message = access::revoke(&mut ctx.session, project, &principal, &ctx.actor)?;
        Ok(vec![message])
    })
}

#[derive(serde::Serialize)]
struct AccessShowReport<'a> {
    project: &'a str,
    owner: &'a str,
    grants: Vec<&'a AccessGrant>,
}

#[derive(serde::Serialize)]
struct UserAccessReport<'a> {
    project: &'a str,
    user: &'a str,
    level: Option<AccessLevel>,
}

pub fn run_show(global: &Global, project: &str, user: Option<&str>) -> Result<()> {
    let ctx = Context::open(global)?;
    let state = ctx.session.state();
    let record = state.project(project)?;

    if let Some(user) = user {
        let name = state.require_user(user)?.name.as_str();
        let level = access::user_level(state, project, name);
        let report = UserAccessReport {
            project,
            user: name,
            level,
        };
        let mut human = HumanOutput::new(format!("Access of {name} on {project}"));
        human.push_summary("level", level.map(|level| level.as_str()).unwrap_or("none"));
        return emit_success(global.output(), "access show", &report, Some(&human));
    }

    let report = AccessShowReport {
        project,
        owner: &record.owner,
        grants: access::grants_of(state, project),
    };
    let mut human = HumanOutput::new(format!("Access on {project}"));
    human.push_summary("owner", record.owner.clone());
    for grant in &report.grants {
        human.push_detail(format!("{} {} (by {})", grant.principal, grant.level, grant.granted_by));
    }
    if report.grants.is_empty() {
        human.push_next_step(format!("forgecore access grant {project} <user> <level>"));
    }

    emit_success(global.output(), "access show", &report, Some(&human))
}

#[derive(serde::Serialize)]
struct MembersReport<'a> {
    project: &'a str,
    level: AccessLevel,
    exact: bool,
    members: Vec<Principal>,
}

pub fn run_members(global: &Global, project: &str, level: &str, exact: bool) -> Result<()> {
    let level: AccessLevel = level.parse()?;
    let membership = if exact {
        Membership::Literal
    } else {
        Membership::AtLeast
    };

    let ctx = Context::open(global)?;
    let members: Vec<Principal> = access::members_with(ctx.session.state(), project, level, membership)?
        .into_iter()
        .collect();

    let qualifier = if exact { "exactly" } else { "at least" };
    let mut human = HumanOutput::new(format!("Members of {project} with {qualifier} {level}"));
    human.push_summary("count", members.len().to_string());
    for member in &members {
        human.push_detail(member.to_string());
    }

    let report = MembersReport {
        project,
        level,
        exact,
        members,
    };
    emit_success(global.output(), "access members", &report, Some(&human))
}

pub fn run_levels(global: &Global) -> Result<()> {
    let levels: Vec<&str> = AccessLevel::ALL.iter().map(|level| level.as_str()).collect();
    let mut human = HumanOutput::new("Access levels, highest first");
    for level in &levels {
        human.push_detail(*level);
    }
    emit_success(global.output(), "access levels", &levels, Some(&human))
}
