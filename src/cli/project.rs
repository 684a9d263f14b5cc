//! forgecore project command implementations.

use std::collections::BTreeMap;

use crate::access::{self, AccessGrant, AccessLevel};
use crate::error::{Error, Result};
use crate::model::Project;
use crate::output::{emit_success, HumanOutput};
use crate::project::{self, NewProject};
use crate::tags;
use crate::watch::{self, WatchClass};

use super::context::{apply, Context};
use super::Global;

/// Options for `forgecore project new`
pub struct NewOptions {
    pub name: String,
    pub namespace: Option<String>,
    pub description: String,
    pub private: bool,
}

pub fn run_new(global: &Global, options: NewOptions) -> Result<()> {
    let target = match &options.namespace {
        Some(ns) => format!("{ns}/{}", options.name),
        None => options.name.clone(),
    };
    apply(global, "project new", &target, |ctx| {
        let new = NewProject {
            name: &options.name,
            namespace: options.namespace.as_deref(),
            owner: &ctx.actor,
            description: &options.description,
            private: options.private,
        };
        let (_, message) = project::create(&mut ctx.session, &new, &ctx.config.issues.close_statuses)?;
        Ok(vec![message])
    })
}

pub fn run_fork(global: &Global, name: &str) -> Result<()> {
    apply(global, "project fork", name, |ctx| {
        let (fullname, message) = project::fork(&mut ctx.session, name, &ctx.actor)?;
        tracing::debug!(fork = %fullname, "fork created");
        Ok(vec![message])
    })
}

#[derive(serde::Serialize)]
struct ProjectShowReport<'a> {
    fullname: String,
    project: &'a Project,
    tags: Vec<&'a str>,
    grants: Vec<&'a AccessGrant>,
    access: Option<AccessLevel>,
    watch: Vec<WatchClass>,
}

pub fn run_show(global: &Global, name: &str) -> Result<()> {
    let ctx = Context::open(global)?;
    let state = ctx.session.state();
    let record = state.project(name)?;
    let access = access::user_level(state, name, &ctx.actor);
    if record.private && access.is_none() {
        return Err(Error::ProjectNotFound(name.to_string()));
    }

    let report = ProjectShowReport {
        fullname: record.fullname(),
        project: record,
        tags: tags::tags_of_project(state, name, None)?
            .into_iter()
            .map(|tag| tag.text.as_str())
            .collect(),
        grants: access::grants_of(state, name),
        access,
        watch: watch::get_level(state, name, &ctx.actor),
    };

    let mut human = HumanOutput::new(format!("Project {}", report.fullname));
    human.push_summary("owner", record.owner.clone());
    if let Some(parent) = &record.parent {
        human.push_summary("forked from", parent.clone());
    }
    if !record.description.is_empty() {
        human.push_summary("description", record.description.clone());
    }
    human.push_summary("private", record.private.to_string());
    human.push_summary(
        "open issues",
        format!("{} ({} public)", record.open_tickets, record.open_tickets_public),
    );
    if !report.tags.is_empty() {
        human.push_summary("tags", report.tags.join(", "));
    }
    if !record.milestones.is_empty() {
        human.push_summary("milestones", record.milestones.join(", "));
    }
    for (weight, label) in &record.priorities {
        human.push_detail(format!("priority {weight}: {label}"));
    }
    for (key, value) in &record.settings {
        human.push_detail(format!("setting {key} = {value}"));
    }
    for grant in &report.grants {
        human.push_detail(format!("{} {}", grant.principal, grant.level));
    }

    emit_success(global.output(), "project show", &report, Some(&human))
}

/// Parse `weight=label` pairs.
fn parse_priorities(entries: &[String]) -> Result<BTreeMap<i32, String>> {
    let mut priorities = BTreeMap::new();
    for entry in entries {
        let (weight, label) = entry
            .split_once('=')
            .ok_or_else(|| Error::InvalidPriority(format!("expected WEIGHT=LABEL, got '{entry}'")))?;
        let weight = weight
            .trim()
            .parse::<i32>()
            .map_err(|_| Error::InvalidPriority(format!("invalid weight in '{entry}'")))?;
        let label = label.trim();
        if label.is_empty() {
            return Err(Error::InvalidPriority(format!("empty label in '{entry}'")));
        }
        priorities.insert(weight, label.to_string());
    }
    Ok(priorities)
}

pub fn run_priorities(global: &Global, name: &str, entries: &[String]) -> Result<()> {
    let priorities = parse_priorities(entries)?;
    apply(global, "project priorities", name, |ctx| {
        let message = project::set_priorities(&mut ctx.session, name, priorities, &ctx.actor)?;
        Ok(vec![message])
    })
}

pub fn run_close_statuses(global: &Global, name: &str, statuses: Vec<String>) -> Result<()> {
    apply(global, "project close-statuses", name, |ctx| {
        let message = project::set_close_statuses(&mut ctx.session, name, statuses, &ctx.actor)?;
        Ok(vec![message])
    })
}

pub fn run_milestones(global: &Global, name: &str, milestones: Vec<String>) -> Result<()> {
    apply(global, "project milestones", name, |ctx| {
        let message = project::set_milestones(&mut ctx.session, name, milestones, &ctx.actor)?;
        Ok(vec![message])
    })
}

pub fn run_set(global: &Global, name: &str, key: &str, value: &str) -> Result<()> {
    apply(global, "project set", name, |ctx| {
        let message = project::set_setting(&mut ctx.session, name, key, value, &ctx.actor)?;
        Ok(vec![message])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_parse_weight_label_pairs() {
        let parsed = parse_priorities(&["1=High".to_string(), " 2 = Normal".to_string()]).unwrap();
        assert_eq!(parsed.get(&1).map(String::as_str), Some("High"));
        assert_eq!(parsed.get(&2).map(String::as_str), Some("Normal"));
        assert!(parse_priorities(&["High".to_string()]).is_err());
        assert!(parse_priorities(&["x=High".to_string()]).is_err());
    }
}
