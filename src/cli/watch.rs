//! forgecore watch command implementations.

use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::watch::{self, WatchClass, WatchRequest};

use super::context::{apply, parse_issue, Context};
use super::Global;

pub fn run_set(global: &Global, project: &str, level: &str) -> Result<()> {
    let request: WatchRequest = level.parse()?;
    apply(global, "watch set", project, |ctx| {
        let message = watch::set_status(&mut ctx.session, project, &ctx.actor, request)?;
        Ok(vec![message])
    })
}

#[derive(serde::Serialize)]
struct WatchShowReport<'a> {
    project: &'a str,
    user: &'a str,
    watch: Vec<WatchClass>,
}

pub fn run_show(global: &Global, project: &str, user: Option<&str>) -> Result<()> {
    let ctx = Context::open(global)?;
    let state = ctx.session.state();
    state.project(project)?;
    let user = state.require_user(user.unwrap_or(&ctx.actor))?.name.as_str();
    let classes = watch::get_level(state, project, user);

    let mut human = HumanOutput::new(format!("Watch status of {user} on {project}"));
    if classes.is_empty() {
        human.push_summary("watching", "nothing");
    } else {
        let names: Vec<&str> = classes.iter().map(|class| class.as_str()).collect();
        human.push_summary("watching", names.join(", "));
    }

    let report = WatchShowReport {
        project,
        user,
        watch: classes,
    };
    emit_success(global.output(), "watch show", &report, Some(&human))
}

#[derive(serde::Serialize)]
struct WatchListReport<'a> {
    user: &'a str,
    projects: Vec<String>,
}

pub fn run_list(global: &Global, user: Option<&str>) -> Result<()> {
    let ctx = Context::open(global)?;
    let state = ctx.session.state();
    let user = state.require_user(user.unwrap_or(&ctx.actor))?.name.as_str();
    let projects: Vec<String> = watch::user_watch_list(state, user)
        .into_iter()
        .map(|project| project.fullname())
        .collect();

    let mut human = HumanOutput::new(format!("Projects watched by {user}"));
    human.push_summary("count", projects.len().to_string());
    for project in &projects {
        human.push_detail(project.clone());
    }

    let report = WatchListReport { user, projects };
    emit_success(global.output(), "watch list", &report, Some(&human))
}

pub fn run_issue(global: &Global, issue: &str, on: bool) -> Result<()> {
    let key = parse_issue(issue)?;
    apply(global, "watch issue", issue, |ctx| {
        let message = watch::watch_issue(&mut ctx.session, &key, &ctx.actor, on)?;
        Ok(vec![message])
    })
}
