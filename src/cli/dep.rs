//! forgecore dep command implementations.

use crate::error::{Error, Result};
use crate::graph::{self, IssueRef};
use crate::issues;
use crate::model::IssueKey;
use crate::output::{emit_success, HumanOutput};

use super::context::{apply, parse_issue, Context};
use super::Global;

pub fn run_add(global: &Global, issue: &str, depends_on: &str) -> Result<()> {
    let key = parse_issue(issue)?;
    let other: IssueRef = depends_on.parse()?;
    apply(global, "dep add", issue, |ctx| {
        let blocking = graph::resolve_ref(ctx.session.state(), &key.project, other)?;
        let message = graph::add_edge(&mut ctx.session, &blocking, &key, &ctx.actor)?;
        Ok(message.into_iter().collect())
    })
}

pub fn run_remove(global: &Global, issue: &str, depends_on: &str) -> Result<()> {
    let key = parse_issue(issue)?;
    let other: IssueRef = depends_on.parse()?;
    apply(global, "dep remove", issue, |ctx| {
        let blocking = graph::resolve_ref(ctx.session.state(), &key.project, other)?;
        let message = graph::remove_edge(&mut ctx.session, &key, &blocking, &ctx.actor)?;
        Ok(message.into_iter().collect())
    })
}

pub fn run_depends(global: &Global, issue: &str, ids: &[String]) -> Result<()> {
    let key = parse_issue(issue)?;
    let refs = graph::parse_refs(ids)?;
    apply(global, "dep depends", issue, |ctx| {
        graph::reconcile_depends(&mut ctx.session, &key, &refs, &ctx.actor)
    })
}

pub fn run_blocks(global: &Global, issue: &str, ids: &[String]) -> Result<()> {
    let key = parse_issue(issue)?;
    let refs = graph::parse_refs(ids)?;
    apply(global, "dep blocks", issue, |ctx| {
        graph::reconcile_blocks(&mut ctx.session, &key, &refs, &ctx.actor)
    })
}

#[derive(serde::Serialize)]
struct DepShowReport {
    issue: IssueKey,
    depends_on: Vec<IssueKey>,
    blocks: Vec<IssueKey>,
}

pub fn run_show(global: &Global, issue: &str) -> Result<()> {
    let key = parse_issue(issue)?;
    let ctx = Context::open(global)?;
    let state = ctx.session.state();
    if !issues::can_view(state, state.issue(&key)?, &ctx.actor) {
        return Err(Error::IssueNotFound {
            project: key.project.clone(),
            id: key.id,
        });
    }

    let report = DepShowReport {
        depends_on: graph::parents(state, &key),
        blocks: graph::children(state, &key),
        issue: key,
    };

    let mut human = HumanOutput::new(format!("Dependencies of {}", report.issue));
    human.push_summary("depends on", join(&report.depends_on));
    human.push_summary("blocks", join(&report.blocks));

    emit_success(global.output(), "dep show", &report, Some(&human))
}

fn join(keys: &[IssueKey]) -> String {
    if keys.is_empty() {
        return "none".to_string();
    }
    keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
