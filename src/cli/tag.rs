//! forgecore tag command implementations.

use crate::error::{Error, Result};
use crate::issues;
use crate::model::{Tag, TagTarget};
use crate::output::{emit_success, HumanOutput};
use crate::tags;

use super::context::{apply, parse_target, Context};
use super::Global;

pub fn run_add(global: &Global, target: &str, texts: &[String]) -> Result<()> {
    let object = parse_target(target)?;
    apply(global, "tag add", target, |ctx| {
        let message = tags::add(
            &mut ctx.session,
            &object,
            texts,
            &ctx.actor,
            &ctx.config.tags.default_color,
        )?;
        Ok(vec![message])
    })
}

pub fn run_remove(global: &Global, target: &str, texts: &[String]) -> Result<()> {
    let object = parse_target(target)?;
    apply(global, "tag remove", target, |ctx| {
        let message = tags::remove(&mut ctx.session, &object, texts, &ctx.actor)?;
        Ok(vec![message])
    })
}

pub fn run_sync(global: &Global, target: &str, texts: &[String]) -> Result<()> {
    let object = parse_target(target)?;
    apply(global, "tag sync", target, |ctx| {
        tags::reconcile(
            &mut ctx.session,
            &object,
            texts,
            &ctx.actor,
            &ctx.config.tags.default_color,
        )
    })
}

/// Options for `forgecore tag rename`
pub struct RenameOptions {
    pub project: String,
    pub old: String,
    pub new: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

pub fn run_rename(global: &Global, options: RenameOptions) -> Result<()> {
    apply(global, "tag rename", &options.project, |ctx| {
        let message = tags::rename(
            &mut ctx.session,
            &options.project,
            &options.old,
            &options.new,
            options.description.as_deref(),
            options.color.as_deref(),
            &ctx.actor,
        )?;
        Ok(vec![message])
    })
}

pub fn run_delete(global: &Global, project: &str, texts: &[String]) -> Result<()> {
    apply(global, "tag delete", project, |ctx| {
        tags::delete_from_project(&mut ctx.session, project, texts, &ctx.actor)
    })
}

#[derive(serde::Serialize)]
struct TagListReport<'a> {
    target: &'a TagTarget,
    tags: Vec<&'a Tag>,
}

pub fn run_list(global: &Global, target: &str, pattern: Option<&str>) -> Result<()> {
    let object = parse_target(target)?;
    let ctx = Context::open(global)?;
    let state = ctx.session.state();

    let listed = match &object {
        TagTarget::Project { project } => tags::tags_of_project(state, project, pattern)?,
        TagTarget::Issue { issue } => {
            let record = state.issue(issue)?;
            if !issues::can_view(state, record, &ctx.actor) {
                return Err(Error::IssueNotFound {
                    project: issue.project.clone(),
                    id: issue.id,
                });
            }
            tags::tags_of(state, &object)
        }
    };

    let mut human = HumanOutput::new(format!("Tags of {target}"));
    human.push_summary("count", listed.len().to_string());
    for tag in &listed {
        if tag.description.is_empty() {
            human.push_detail(format!("{} [{}]", tag.text, tag.color));
        } else {
            human.push_detail(format!("{} [{}]: {}", tag.text, tag.color, tag.description));
        }
    }

    let report = TagListReport {
        target: &object,
        tags: listed,
    };
    emit_success(global.output(), "tag list", &report, Some(&human))
}
