//! forgecore issue command implementations.

use crate::error::{Error, Result};
use crate::graph;
use crate::issues::{self, IssueEdit, NewIssue};
use crate::model::{Issue, IssueKey, IssueStatus, TagTarget};
use crate::output::{emit_success, HumanOutput};
use crate::query::{self, AssigneeFilter, IssueFilter};
use crate::tags;

use super::context::{apply, parse_issue, Context};
use super::Global;

/// Options for `forgecore issue new`
pub struct NewOptions {
    pub project: String,
    pub title: String,
    pub content: String,
    pub private: bool,
    pub priority: Option<i32>,
    pub assignee: Option<String>,
    pub milestone: Option<String>,
}

pub fn run_new(global: &Global, options: NewOptions) -> Result<()> {
    apply(global, "issue new", &options.project, |ctx| {
        let new = NewIssue {
            title: &options.title,
            content: &options.content,
            private: options.private,
            priority: options.priority,
            assignee: options.assignee.as_deref(),
            milestone: options.milestone.as_deref(),
        };
        let key = issues::new_issue(&mut ctx.session, &options.project, &new, &ctx.actor)?;
        Ok(vec![format!("Issue #{} created", key.id)])
    })
}

/// Options for `forgecore issue edit`
pub struct EditOptions {
    pub issue: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<String>,
    pub close_status: Option<String>,
    pub private: Option<bool>,
    pub priority: Option<String>,
    pub milestone: Option<String>,
}

/// `none` (any case) clears an optional field.
fn clearable(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(raw)
    }
}

fn build_edit(options: &EditOptions) -> Result<IssueEdit> {
    let status = options.status.as_deref().map(str::parse::<IssueStatus>).transpose()?;
    let priority = match options.priority.as_deref() {
        None => None,
        Some(raw) => Some(
            clearable(raw)
                .map(|weight| {
                    weight
                        .parse::<i32>()
                        .map_err(|_| Error::InvalidPriority(format!("invalid priority '{weight}'")))
                })
                .transpose()?,
        ),
    };
    let milestone = options
        .milestone
        .as_deref()
        .map(|raw| clearable(raw).map(str::to_string));

    Ok(IssueEdit {
        title: options.title.clone(),
        content: options.content.clone(),
        status,
        close_status: options.close_status.clone(),
        private: options.private,
        priority,
        milestone,
    })
}

pub fn run_edit(global: &Global, options: EditOptions) -> Result<()> {
    let key = parse_issue(&options.issue)?;
    let edit = build_edit(&options)?;
    apply(global, "issue edit", &options.issue, |ctx| {
        let outcome = issues::edit_issue(&mut ctx.session, &key, &edit, &ctx.actor)?;
        if outcome.messages.is_empty() && !outcome.fields.is_empty() {
            return Ok(vec![format!("Issue edited: {}", outcome.fields.join(", "))]);
        }
        Ok(outcome.messages)
    })
}

pub fn run_assign(global: &Global, issue: &str, assignee: Option<&str>) -> Result<()> {
    let key = parse_issue(issue)?;
    apply(global, "issue assign", issue, |ctx| {
        let message = issues::assign(&mut ctx.session, &key, assignee, &ctx.actor)?;
        Ok(message.into_iter().collect())
    })
}

pub fn run_comment(global: &Global, issue: &str, text: &str) -> Result<()> {
    let key = parse_issue(issue)?;
    apply(global, "issue comment", issue, |ctx| {
        let message = issues::add_comment(&mut ctx.session, &key, text, &ctx.actor)?;
        Ok(vec![message])
    })
}

#[derive(serde::Serialize)]
struct IssueShowReport<'a> {
    issue: &'a Issue,
    tags: Vec<&'a str>,
    depends_on: Vec<IssueKey>,
    blocks: Vec<IssueKey>,
}

pub fn run_show(global: &Global, issue: &str) -> Result<()> {
    let key = parse_issue(issue)?;
    let ctx = Context::open(global)?;
    let state = ctx.session.state();
    let record = state.issue(&key)?;
    if !issues::can_view(state, record, &ctx.actor) {
        return Err(Error::IssueNotFound {
            project: key.project.clone(),
            id: key.id,
        });
    }

    let report = IssueShowReport {
        issue: record,
        tags: tags::tags_of(state, &TagTarget::issue(key.clone()))
            .into_iter()
            .map(|tag| tag.text.as_str())
            .collect(),
        depends_on: graph::parents(state, &key),
        blocks: graph::children(state, &key),
    };

    let mut human = HumanOutput::new(format!("Issue #{} {}", record.id, record.title));
    human.push_summary("status", record.status.as_str());
    if let Some(close_status) = &record.close_status {
        human.push_summary("close status", close_status.clone());
    }
    human.push_summary("author", record.author.clone());
    human.push_summary("assignee", record.assignee.clone().unwrap_or_default());
    if record.private {
        human.push_summary("private", "true");
    }
    if let Some(priority) = record.priority {
        let project = state.project(&key.project)?;
        let label = project.priority_label(priority).unwrap_or("?");
        human.push_summary("priority", format!("{label} ({priority})"));
    }
    if let Some(milestone) = &record.milestone {
        human.push_summary("milestone", milestone.clone());
    }
    if !report.tags.is_empty() {
        human.push_summary("tags", report.tags.join(", "));
    }
    for (field, value) in &record.custom_values {
        human.push_summary(field.clone(), value.clone());
    }
    for parent in &report.depends_on {
        human.push_detail(format!("depends on {parent}"));
    }
    for child in &report.blocks {
        human.push_detail(format!("blocks {child}"));
    }
    for comment in &record.comments {
        human.push_detail(format!("{}: {}", comment.user, comment.comment));
    }

    emit_success(global.output(), "issue show", &report, Some(&human))
}

/// Options for `forgecore issue search`
pub struct SearchOptions {
    pub project: String,
    pub status: String,
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub assignee: Option<String>,
    pub milestones: Vec<String>,
    pub no_milestone: bool,
    pub pattern: Option<String>,
    pub fields: Vec<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

fn build_filter(options: SearchOptions, viewer: Option<String>) -> Result<IssueFilter> {
    let status = if options.status.trim().eq_ignore_ascii_case("all") {
        None
    } else {
        Some(options.status.parse::<IssueStatus>()?)
    };
    let assignee = options
        .assignee
        .as_deref()
        .map(str::parse::<AssigneeFilter>)
        .transpose()?;
    let custom = options
        .fields
        .iter()
        .map(|raw| {
            raw.split_once('=')
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
                .ok_or_else(|| Error::InvalidArgument(format!("expected KEY=VALUE, got '{raw}'")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(IssueFilter {
        status,
        tags: options.tags,
        author: options.author,
        assignee,
        milestones: options.milestones,
        no_milestones: options.no_milestone,
        pattern: options.pattern,
        custom,
        viewer,
        offset: options.offset,
        limit: options.limit,
    })
}

#[derive(serde::Serialize)]
struct SearchReport<'a> {
    project: String,
    total: usize,
    issues: Vec<&'a Issue>,
}

pub fn run_search(global: &Global, options: SearchOptions) -> Result<()> {
    let ctx = Context::open(global)?;
    let state = ctx.session.state();
    let viewer = state.find_user(&ctx.actor).map(|user| user.name.clone());
    let project = options.project.clone();
    let filter = build_filter(options, viewer)?;
    let found = query::search_issues(state, &project, &filter)?;

    let mut human = HumanOutput::new(format!("Issues of {project}"));
    human.push_summary("found", found.len().to_string());
    for issue in &found {
        let assignee = issue
            .assignee
            .as_deref()
            .map(|name| format!(" -> {name}"))
            .unwrap_or_default();
        human.push_detail(format!("#{} [{}] {}{assignee}", issue.id, issue.status, issue.title));
    }

    let report = SearchReport {
        project,
        total: found.len(),
        issues: found,
    };
    emit_success(global.output(), "issue search", &report, Some(&human))
}
