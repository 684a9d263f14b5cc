//! Read-only issue search.

use std::fmt;
use std::str::FromStr;

use glob::{MatchOptions, Pattern};

use crate::error::{Error, Result};
use crate::issues;
use crate::model::{ForgeState, Issue, IssueStatus, TagTarget};
use crate::tags;

/// Assignee criterion: `name`, `!name`, `*` (any assignee) or `!*` (none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssigneeFilter {
    Any,
    Unassigned,
    Is(String),
    IsNot(String),
}

impl FromStr for AssigneeFilter {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        match raw {
            "" => Err(Error::InvalidArgument("empty assignee filter".to_string())),
            "*" => Ok(AssigneeFilter::Any),
            "!*" => Ok(AssigneeFilter::Unassigned),
            _ => match raw.strip_prefix('!') {
                Some(name) => Ok(AssigneeFilter::IsNot(name.trim().to_string())),
                None => Ok(AssigneeFilter::Is(raw.to_string())),
            },
        }
    }
}

impl fmt::Display for AssigneeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssigneeFilter::Any => f.write_str("*"),
            AssigneeFilter::Unassigned => f.write_str("!*"),
            AssigneeFilter::Is(name) => f.write_str(name),
            AssigneeFilter::IsNot(name) => write!(f, "!{name}"),
        }
    }
}

/// Search criteria. Empty fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    /// `None` matches every status
    pub status: Option<IssueStatus>,
    /// positive tags are OR-ed; a leading `!` excludes the tag
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub assignee: Option<AssigneeFilter>,
    pub milestones: Vec<String>,
    pub no_milestones: bool,
    /// substring, or a glob when it contains `*`; matched against title
    /// and content, ignoring case
    pub pattern: Option<String>,
    /// `(field, value)` pairs; `*` in the value is a wildcard
    pub custom: Vec<(String, String)>,
    /// who is looking; `None` sees public issues only
    pub viewer: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

const CASE_INSENSITIVE: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

fn compile(raw: &str) -> Result<Pattern> {
    Pattern::new(raw).map_err(|err| Error::InvalidArgument(format!("invalid pattern '{raw}': {err}")))
}

enum TextMatch {
    Substring(String),
    Glob(Pattern),
}

impl TextMatch {
    fn new(raw: &str) -> Result<Self> {
        if raw.contains('*') {
            compile(raw).map(TextMatch::Glob)
        } else {
            Ok(TextMatch::Substring(raw.to_lowercase()))
        }
    }

    fn matches(&self, text: &str) -> bool {
        match self {
            TextMatch::Substring(needle) => text.to_lowercase().contains(needle),
            TextMatch::Glob(pattern) => pattern.matches_with(text, CASE_INSENSITIVE),
        }
    }
}

/// Canonical username for a filter value, which may be an email.
fn username(state: &ForgeState, raw: &str) -> String {
    state
        .find_user(raw)
        .map(|user| user.name.clone())
        .unwrap_or_else(|| raw.trim().to_string())
}

/// Issues of `project` matching `filter`, newest id first.
pub fn search_issues<'a>(
    state: &'a ForgeState,
    project: &str,
    filter: &IssueFilter,
) -> Result<Vec<&'a Issue>> {
    state.project(project)?;

    let (excluded, wanted): (Vec<&str>, Vec<&str>) = filter
        .tags
        .iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .partition(|tag| tag.starts_with('!'));
    let excluded: Vec<&str> = excluded.iter().map(|tag| tag[1..].trim()).collect();
    let author = filter.author.as_deref().map(|raw| username(state, raw));
    let assignee = filter.assignee.as_ref().map(|criterion| match criterion {
        AssigneeFilter::Is(name) => AssigneeFilter::Is(username(state, name)),
        AssigneeFilter::IsNot(name) => AssigneeFilter::IsNot(username(state, name)),
        other => other.clone(),
    });
    let viewer = filter.viewer.as_deref().map(|raw| username(state, raw));
    let text = filter
        .pattern
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(TextMatch::new)
        .transpose()?;
    let custom = filter
        .custom
        .iter()
        .map(|(key, value)| compile(value).map(|pattern| (key.as_str(), pattern)))
        .collect::<Result<Vec<_>>>()?;

    let mut issues: Vec<&Issue> = state
        .issues_of(project)
        .filter(|issue| match &viewer {
            Some(viewer) => issues::can_view(state, issue, viewer),
            None => !issue.private,
        })
        .filter(|issue| filter.status.map_or(true, |status| issue.status == status))
        .filter(|issue| author.as_ref().map_or(true, |author| &issue.author == author))
        .filter(|issue| match &assignee {
            None => true,
            Some(AssigneeFilter::Any) => issue.assignee.is_some(),
            Some(AssigneeFilter::Unassigned) => issue.assignee.is_none(),
            Some(AssigneeFilter::Is(name)) => issue.assignee.as_ref() == Some(name),
            Some(AssigneeFilter::IsNot(name)) => issue.assignee.as_ref() != Some(name),
        })
        .filter(|issue| {
            if filter.milestones.is_empty() && !filter.no_milestones {
                return true;
            }
            match &issue.milestone {
                Some(milestone) => filter.milestones.contains(milestone),
                None => filter.no_milestones,
            }
        })
        .filter(|issue| {
            if wanted.is_empty() && excluded.is_empty() {
                return true;
            }
            let names: Vec<&str> = tags::tags_of(state, &TagTarget::issue(issue.key()))
                .into_iter()
                .map(|tag| tag.text.as_str())
                .collect();
            (wanted.is_empty() || wanted.iter().any(|tag| names.contains(tag)))
                && !excluded.iter().any(|tag| names.contains(tag))
        })
        .filter(|issue| {
            text.as_ref()
                .map_or(true, |text| text.matches(&issue.title) || text.matches(&issue.content))
        })
        .filter(|issue| {
            custom.iter().all(|(key, pattern)| {
                issue
                    .custom_values
                    .get(*key)
                    .is_some_and(|value| pattern.matches_with(value, CASE_INSENSITIVE))
            })
        })
        .collect();

    issues.sort_by(|a, b| b.id.cmp(&a.id));
    let limit = filter.limit.unwrap_or(usize::MAX);
    Ok(issues.into_iter().skip(filter.offset).take(limit).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::issues::{assign, edit_issue, IssueEdit};
    use crate::model::IssueKey;
    use crate::session::Session;

    fn ids(found: Vec<&Issue>) -> Vec<u64> {
        found.into_iter().map(|issue| issue.id).collect()
    }

    fn populated() -> (Session, Vec<IssueKey>) {
        let mut session = fixtures::session();
        let keys: Vec<IssueKey> = [
            ("Crash on start", "segfault in main", "pingou"),
            ("Docs typo", "README wording", "foo"),
            ("Crash on exit", "double free", "foo"),
        ]
        .iter()
        .map(|(title, content, author)| {
            let key = fixtures::issue(&mut session, "test", title, author);
            session.state_mut().issue_mut(&key).unwrap().content = content.to_string();
            key
        })
        .collect();

        let color = "DeepSkyBlue";
        let bug = vec!["bug".to_string()];
        let bug_easyfix = vec!["bug".to_string(), "easyfix".to_string()];
        tags::add(&mut session, &TagTarget::issue(keys[0].clone()), &bug, "pingou", color).unwrap();
        tags::add(&mut session, &TagTarget::issue(keys[2].clone()), &bug_easyfix, "pingou", color).unwrap();
        assign(&mut session, &keys[0], Some("foo"), "pingou").unwrap();
        edit_issue(
            &mut session,
            &keys[1],
            &IssueEdit { status: Some(IssueStatus::Closed), ..IssueEdit::default() },
            "pingou",
        )
        .unwrap();
        (session, keys)
    }

    #[test]
    fn default_filter_returns_newest_first() {
        let (session, _) = populated();
        let found = search_issues(session.state(), "test", &IssueFilter::default()).unwrap();
        assert_eq!(ids(found), vec![3, 2, 1]);
        assert!(search_issues(session.state(), "nope", &IssueFilter::default()).is_err());
    }

    #[test]
    fn results_outlive_the_project_name() {
        let (session, _) = populated();
        let found = {
            let project = String::from("test");
            search_issues(session.state(), &project, &IssueFilter::default()).unwrap()
        };
        assert_eq!(ids(found), vec![3, 2, 1]);
        assert_eq!(session.state().next_issue_id("test"), 4);
    }

    #[test]
    fn status_and_tags() {
        let (session, _) = populated();
        let open = IssueFilter { status: Some(IssueStatus::Open), ..IssueFilter::default() };
        assert_eq!(ids(search_issues(session.state(), "test", &open).unwrap()), vec![3, 1]);

        let tagged = IssueFilter { tags: vec!["bug".into()], ..IssueFilter::default() };
        assert_eq!(ids(search_issues(session.state(), "test", &tagged).unwrap()), vec![3, 1]);

        let not_easy = IssueFilter {
            tags: vec!["bug".into(), "!easyfix".into()],
            ..IssueFilter::default()
        };
        assert_eq!(ids(search_issues(session.state(), "test", &not_easy).unwrap()), vec![1]);
    }

    #[test]
    fn assignee_and_author() {
        let (session, _) = populated();
        let run = |filter: IssueFilter| ids(search_issues(session.state(), "test", &filter).unwrap());

        assert_eq!(run(IssueFilter { assignee: Some("foo@bar.com".parse().unwrap()), ..Default::default() }), vec![1]);
        assert_eq!(run(IssueFilter { assignee: Some("!foo".parse().unwrap()), ..Default::default() }), vec![3, 2]);
        assert_eq!(run(IssueFilter { assignee: Some("*".parse().unwrap()), ..Default::default() }), vec![1]);
        assert_eq!(run(IssueFilter { assignee: Some("!*".parse().unwrap()), ..Default::default() }), vec![3, 2]);
        assert_eq!(run(IssueFilter { author: Some("foo".into()), ..Default::default() }), vec![3, 2]);
    }

    #[test]
    fn text_pattern_and_paging() {
        let (session, _) = populated();
        let run = |filter: IssueFilter| ids(search_issues(session.state(), "test", &filter).unwrap());

        assert_eq!(run(IssueFilter { pattern: Some("crash".into()), ..Default::default() }), vec![3, 1]);
        assert_eq!(run(IssueFilter { pattern: Some("*FREE".into()), ..Default::default() }), vec![3]);
        assert_eq!(run(IssueFilter { pattern: Some("readme".into()), ..Default::default() }), vec![2]);
        assert_eq!(run(IssueFilter { offset: 1, limit: Some(1), ..Default::default() }), vec![2]);
    }

    #[test]
    fn private_issues_need_a_viewer_with_access() {
        let (mut session, keys) = populated();
        session.state_mut().issue_mut(&keys[2]).unwrap().private = true;

        let run = |session: &Session, viewer: Option<&str>| {
            let filter = IssueFilter { viewer: viewer.map(str::to_string), ..Default::default() };
            ids(search_issues(session.state(), "test", &filter).unwrap())
        };
        assert_eq!(run(&session, None), vec![2, 1]);
        assert_eq!(run(&session, Some("foo")), vec![3, 2, 1]);
        assert_eq!(run(&session, Some("pingou")), vec![3, 2, 1]);
        fixtures::user(&mut session, "ralph");
        assert_eq!(run(&session, Some("ralph")), vec![2, 1]);
    }

    #[test]
    fn milestones_and_custom_fields() {
        let (mut session, keys) = populated();
        session.state_mut().issue_mut(&keys[0]).unwrap().milestone = Some("v1".into());
        session
            .state_mut()
            .issue_mut(&keys[2])
            .unwrap()
            .custom_values
            .insert("component".into(), "Backend-API".into());

        let run = |filter: IssueFilter| ids(search_issues(session.state(), "test", &filter).unwrap());
        assert_eq!(run(IssueFilter { milestones: vec!["v1".into()], ..Default::default() }), vec![1]);
        assert_eq!(
            run(IssueFilter { milestones: vec!["v1".into()], no_milestones: true, ..Default::default() }),
            vec![3, 2, 1]
        );
        assert_eq!(run(IssueFilter { no_milestones: true, ..Default::default() }), vec![3, 2]);
        assert_eq!(
            run(IssueFilter {
                custom: vec![("component".into(), "backend*".into())],
                ..Default::default()
            }),
            vec![3]
        );
    }
}
