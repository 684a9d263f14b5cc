//! Shared plumbing for forgecore commands: locate the forge root, open a
//! session, build the notification channels, and commit.

use std::path::PathBuf;

use serde::Serialize;

use crate::actor::resolve_actor;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::EventDestination;
use crate::jobs::{FileJobQueue, JobHandle};
use crate::model::{IssueKey, TagTarget};
use crate::notify::{Emitter, EventLogSink, TracingSink};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::session::Session;
use crate::storage::Storage;

/// Flags every command accepts.
#[derive(Debug, Clone, Default)]
pub struct Global {
    pub root: Option<PathBuf>,
    pub actor: Option<String>,
    pub events: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

impl Global {
    pub fn events_to_stdout(&self) -> bool {
        matches!(
            EventDestination::parse(self.events.as_deref()),
            Some(EventDestination::Stdout)
        )
    }

    /// Events on stdout take over the stream, so reports go quiet.
    pub fn output(&self) -> OutputOptions {
        let events_to_stdout = self.events_to_stdout();
        OutputOptions {
            json: self.json && !events_to_stdout,
            quiet: self.quiet || events_to_stdout,
        }
    }

    pub fn storage(&self) -> Result<Storage> {
        let root = match &self.root {
            Some(path) => path.clone(),
            None => std::env::current_dir()?,
        };
        Ok(Storage::new(root))
    }
}

/// An open session plus everything a command needs around it.
pub struct Context {
    pub storage: Storage,
    pub config: Config,
    pub actor: String,
    pub session: Session,
}

impl Context {
    pub fn open(global: &Global) -> Result<Self> {
        let storage = global.storage()?;
        let config = Config::load_from_root(storage.root());
        let session = Session::open(&storage, config.lock.timeout_ms)?;
        let actor = resolve_actor(Some(&storage), global.actor.as_deref())?;
        tracing::debug!(root = %storage.root().display(), actor = %actor, "session opened");
        Ok(Self {
            storage,
            config,
            actor,
            session,
        })
    }

    /// Channels for this invocation. Failing to open the event log is a
    /// warning, not an error.
    fn emitter(&self, global: &Global, warnings: &mut Vec<String>) -> Emitter {
        let mut emitter = Emitter::new().with_sink(TracingSink);

        let destination = EventDestination::parse(global.events.as_deref()).or_else(|| {
            self.config.notifications.enabled.then(|| {
                EventDestination::File(self.storage.events_file(&self.config.notifications.events_file))
            })
        });
        if let Some(destination) = destination {
            match destination.open() {
                Ok(sink) => emitter = emitter.with_sink(EventLogSink::new(sink)),
                Err(err) => {
                    tracing::warn!(error = %err, "event log unavailable");
                    warnings.push(format!("event output failed: {err}"));
                }
            }
        }

        if self.config.jobs.enabled {
            emitter = emitter.with_jobs(FileJobQueue::new(self.storage.clone()));
        }
        emitter
    }
}

/// Result of one mutating command.
#[derive(Debug, Serialize)]
pub struct MutationReport {
    pub target: String,
    pub changed: bool,
    pub messages: Vec<String>,
    pub notifications: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<JobHandle>,
}

/// Open a session, run `mutate`, commit, and report.
///
/// `Error::NoChange` and an empty message list are both reported as a
/// successful run with `changed: false`.
pub fn apply<F>(global: &Global, command: &str, target: &str, mutate: F) -> Result<()>
where
    F: FnOnce(&mut Context) -> Result<Vec<String>>,
{
    let mut ctx = Context::open(global)?;
    let (changed, messages) = match mutate(&mut ctx) {
        Ok(messages) => (!messages.is_empty(), messages),
        Err(Error::NoChange(message)) => (false, vec![message]),
        Err(err) => return Err(err),
    };

    let mut warnings = Vec::new();
    let mut emitter = ctx.emitter(global, &mut warnings);
    let commit = ctx.session.commit(&mut emitter)?;
    warnings.extend(commit.warnings);

    let report = MutationReport {
        target: target.to_string(),
        changed,
        messages,
        notifications: commit.notifications,
        jobs: commit.jobs,
    };

    let header = match report.messages.first() {
        Some(first) if changed => first.clone(),
        Some(first) => format!("No changes: {first}"),
        None => "No changes".to_string(),
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("target", target);
    if report.notifications > 0 {
        human.push_summary("notifications", report.notifications.to_string());
    }
    for job in &report.jobs {
        human.push_summary("job", format!("{} {}", job.kind.as_str(), job.job_id));
    }
    for message in report.messages.iter().skip(1) {
        human.push_change(message.clone());
    }
    for warning in warnings {
        human.push_warning(warning);
    }

    emit_success(global.output(), command, &report, Some(&human))
}

/// Parse `project#id`.
pub fn parse_issue(raw: &str) -> Result<IssueKey> {
    let invalid = || Error::InvalidArgument(format!("invalid issue '{raw}', expected <project>#<id>"));
    let (project, id) = raw.trim().rsplit_once('#').ok_or_else(invalid)?;
    let project = project.trim();
    if project.is_empty() {
        return Err(invalid());
    }
    let id = id.trim().parse::<u64>().map_err(|_| invalid())?;
    Ok(IssueKey::new(project, id))
}

/// `project#id` names an issue; anything else names a project.
pub fn parse_target(raw: &str) -> Result<TagTarget> {
    if raw.contains('#') {
        parse_issue(raw).map(TagTarget::issue)
    } else {
        Ok(TagTarget::project(raw.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_refs_keep_namespaced_projects() {
        assert_eq!(parse_issue("test#3").unwrap(), IssueKey::new("test", 3));
        assert_eq!(
            parse_issue("forks/foo/test#12").unwrap(),
            IssueKey::new("forks/foo/test", 12)
        );
        assert!(parse_issue("test").is_err());
        assert!(parse_issue("#3").is_err());
        assert!(parse_issue("test#x").is_err());
    }

    #[test]
    fn tag_targets() {
        assert_eq!(parse_target("test").unwrap(), TagTarget::project("test"));
        assert_eq!(
            parse_target("test#1").unwrap(),
            TagTarget::issue(IssueKey::new("test", 1))
        );
    }

    #[test]
    fn stdout_events_force_quiet() {
        let global = Global {
            events: Some("-".to_string()),
            json: true,
            ..Global::default()
        };
        let output = global.output();
        assert!(!output.json);
        assert!(output.quiet);
    }
}
