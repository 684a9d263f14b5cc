//! Change-message emitter.
//!
//! Components turn each state diff into human-readable lines and queue a
//! `Notification` on the session. After the session persists, the emitter
//! fans every notification out to its sinks and job submitter. A failing
//! channel is logged and reported as a warning; it never undoes the
//! mutation and never stops the other channels.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::events::{Event, EventSink};
use crate::jobs::{JobHandle, JobKind, JobRequest, JobSubmitter};
use crate::model::{ForgeState, IssueKey};
use crate::watch;

/// Project setting holding the web hook URL
pub const WEB_HOOKS_SETTING: &str = "web_hooks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "project.new")]
    ProjectNew,
    #[serde(rename = "project.forked")]
    ProjectForked,
    #[serde(rename = "project.edit")]
    ProjectEdit,
    #[serde(rename = "project.user.added")]
    ProjectUserAdded,
    #[serde(rename = "project.user.access.updated")]
    ProjectUserAccessUpdated,
    #[serde(rename = "project.user.removed")]
    ProjectUserRemoved,
    #[serde(rename = "project.group.added")]
    ProjectGroupAdded,
    #[serde(rename = "project.group.access.updated")]
    ProjectGroupAccessUpdated,
    #[serde(rename = "project.group.removed")]
    ProjectGroupRemoved,
    #[serde(rename = "project.watch.updated")]
    ProjectWatchUpdated,
    #[serde(rename = "project.tag.added")]
    ProjectTagAdded,
    #[serde(rename = "project.tag.removed")]
    ProjectTagRemoved,
    #[serde(rename = "project.tag.edited")]
    ProjectTagEdited,
    #[serde(rename = "issue.new")]
    IssueNew,
    #[serde(rename = "issue.edit")]
    IssueEdit,
    #[serde(rename = "issue.comment.added")]
    IssueCommentAdded,
    #[serde(rename = "issue.assigned.added")]
    IssueAssignedAdded,
    #[serde(rename = "issue.assigned.reset")]
    IssueAssignedReset,
    #[serde(rename = "issue.tag.added")]
    IssueTagAdded,
    #[serde(rename = "issue.tag.removed")]
    IssueTagRemoved,
    #[serde(rename = "issue.dependency.added")]
    IssueDependencyAdded,
    #[serde(rename = "issue.dependency.removed")]
    IssueDependencyRemoved,
    #[serde(rename = "issue.custom_fields.edit")]
    IssueCustomFieldsEdit,
    #[serde(rename = "issue.watch.updated")]
    IssueWatchUpdated,
    #[serde(rename = "group.edit")]
    GroupEdit,
    #[serde(rename = "group.user.added")]
    GroupUserAdded,
    #[serde(rename = "group.user.removed")]
    GroupUserRemoved,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::ProjectNew => "project.new",
            Topic::ProjectForked => "project.forked",
            Topic::ProjectEdit => "project.edit",
            Topic::ProjectUserAdded => "project.user.added",
            Topic::ProjectUserAccessUpdated => "project.user.access.updated",
            Topic::ProjectUserRemoved => "project.user.removed",
            Topic::ProjectGroupAdded => "project.group.added",
            Topic::ProjectGroupAccessUpdated => "project.group.access.updated",
            Topic::ProjectGroupRemoved => "project.group.removed",
            Topic::ProjectWatchUpdated => "project.watch.updated",
            Topic::ProjectTagAdded => "project.tag.added",
            Topic::ProjectTagRemoved => "project.tag.removed",
            Topic::ProjectTagEdited => "project.tag.edited",
            Topic::IssueNew => "issue.new",
            Topic::IssueEdit => "issue.edit",
            Topic::IssueCommentAdded => "issue.comment.added",
            Topic::IssueAssignedAdded => "issue.assigned.added",
            Topic::IssueAssignedReset => "issue.assigned.reset",
            Topic::IssueTagAdded => "issue.tag.added",
            Topic::IssueTagRemoved => "issue.tag.removed",
            Topic::IssueDependencyAdded => "issue.dependency.added",
            Topic::IssueDependencyRemoved => "issue.dependency.removed",
            Topic::IssueCustomFieldsEdit => "issue.custom_fields.edit",
            Topic::IssueWatchUpdated => "issue.watch.updated",
            Topic::GroupEdit => "group.edit",
            Topic::GroupUserAdded => "group.user.added",
            Topic::GroupUserRemoved => "group.user.removed",
        }
    }
}

/// What the emitter forwards: `(actor, audience, topic, payload)` plus the
/// change lines and any deferred jobs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub topic: Topic,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub audience: BTreeSet<String>,
    pub messages: Vec<String>,
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<JobRequest>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(topic: Topic, actor: &str) -> Self {
        Self {
            topic,
            actor: actor.to_string(),
            project: None,
            audience: BTreeSet::new(),
            messages: Vec::new(),
            payload: serde_json::Value::Null,
            jobs: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Project-scoped notification addressed to the project's watchers.
    ///
    /// Queues a web hook job when the project has one configured.
    pub fn for_project(state: &ForgeState, project: &str, topic: Topic, actor: &str) -> Self {
        let mut notification = Self::new(topic, actor);
        notification.project = Some(project.to_string());
        notification.audience = watch::project_audience(state, project);
        notification.audience.remove(actor);
        notification.attach_webhook(state, project);
        notification
    }

    /// Issue-scoped notification addressed to the issue's audience.
    pub fn for_issue(state: &ForgeState, issue: &IssueKey, topic: Topic, actor: &str) -> Self {
        let mut notification = Self::new(topic, actor);
        notification.project = Some(issue.project.clone());
        notification.audience = watch::issue_audience(state, issue);
        notification.audience.remove(actor);
        notification.attach_webhook(state, &issue.project);
        notification
    }

    pub fn with_messages<I, S>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.messages.extend(messages.into_iter().map(Into::into));
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_job(mut self, job: JobRequest) -> Self {
        self.jobs.push(job);
        self
    }

    fn attach_webhook(&mut self, state: &ForgeState, project: &str) {
        let url = state
            .projects
            .get(project)
            .and_then(|p| p.setting(WEB_HOOKS_SETTING))
            .map(str::to_string);
        if let Some(url) = url {
            self.jobs.push(
                JobRequest::new(JobKind::WebhookNotification, project).with_payload(
                    serde_json::json!({ "url": url, "topic": self.topic.as_str() }),
                ),
            );
        }
    }
}

/// A delivery channel for notifications.
pub trait NotificationSink: Send {
    fn name(&self) -> &str;
    fn deliver(&mut self, notification: &Notification) -> Result<()>;
}

/// Writes each notification as one event line.
pub struct EventLogSink {
    sink: EventSink,
}

impl EventLogSink {
    pub fn new(sink: EventSink) -> Self {
        Self { sink }
    }
}

#[derive(Serialize)]
struct EventBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<&'a str>,
    audience: &'a BTreeSet<String>,
    messages: &'a [String],
    payload: &'a serde_json::Value,
}

impl NotificationSink for EventLogSink {
    fn name(&self) -> &str {
        "event_log"
    }

    fn deliver(&mut self, notification: &Notification) -> Result<()> {
        let mut event = Event::new(notification.topic, Some(notification.actor.clone()));
        event.timestamp = notification.timestamp;
        let event = event.with_data(EventBody {
            project: notification.project.as_deref(),
            audience: &notification.audience,
            messages: &notification.messages,
            payload: &notification.payload,
        })?;
        self.sink.emit(&event)
    }
}

/// Logs a structured line per notification.
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn deliver(&mut self, notification: &Notification) -> Result<()> {
        tracing::info!(
            topic = notification.topic.as_str(),
            actor = %notification.actor,
            project = notification.project.as_deref().unwrap_or("-"),
            audience = notification.audience.len(),
            messages = ?notification.messages,
            "notification"
        );
        Ok(())
    }
}

/// Keeps delivered notifications in memory. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        match self.delivered.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn deliver(&mut self, notification: &Notification) -> Result<()> {
        self.delivered
            .lock()
            .map_err(|_| Error::OperationFailed("memory sink poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}

/// Outcome of one dispatch round.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub jobs: Vec<JobHandle>,
    pub warnings: Vec<String>,
}

/// Fans notifications out to every configured channel.
#[derive(Default)]
pub struct Emitter {
    sinks: Vec<Box<dyn NotificationSink>>,
    jobs: Option<Box<dyn JobSubmitter>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn with_jobs(mut self, submitter: impl JobSubmitter + 'static) -> Self {
        self.jobs = Some(Box::new(submitter));
        self
    }

    pub fn dispatch(&mut self, notifications: &[Notification]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for notification in notifications {
            for sink in self.sinks.iter_mut() {
                match sink.deliver(notification) {
                    Ok(()) => report.delivered += 1,
                    Err(err) => {
                        tracing::warn!(
                            channel = sink.name(),
                            topic = notification.topic.as_str(),
                            %err,
                            "notification delivery failed"
                        );
                        report.warnings.push(format!(
                            "{} delivery failed for {}: {err}",
                            sink.name(),
                            notification.topic.as_str()
                        ));
                    }
                }
            }

            let Some(submitter) = self.jobs.as_mut() else {
                continue;
            };
            for job in &notification.jobs {
                match submitter.submit(job) {
                    Ok(handle) => report.jobs.push(handle),
                    Err(err) => {
                        tracing::warn!(kind = job.kind.as_str(), %err, "job submission failed");
                        report.warnings.push(format!(
                            "job {} submission failed: {err}",
                            job.kind.as_str()
                        ));
                    }
                }
            }
        }

        report
    }
}
