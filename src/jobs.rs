//! Background-job submission.
//!
//! Mutations that need deferred work (ACL regeneration, webhook delivery)
//! attach a `JobRequest` to their notification. The emitter hands those to a
//! `JobSubmitter` after the state is persisted; the forge never runs jobs
//! itself.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Regenerate the git-side ACLs for a project
    RefreshAcls,
    /// POST a notification to the project's configured web hook
    WebhookNotification,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::RefreshAcls => "refresh_acls",
            JobKind::WebhookNotification => "webhook_notification",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }
}

/// Work to be deferred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub kind: JobKind,
    pub project: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl JobRequest {
    pub fn new(kind: JobKind, project: impl Into<String>) -> Self {
        Self {
            kind,
            project: project.into(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Handle returned on submission; poll it through the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: Uuid,
    pub kind: JobKind,
    pub queued_at: DateTime<Utc>,
}

/// One line of the job queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub kind: JobKind,
    pub project: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub queued_at: DateTime<Utc>,
}

pub trait JobSubmitter: Send {
    fn submit(&mut self, request: &JobRequest) -> Result<JobHandle>;
}

/// Append-only JSONL queue in `.forge/jobs.jsonl`.
///
/// Workers (out of process) append later records for the same `job_id`
/// with a new status; the last record wins.
#[derive(Debug, Clone)]
pub struct FileJobQueue {
    storage: Storage,
}

impl FileJobQueue {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn path(&self) -> PathBuf {
        self.storage.jobs_file()
    }

    pub fn records(&self) -> Result<Vec<JobRecord>> {
        self.storage.read_jsonl(&self.path())
    }

    /// Latest record for a job
    pub fn status(&self, job_id: &Uuid) -> Result<JobRecord> {
        self.records()?
            .into_iter()
            .rev()
            .find(|record| &record.job_id == job_id)
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))
    }
}

impl JobSubmitter for FileJobQueue {
    fn submit(&mut self, request: &JobRequest) -> Result<JobHandle> {
        let record = JobRecord {
            job_id: Uuid::new_v4(),
            kind: request.kind,
            project: request.project.clone(),
            payload: request.payload.clone(),
            status: JobStatus::Queued,
            queued_at: Utc::now(),
        };
        self.storage.append_jsonl(&self.path(), &record)?;
        tracing::debug!(job_id = %record.job_id, kind = request.kind.as_str(), "job queued");
        Ok(JobHandle {
            job_id: record.job_id,
            kind: record.kind,
            queued_at: record.queued_at,
        })
    }
}
