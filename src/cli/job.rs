//! forgecore job command implementation.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::jobs::{FileJobQueue, JobRecord};
use crate::output::{emit_success, HumanOutput};

use super::Global;

/// Latest record per job, in submission order.
fn latest(records: Vec<JobRecord>) -> Vec<JobRecord> {
    let mut jobs: Vec<JobRecord> = Vec::new();
    for record in records {
        match jobs.iter_mut().find(|job| job.job_id == record.job_id) {
            Some(existing) => *existing = record,
            None => jobs.push(record),
        }
    }
    jobs
}

fn describe(record: &JobRecord) -> String {
    format!(
        "{} {} {} ({})",
        record.job_id,
        record.kind.as_str(),
        record.status.as_str(),
        record.project
    )
}

pub fn run_status(global: &Global, job_id: Option<&str>) -> Result<()> {
    let storage = global.storage()?;
    if !storage.is_initialized() {
        return Err(Error::NotInitialized(storage.root().to_path_buf()));
    }
    let queue = FileJobQueue::new(storage);

    if let Some(raw) = job_id {
        let id = Uuid::parse_str(raw.trim())
            .map_err(|_| Error::InvalidArgument(format!("invalid job id '{raw}'")))?;
        let record = queue.status(&id)?;
        let mut human = HumanOutput::new(format!("Job {}", record.job_id));
        human.push_summary("kind", record.kind.as_str());
        human.push_summary("status", record.status.as_str());
        human.push_summary("project", record.project.clone());
        human.push_summary("queued at", record.queued_at.to_rfc3339());
        return emit_success(global.output(), "job status", &record, Some(&human));
    }

    let jobs = latest(queue.records()?);
    let mut human = HumanOutput::new("Jobs");
    human.push_summary("count", jobs.len().to_string());
    for record in &jobs {
        human.push_detail(describe(record));
    }
    emit_success(global.output(), "job status", &jobs, Some(&human))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobKind, JobStatus};
    use chrono::Utc;

    fn record(id: Uuid, status: JobStatus) -> JobRecord {
        JobRecord {
            job_id: id,
            kind: JobKind::RefreshAcls,
            project: "test".to_string(),
            payload: serde_json::Value::Null,
            status,
            queued_at: Utc::now(),
        }
    }

    #[test]
    fn later_records_replace_earlier_ones() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let jobs = latest(vec![
            record(first, JobStatus::Queued),
            record(second, JobStatus::Queued),
            record(first, JobStatus::Done),
        ]);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job_id, first);
        assert_eq!(jobs[0].status, JobStatus::Done);
        assert_eq!(jobs[1].status, JobStatus::Queued);
    }
}
