//! Job store for tracking background ingestion runs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::pipeline::RunReport;
use crate::types::{IngestJobStatus, IngestJobStatusResponse};

/// In-memory job store.
pub struct JobStore {
    jobs: HashMap<Uuid, JobRecord>,
}

/// Internal record for tracking a job.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub status: IngestJobStatus,
    pub source: String,
    pub report: Option<RunReport>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(job_id: Uuid, source: impl Into<String>) -> Self {
        Self {
            job_id,
            status: IngestJobStatus::Pending,
            source: source.into(),
            report: None,
            error: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn start(&mut self) {
        self.status = IngestJobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// The run finished with a report, whether or not every chunk succeeded.
    pub fn complete(&mut self, report: RunReport) {
        self.status = IngestJobStatus::Completed;
        self.report = Some(report);
        self.completed_at = Some(Utc::now());
    }

    /// The run was aborted.
    pub fn fail(&mut self, error: String) {
        self.status = IngestJobStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, IngestJobStatus::Completed | IngestJobStatus::Failed)
    }

    pub fn to_response(&self) -> IngestJobStatusResponse {
        IngestJobStatusResponse {
            job_id: self.job_id,
            status: self.status,
            source: self.source.clone(),
            error: self.error.clone(),
            report: self.report.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
        }
    }

    /// Create a pending job and return its ID.
    pub fn create_job(&mut self, source: impl Into<String>) -> Uuid {
        let job_id = Uuid::new_v4();
        self.jobs.insert(job_id, JobRecord::new(job_id, source));
        job_id
    }

    pub fn get_job(&self, job_id: Uuid) -> Option<&JobRecord> {
        self.jobs.get(&job_id)
    }

    pub fn start_job(&mut self, job_id: Uuid) -> bool {
        self.update(job_id, JobRecord::start)
    }

    pub fn complete_job(&mut self, job_id: Uuid, report: RunReport) -> bool {
        self.update(job_id, |job| job.complete(report))
    }

    pub fn fail_job(&mut self, job_id: Uuid, error: String) -> bool {
        self.update(job_id, |job| job.fail(error))
    }

    fn update(&mut self, job_id: Uuid, f: impl FnOnce(&mut JobRecord)) -> bool {
        match self.jobs.get_mut(&job_id) {
            Some(job) => {
                f(job);
                true
            }
            None => false,
        }
    }

    pub fn get_job_status(&self, job_id: Uuid) -> Option<IngestJobStatusResponse> {
        self.jobs.get(&job_id).map(|j| j.to_response())
    }

    /// Drop finished jobs older than one hour.
    pub fn cleanup_old_jobs(&mut self) -> usize {
        self.cleanup_older_than(Utc::now() - chrono::Duration::hours(1))
    }

    /// Drop finished jobs that completed before `cutoff`.
    pub fn cleanup_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| !job.is_finished() || job.completed_at.map_or(true, |t| t > cutoff));
        before - self.jobs.len()
    }

    pub fn get_job_counts(&self) -> HashMap<IngestJobStatus, usize> {
        let mut counts = HashMap::new();
        for job in self.jobs.values() {
            *counts.entry(job.status).or_insert(0) += 1;
        }
        counts
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
