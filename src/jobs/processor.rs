//! Job processor for background ingestion runs.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::store::JobStore;
use crate::pipeline::{PipelineCoordinator, RunReport};
use crate::types::IngestRequest;

/// Runs ingestion requests against a shared coordinator.
pub struct JobProcessor {
    coordinator: Arc<PipelineCoordinator>,
    cancel: CancellationToken,
}

impl JobProcessor {
    pub fn new(coordinator: Arc<PipelineCoordinator>) -> Self {
        Self {
            coordinator,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop scheduling new chunks when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Process one job and record the outcome in `job_store`.
    pub async fn process_job(
        &self,
        job_id: Uuid,
        request: IngestRequest,
        job_store: Arc<RwLock<JobStore>>,
    ) {
        info!(job_id = %job_id, source = %request.source, "Starting job processing");

        {
            let mut store = job_store.write().await;
            store.start_job(job_id);
        }

        let outcome = self.process_request(&request).await;

        let mut store = job_store.write().await;
        match outcome {
            Ok(report) => {
                if report.done {
                    info!(
                        job_id = %job_id,
                        entities = report.entity_count(),
                        chunks = report.chunks_attempted,
                        "Job processing complete"
                    );
                } else {
                    warn!(
                        job_id = %job_id,
                        state = %report.state,
                        errors = report.errors.len(),
                        "Job finished with partial failure"
                    );
                }
                store.complete_job(job_id, report);
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Job failed");
                store.fail_job(job_id, e.to_string());
            }
        }
    }

    /// Run a single request inline.
    pub async fn process_request(
        &self,
        request: &IngestRequest,
    ) -> Result<RunReport, crate::error::PipelineError> {
        let content = request.to_content_unit()?;
        let options = request.extraction_options(self.coordinator.config().extraction_options());
        self.coordinator
            .run_with_options(content, &options, &self.cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IngestJobStatus, PipelineConfig};

    fn processor() -> JobProcessor {
        let config = PipelineConfig::default();
        JobProcessor::new(Arc::new(PipelineCoordinator::from_config(config).unwrap()))
    }

    #[tokio::test]
    async fn test_process_job_records_report() {
        let store = Arc::new(RwLock::new(JobStore::new()));
        let job_id = store.write().await.create_job("inline");

        let request = IngestRequest::text("John Smith works at Acme Corp in Paris on 2024-01-05.");
        processor().process_job(job_id, request, store.clone()).await;

        let status = store.read().await.get_job_status(job_id).unwrap();
        assert_eq!(status.status, IngestJobStatus::Completed);
        let report = status.report.unwrap();
        assert!(report.done);
        assert_eq!(report.entity_count(), 4);
    }

    #[tokio::test]
    async fn test_bad_request_fails_job() {
        let store = Arc::new(RwLock::new(JobStore::new()));
        let job_id = store.write().await.create_job("inline");

        let mut request = IngestRequest::text("x");
        request.encoding = Some("utf-16".into());
        processor().process_job(job_id, request, store.clone()).await;

        let status = store.read().await.get_job_status(job_id).unwrap();
        assert_eq!(status.status, IngestJobStatus::Failed);
        assert!(status.error.unwrap().contains("unsupported encoding"));
    }
}
