//! HTTP request handlers for the ingestion service.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::chunkers;
use crate::error::{ErrorKind, PipelineError};
use crate::extraction::TableEntry;
use crate::jobs::{JobProcessor, JobStore};
use crate::pipeline::{PipelineCoordinator, RunReport};
use crate::resilience::CircuitStats;
use crate::types::{IngestJobStatus, IngestRequest, StartIngestJobResponse};

/// Application state shared across handlers.
pub struct AppState {
    pub coordinator: Arc<PipelineCoordinator>,
    pub job_store: Arc<RwLock<JobStore>>,
    /// Cancelled on shutdown; running jobs stop scheduling chunks
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(coordinator: PipelineCoordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            job_store: Arc::new(RwLock::new(JobStore::new())),
            shutdown: CancellationToken::new(),
        }
    }

    fn processor(&self) -> JobProcessor {
        JobProcessor::new(self.coordinator.clone()).with_cancellation(self.shutdown.child_token())
    }
}

/// Error body returned for failed requests.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    kind: ErrorKind,
    error: String,
}

pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PipelineError::Config(_) => StatusCode::BAD_REQUEST,
            PipelineError::Aborted { .. } => StatusCode::BAD_GATEWAY,
            PipelineError::Read { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let body = ErrorResponse {
            kind: self.0.kind(),
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis_circuit: Option<CircuitStats>,
    jobs: HashMap<IngestJobStatus, usize>,
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let analysis_circuit = state
        .coordinator
        .chain()
        .table()
        .circuit_breaker()
        .map(|breaker| breaker.stats());
    let status = match &analysis_circuit {
        Some(stats) if stats.state == crate::resilience::CircuitState::Open => "degraded",
        _ => "healthy",
    };
    let jobs = state.job_store.read().await.get_job_counts();

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        analysis_circuit,
        jobs,
    })
}

/// Ingest one content unit and wait for the run report.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<RunReport>, ApiError> {
    info!(source = %request.source, bytes = request.content.len(), "Received ingest request");
    let report = state.processor().process_request(&request).await?;
    Ok(Json(report))
}

/// Start a background ingestion job.
pub async fn start_ingest_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> Json<StartIngestJobResponse> {
    if request.content.is_empty() {
        return Json(StartIngestJobResponse {
            job_id: Uuid::nil(),
            accepted: false,
            message: Some("No content provided".to_string()),
        });
    }

    info!(source = %request.source, "Received ingest job request");

    let job_id = {
        let mut store = state.job_store.write().await;
        store.cleanup_old_jobs();
        store.create_job(request.source.clone())
    };

    let processor = state.processor();
    let job_store = state.job_store.clone();
    tokio::spawn(async move {
        processor.process_job(job_id, request, job_store).await;
    });

    Json(StartIngestJobResponse {
        job_id,
        accepted: true,
        message: None,
    })
}

/// Get job status.
pub async fn get_job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let store = state.job_store.read().await;

    match store.get_job_status(job_id) {
        Some(status) => Ok(Json(status)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// Strategy table, most specific pattern first.
pub async fn list_strategies(State(state): State<Arc<AppState>>) -> Json<Vec<TableEntry>> {
    Json(state.coordinator.chain().table().list())
}

#[derive(Debug, Serialize)]
pub struct ChunkerInfo {
    name: String,
    description: String,
}

/// List available chunking strategies.
pub async fn list_chunkers() -> Json<Vec<ChunkerInfo>> {
    let chunkers: Vec<ChunkerInfo> = chunkers::list_chunkers()
        .into_iter()
        .map(|(name, desc)| ChunkerInfo {
            name: name.to_string(),
            description: desc.to_string(),
        })
        .collect();

    Json(chunkers)
}
