//! HTTP surface for the ingestion service.

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use handlers::AppState;

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Ingestion
        .route("/ingest", post(handlers::ingest))
        .route("/ingest/jobs", post(handlers::start_ingest_job))
        .route("/ingest/jobs/:job_id", get(handlers::get_job_status))
        // Introspection
        .route("/strategies", get(handlers::list_strategies))
        .route("/chunkers", get(handlers::list_chunkers))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
