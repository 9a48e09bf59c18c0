//! Entity Ingest Service - Main Entry Point
//!
//! Serves ingestion over HTTP, or ingests files given on the command line.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use entity_ingest::api::{self, AppState};
use entity_ingest::{PipelineConfig, PipelineCoordinator};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = PipelineConfig::from_env().context("loading configuration")?;
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| config.log_format.clone());
    init_tracing(&log_format);

    info!("Starting Entity Ingest v{}", env!("CARGO_PKG_VERSION"));
    info!(
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        strategy = %config.chunk_strategy,
        "Chunking configuration"
    );

    let port = config.port;
    let coordinator = PipelineCoordinator::from_config(config).context("building pipeline")?;

    let files: Vec<String> = std::env::args().skip(1).collect();
    if !files.is_empty() {
        return ingest_files(&coordinator, &files).await;
    }

    let state = Arc::new(AppState::new(coordinator));
    let shutdown = state.shutdown.clone();
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

fn init_tracing(log_format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "entity_ingest=info,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if log_format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Ingest each file in turn and print its run report as JSON.
async fn ingest_files(coordinator: &PipelineCoordinator, files: &[String]) -> Result<()> {
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight chunks");
            watcher.cancel();
        }
    });

    for file in files {
        let report = coordinator
            .ingest_file(file, &cancel)
            .await
            .with_context(|| format!("ingesting {}", file))?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        if cancel.is_cancelled() {
            break;
        }
    }
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
    shutdown.cancel();
}
