//! Analysis service: the AI backend entity candidates come from.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::error::{ExternalError, PipelineError};
use crate::types::{ContentFamily, PipelineConfig};

/// What is sent for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisPayload {
    Text(String),
    Binary(Vec<u8>),
}

impl AnalysisPayload {
    /// Text-like families are always sent as text, whatever their bytes
    /// decode to; everything else goes as binary.
    pub fn for_family(family: ContentFamily, text: impl FnOnce() -> String, bytes: &[u8]) -> Self {
        if family.is_text_like() {
            AnalysisPayload::Text(text())
        } else {
            AnalysisPayload::Binary(bytes.to_vec())
        }
    }

    pub fn encoding(&self) -> &'static str {
        match self {
            AnalysisPayload::Text(_) => "utf-8",
            AnalysisPayload::Binary(_) => "base64",
        }
    }

    /// Payload as a wire string: text as-is, binary as base64.
    pub fn encoded(&self) -> String {
        match self {
            AnalysisPayload::Text(text) => text.clone(),
            AnalysisPayload::Binary(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AnalysisPayload::Text(text) => text.len(),
            AnalysisPayload::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One analysis call.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub profile: &'a str,
    pub instructions: &'a str,
    pub payload: &'a AnalysisPayload,
}

/// AI-backed analysis backend.
///
/// Success returns candidate JSON: an array of entities, or an object with
/// an `entities` array. Anything else is treated by the caller as malformed.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Whether a credential (or equivalent) is present. Unconfigured
    /// services are skipped instead of called.
    fn is_configured(&self) -> bool;

    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<serde_json::Value, ExternalError>;
}

/// Stand-in used when no analysis backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAnalysis;

#[async_trait]
impl AnalysisService for NoAnalysis {
    fn is_configured(&self) -> bool {
        false
    }

    async fn analyze(&self, _request: &AnalysisRequest<'_>) -> Result<serde_json::Value, ExternalError> {
        Err(ExternalError::Unavailable("no analysis service configured".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct AnalyzeBody<'a> {
    profile: &'a str,
    instructions: &'a str,
    content: String,
    encoding: &'static str,
}

/// HTTP client for the analysis service.
pub struct HttpAnalysisService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpAnalysisService {
    /// Create a client. `timeout` bounds the whole HTTP exchange; the
    /// retry policy's per-attempt timeout still applies on top.
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Build from config; `None` when no service URL is set.
    pub fn from_config(config: &PipelineConfig) -> Result<Option<Self>, PipelineError> {
        match &config.analysis_service_url {
            Some(url) if !url.trim().is_empty() => Ok(Some(Self::new(
                url,
                config.analysis_api_key.clone(),
                config.extraction_retry.timeout(),
            )?)),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<serde_json::Value, ExternalError> {
        let url = format!("{}/analyze", self.base_url);
        let body = AnalyzeBody {
            profile: request.profile,
            instructions: request.instructions,
            content: request.payload.encoded(),
            encoding: request.payload.encoding(),
        };

        debug!(profile = request.profile, bytes = request.payload.len(), "Calling analysis service");

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ExternalError::Schema(format!("unreadable analysis response: {}", e)))
    }
}

/// Classify a non-success HTTP status.
pub fn status_error(status: StatusCode, body: String) -> ExternalError {
    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };
    match status {
        StatusCode::TOO_MANY_REQUESTS => ExternalError::RateLimited(message),
        StatusCode::REQUEST_TIMEOUT => ExternalError::Unavailable(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ExternalError::Permission(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ExternalError::MalformedRequest(message),
        s if s.is_server_error() => ExternalError::Unavailable(message),
        _ => ExternalError::MalformedRequest(message),
    }
}

fn transport_error(err: reqwest::Error) -> ExternalError {
    if err.is_timeout() {
        ExternalError::Timeout(Duration::ZERO)
    } else if err.is_connect() || err.is_request() {
        ExternalError::Network(err.to_string())
    } else if err.is_decode() || err.is_body() {
        ExternalError::Schema(err.to_string())
    } else {
        ExternalError::Network(err.to_string())
    }
}
