//! Request and job types for the HTTP surface.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ContentUnit, EntityType, ExtractionOptions};
use crate::error::PipelineError;
use crate::pipeline::RunReport;

fn default_source() -> String {
    "inline".to_string()
}

/// Content submitted for ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Path or URI the content came from; also used for type detection
    #[serde(default = "default_source")]
    pub source: String,

    pub content: String,

    /// `utf-8` (default) or `base64`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,

    /// Declared MIME type; detected when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    /// Skip the analysis service for this request
    #[serde(default)]
    pub rules_only: bool,

    /// Keep only these entity types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_types: Option<Vec<EntityType>>,
}

impl IngestRequest {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            source: default_source(),
            content: content.into(),
            encoding: None,
            content_type: None,
            metadata: None,
            rules_only: false,
            entity_types: None,
        }
    }

    /// Decode the payload into a content unit.
    pub fn to_content_unit(&self) -> Result<ContentUnit, PipelineError> {
        let bytes = match self.encoding.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("utf-8") | Some("utf8") | Some("text") => self.content.as_bytes().to_vec(),
            Some("base64") => base64::engine::general_purpose::STANDARD
                .decode(self.content.trim())
                .map_err(|e| PipelineError::Config(format!("invalid base64 content: {}", e)))?,
            Some(other) => {
                return Err(PipelineError::Config(format!("unsupported encoding: {}", other)));
            }
        };

        let mut unit = ContentUnit::new(self.source.clone(), bytes);
        if let Some(content_type) = &self.content_type {
            unit = unit.with_content_type(content_type.clone());
        }
        if let Some(metadata) = &self.metadata {
            unit = unit.with_metadata(metadata.clone());
        }
        Ok(unit)
    }

    /// Extraction options for this request, starting from `base`.
    pub fn extraction_options(&self, mut base: ExtractionOptions) -> ExtractionOptions {
        if self.rules_only {
            base.allow_analysis = false;
        }
        if self.entity_types.is_some() {
            base.entity_types = self.entity_types.clone();
        }
        base
    }
}

/// Response when starting a background ingestion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartIngestJobResponse {
    pub job_id: Uuid,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Job status, with the run report once the run has finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJobStatusResponse {
    pub job_id: Uuid,
    pub status: IngestJobStatus,
    pub source: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RunReport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}
