//! Run report returned for every ingestion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RunState;
use crate::error::ErrorKind;
use crate::types::{Entity, StrategyFailure};

/// One recorded failure. `chunk_index` is absent for run-level errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    pub kind: ErrorKind,
    pub message: String,
}

impl RunError {
    pub fn chunk(index: Option<usize>, failure: &StrategyFailure) -> Self {
        Self {
            chunk_index: index,
            kind: failure.kind,
            message: format!("{}: {}", failure.strategy, failure.message),
        }
    }

    pub fn run(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            chunk_index: None,
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub content_id: Uuid,
    pub content_type: String,
    pub state: RunState,
    pub done: bool,
    pub cancelled: bool,
    pub persisted: bool,
    pub chunks_attempted: usize,
    pub chunks_succeeded: usize,
    pub entities: Vec<Entity>,
    pub errors: Vec<RunError>,
    /// States visited, in order
    pub states: Vec<RunState>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn mention_count(&self) -> usize {
        self.entities.iter().map(|e| e.mentions.len()).sum()
    }
}
