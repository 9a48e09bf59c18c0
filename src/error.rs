//! Error taxonomy for the ingestion pipeline.
//!
//! Errors are classified by how far they may travel:
//! - `ExternalError`: raised by collaborators, classified transient or terminal
//! - `InvokeError`: what the resilient invoker hands back once it gives up
//! - `ChunkError` / `ExtractionError`: contained at chunk level
//! - `PipelineError`: the only errors that abort a run

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Serializable error classification used in run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigError,
    TransientExternal,
    TerminalExternal,
    ValidationError,
    PartialPipelineFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::ConfigError => "config_error",
            ErrorKind::TransientExternal => "transient_external",
            ErrorKind::TerminalExternal => "terminal_external",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::PartialPipelineFailure => "partial_pipeline_failure",
        };
        f.write_str(name)
    }
}

/// Failure reported by an external collaborator (analysis service, store).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalError {
    // Transient
    #[error("network error: {0}")]
    Network(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("resource locked: {0}")]
    Locked(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    // Terminal
    #[error("schema error: {0}")]
    Schema(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

impl ExternalError {
    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExternalError::Network(_)
                | ExternalError::Timeout(_)
                | ExternalError::Locked(_)
                | ExternalError::RateLimited(_)
                | ExternalError::Unavailable(_)
        )
    }

    pub fn kind(&self) -> ErrorKind {
        if self.is_transient() {
            ErrorKind::TransientExternal
        } else {
            ErrorKind::TerminalExternal
        }
    }
}

/// Failure surfaced by the resilient invoker.
///
/// Both variants are terminal from the caller's point of view: either the
/// underlying error was not retryable, or every allowed attempt was used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("terminal failure on attempt {attempts}: {source}")]
    Terminal { source: ExternalError, attempts: u32 },

    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted { source: ExternalError, attempts: u32 },
}

impl InvokeError {
    pub fn attempts(&self) -> u32 {
        match self {
            InvokeError::Terminal { attempts, .. } | InvokeError::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// The error returned by the final attempt.
    pub fn last_error(&self) -> &ExternalError {
        match self {
            InvokeError::Terminal { source, .. } | InvokeError::Exhausted { source, .. } => source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::TerminalExternal
    }
}

/// Errors raised by the chunker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("invalid chunk configuration: {0}")]
    InvalidConfig(String),

    #[error("content is not valid UTF-8 text: {0}")]
    NotText(String),
}

impl ChunkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChunkError::InvalidConfig(_) => ErrorKind::ConfigError,
            ChunkError::NotText(_) => ErrorKind::PartialPipelineFailure,
        }
    }
}

/// Failure of a single extraction strategy.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error("analysis response is not an entity list: {0}")]
    MalformedResponse(String),

    #[error("strategy unavailable: {0}")]
    Unavailable(String),
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::Invoke(e) => e.kind(),
            ExtractionError::MalformedResponse(_) => ErrorKind::TerminalExternal,
            ExtractionError::Unavailable(_) => ErrorKind::TransientExternal,
        }
    }
}

/// Errors that abort a pipeline run outright.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("run aborted: first chunk failed terminally with no usable result: {message}")]
    Aborted { kind: ErrorKind, message: String },

    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Config(_) => ErrorKind::ConfigError,
            PipelineError::Aborted { kind, .. } => *kind,
            PipelineError::Read { .. } => ErrorKind::TerminalExternal,
        }
    }
}

impl From<ChunkError> for PipelineError {
    fn from(err: ChunkError) -> Self {
        PipelineError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ExternalError::Network("reset".into()).is_transient());
        assert!(ExternalError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(ExternalError::Locked("database is locked".into()).is_transient());
        assert!(ExternalError::RateLimited("429".into()).is_transient());
        assert!(!ExternalError::Schema("bad column".into()).is_transient());
        assert!(!ExternalError::Permission("401".into()).is_transient());
        assert!(!ExternalError::MalformedRequest("400".into()).is_transient());
    }

    #[test]
    fn test_invoke_error_is_terminal_kind() {
        let err = InvokeError::Exhausted {
            source: ExternalError::Network("down".into()),
            attempts: 3,
        };
        assert_eq!(err.kind(), ErrorKind::TerminalExternal);
        assert_eq!(err.attempts(), 3);
        assert!(err.last_error().is_transient());
        assert!(err.to_string().contains("3 attempts"));
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::PartialPipelineFailure).unwrap();
        assert_eq!(json, "\"partial_pipeline_failure\"");
        assert_eq!(ErrorKind::ConfigError.to_string(), "config_error");
    }
}
