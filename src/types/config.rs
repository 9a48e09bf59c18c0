//! Configuration types for chunking, extraction and retries.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PipelineError;
use crate::resilience::CircuitConfig;
use crate::types::EntityType;
use crate::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_CONTEXT_WINDOW, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_SINGLE_UNIT_THRESHOLD,
};

/// Prefix for environment overrides (`INGEST_CHUNK_SIZE`, `INGEST_STORAGE_RETRY__MAX_ATTEMPTS`, ...).
pub const ENV_PREFIX: &str = "INGEST";

/// Global pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum chunk body size in bytes
    pub chunk_size: usize,

    /// Bytes (or whole sentences) repeated at the start of each following chunk
    pub chunk_overlap: usize,

    /// Chunking strategy name: `size`, `paragraph` or `sentence`
    pub chunk_strategy: String,

    /// Content at or below this many bytes is processed as a single unit
    pub single_unit_threshold: usize,

    /// Maximum chunks extracted concurrently
    pub max_concurrent_extractions: usize,

    /// Characters of context captured on each side of a rule-based match
    pub context_window: usize,

    /// Base URL of the analysis service
    pub analysis_service_url: Option<String>,

    /// Credential for the analysis service; AI strategies are skipped without it
    pub analysis_api_key: Option<String>,

    /// Retry policy for analysis calls
    pub extraction_retry: RetryPolicy,

    /// Retry policy for store writes
    pub storage_retry: RetryPolicy,

    /// Circuit breaker guarding the analysis service
    pub circuit: CircuitConfig,

    /// Instruction text per analysis profile
    pub instruction_profiles: HashMap<String, String>,

    /// HTTP port for the service
    pub port: u16,

    /// `text` or `json`
    pub log_format: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            chunk_strategy: "paragraph".to_string(),
            single_unit_threshold: DEFAULT_SINGLE_UNIT_THRESHOLD,
            max_concurrent_extractions: DEFAULT_MAX_CONCURRENCY,
            context_window: DEFAULT_CONTEXT_WINDOW,
            analysis_service_url: None,
            analysis_api_key: None,
            extraction_retry: RetryPolicy::default(),
            storage_retry: RetryPolicy::storage(),
            circuit: CircuitConfig::default(),
            instruction_profiles: default_instruction_profiles(),
            port: 3017,
            log_format: "text".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from defaults and `INGEST_*` environment variables.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::load(None)
    }

    /// Load configuration: defaults, then an optional file, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        Self::load_with_env(path, None)
    }

    /// Like [`load`](Self::load) with an explicit environment map instead of
    /// the process environment.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, PipelineError> {
        let defaults = config::Config::try_from(&PipelineConfig::default()).map_err(config_error)?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let mut environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        if env.is_some() {
            environment = environment.source(env);
        }
        builder = builder.add_source(environment);

        let config: PipelineConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.chunk_config().validate()?;
        if self.max_concurrent_extractions == 0 {
            return Err(PipelineError::Config(
                "max_concurrent_extractions must be at least 1".to_string(),
            ));
        }
        self.extraction_retry.validate()?;
        self.storage_retry.validate()?;
        Ok(())
    }

    /// Chunk configuration derived from this config.
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            strategy: ChunkStrategy::from_name(&self.chunk_strategy),
        }
    }

    /// Extraction options derived from this config.
    pub fn extraction_options(&self) -> ExtractionOptions {
        ExtractionOptions {
            allow_analysis: true,
            entity_types: None,
            context_window: self.context_window,
        }
    }

    /// Instruction text for an analysis profile.
    pub fn instructions_for(&self, profile: &str) -> String {
        self.instruction_profiles
            .get(profile)
            .cloned()
            .unwrap_or_else(|| format!("Extract named entities from this {} content.", profile))
    }
}

fn config_error(err: config::ConfigError) -> PipelineError {
    PipelineError::Config(err.to_string())
}

fn default_instruction_profiles() -> HashMap<String, String> {
    const SHAPE: &str = "Respond with a JSON array of objects with fields name, type \
(person|organization|location|date|product|technology|event|other), description, \
and mentions (context, position, relevance between 0 and 1).";

    [
        ("text", "Identify people, organizations, locations, dates, products and events mentioned in this document."),
        ("code", "Identify the languages, frameworks, libraries, classes and functions in this source code; type them as technology."),
        ("structured", "Identify the entities described by this structured data record."),
        ("media", "Identify people, places, organizations, products and visible text in this media."),
    ]
    .into_iter()
    .map(|(name, task)| (name.to_string(), format!("{} {}", task, SHAPE)))
    .collect()
}

/// Chunking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Byte-exact splitting at `chunk_size` boundaries
    Size,
    /// Paragraph-aligned accumulation
    Paragraph,
    /// Sentence-aligned accumulation
    Sentence,
}

impl ChunkStrategy {
    /// Parse a strategy name exactly.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "size" => Some(ChunkStrategy::Size),
            "paragraph" => Some(ChunkStrategy::Paragraph),
            "sentence" => Some(ChunkStrategy::Sentence),
            _ => None,
        }
    }

    /// Parse a strategy name, downgrading unknown names to `Size` with a warning.
    pub fn from_name(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            warn!(strategy = name, "Unknown chunking strategy, falling back to size");
            ChunkStrategy::Size
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStrategy::Size => "size",
            ChunkStrategy::Paragraph => "paragraph",
            ChunkStrategy::Sentence => "sentence",
        }
    }
}

/// Configuration for individual chunk operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum body bytes per chunk
    pub chunk_size: usize,

    /// Overlap carried into the next chunk
    pub chunk_overlap: usize,

    pub strategy: ChunkStrategy,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            strategy: ChunkStrategy::Paragraph,
        }
    }
}

impl ChunkConfig {
    /// Create a config with the given chunk size.
    pub fn with_size(size: usize) -> Self {
        Self {
            chunk_size: size,
            ..Default::default()
        }
    }

    /// Set the overlap.
    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.chunk_overlap = overlap;
        self
    }

    /// Set the strategy.
    pub fn with_strategy(mut self, strategy: ChunkStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// `chunk_size > 0` and `overlap < chunk_size`.
    pub fn validate(&self) -> Result<(), crate::error::ChunkError> {
        if self.chunk_size == 0 {
            return Err(crate::error::ChunkError::InvalidConfig(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(crate::error::ChunkError::InvalidConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Retry/backoff/timeout policy for one class of external call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Jitter, in percent of the computed delay
    pub jitter_pct: u32,
    /// Bound on each individual attempt
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter_pct: 20,
            timeout_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    /// Defaults for store writes: more attempts, shorter waits.
    pub fn storage() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
            jitter_pct: 25,
            timeout_ms: 30_000,
        }
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_attempts == 0 {
            return Err(PipelineError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.jitter_pct > 100 {
            return Err(PipelineError::Config(format!(
                "jitter_pct must be at most 100, got {}",
                self.jitter_pct
            )));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(PipelineError::Config(format!(
                "base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        if self.timeout_ms == 0 {
            return Err(PipelineError::Config("timeout_ms must be greater than 0".to_string()));
        }
        Ok(())
    }
}

/// Options passed to every extraction strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOptions {
    /// Allow AI-backed strategies
    pub allow_analysis: bool,

    /// Keep only entities of these types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_types: Option<Vec<EntityType>>,

    /// Characters of context on each side of a rule-based match
    pub context_window: usize,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            allow_analysis: true,
            entity_types: None,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

impl ExtractionOptions {
    /// Options that never call the analysis service.
    pub fn rules_only() -> Self {
        Self {
            allow_analysis: false,
            ..Default::default()
        }
    }

    pub fn wants(&self, entity_type: EntityType) -> bool {
        self.entity_types
            .as_ref()
            .map_or(true, |types| types.contains(&entity_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_chunk_config_validation() {
        assert!(ChunkConfig::with_size(0).with_overlap(0).validate().is_err());
        assert!(ChunkConfig::with_size(100).with_overlap(100).validate().is_err());
        assert!(ChunkConfig::with_size(100).with_overlap(99).validate().is_ok());
    }

    #[test]
    fn test_unknown_strategy_falls_back_to_size() {
        assert_eq!(ChunkStrategy::from_name("Sentence"), ChunkStrategy::Sentence);
        assert_eq!(ChunkStrategy::from_name("semantic"), ChunkStrategy::Size);
        assert_eq!(ChunkStrategy::parse("semantic"), None);
    }

    #[test]
    fn test_retry_policy_validation() {
        assert!(RetryPolicy::default().validate().is_ok());
        let policy = RetryPolicy {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
        let policy = RetryPolicy {
            jitter_pct: 150,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_load_defaults() {
        let config = PipelineConfig::load_with_env(None, Some(HashMap::new())).unwrap();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.extraction_retry, RetryPolicy::default());
        assert!(config.instruction_profiles.contains_key("code"));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "chunk_size = 1000\nchunk_overlap = 10\n[storage_retry]\nmax_attempts = 7").unwrap();

        let env = HashMap::from([
            ("INGEST_CHUNK_OVERLAP".to_string(), "25".to_string()),
            ("INGEST_EXTRACTION_RETRY__MAX_ATTEMPTS".to_string(), "4".to_string()),
        ]);
        let config = PipelineConfig::load_with_env(Some(file.path()), Some(env)).unwrap();

        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 25);
        assert_eq!(config.storage_retry.max_attempts, 7);
        assert_eq!(config.extraction_retry.max_attempts, 4);
    }

    #[test]
    fn test_invalid_file_config_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "chunk_size = 100\nchunk_overlap = 200").unwrap();
        let err = PipelineConfig::load_with_env(Some(file.path()), Some(HashMap::new())).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_entity_type_filter() {
        let options = ExtractionOptions {
            entity_types: Some(vec![EntityType::Date]),
            ..Default::default()
        };
        assert!(options.wants(EntityType::Date));
        assert!(!options.wants(EntityType::Person));
    }
}
