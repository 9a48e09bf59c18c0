//! Core types for the ingestion pipeline.

mod chunk;
mod config;
mod content;
mod entity;
mod job;

pub use chunk::{Chunk, ChunkRecord};
pub use config::{
    ChunkConfig, ChunkStrategy, ExtractionOptions, PipelineConfig, RetryPolicy, ENV_PREFIX,
};
pub use content::{code_language, essence, ContentFamily, ContentUnit, CODE_MIME_TYPES};
pub use entity::{
    Entity, EntityKey, EntityType, ExtractionResult, Mention, StrategyFailure,
};
pub use job::{IngestJobStatus, IngestJobStatusResponse, IngestRequest, StartIngestJobResponse};

/// Serde helper: bytes travel as (lossy) UTF-8 strings at the JSON boundary.
pub(crate) mod content_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(String::deserialize(deserializer)?.into_bytes())
    }
}
