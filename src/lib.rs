//! Entity Ingest Library
//!
//! Splits content into chunks, extracts named entities from each chunk
//! through an ordered chain of strategies, merges the results into one
//! deduplicated entity set and persists it.

pub mod api;
pub mod chunkers;
pub mod error;
pub mod extraction;
pub mod jobs;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod resilience;
pub mod services;
pub mod types;

pub use error::{ErrorKind, ExternalError, InvokeError, PipelineError};
pub use extraction::{ExtractionChain, ExtractionStrategy, StrategyTable};
pub use merge::{merge, EntityMerger};
pub use pipeline::{PipelineCoordinator, RunReport, RunState};
pub use resilience::ResilientInvoker;
pub use types::{Chunk, ContentUnit, Entity, EntityType, Mention, PipelineConfig};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::chunkers::{chunk, chunk_with, Chunker};
    pub use crate::error::*;
    pub use crate::extraction::*;
    pub use crate::merge::*;
    pub use crate::pipeline::*;
    pub use crate::services::*;
    pub use crate::types::*;
}

/// Default chunk body size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 4000;

/// Default chunk overlap in bytes
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Characters of context kept on each side of a mention
pub const DEFAULT_CONTEXT_WINDOW: usize = 30;

/// Chunks extracted concurrently within one run
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Content at or below this many bytes is extracted as a single unit
pub const DEFAULT_SINGLE_UNIT_THRESHOLD: usize = 4000;
