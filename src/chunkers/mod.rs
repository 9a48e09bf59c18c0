//! Chunking strategies for different content types.
//!
//! - `size`: fixed byte windows, works on any content
//! - `paragraph`: blank-line boundaries, text only
//! - `sentence`: sentence boundaries, text only

mod base;
mod paragraph_chunker;
mod sentence_chunker;
mod size_chunker;

pub use base::{accumulate_units, as_text, char_tail, Chunker};
pub use paragraph_chunker::ParagraphChunker;
pub use sentence_chunker::SentenceChunker;
pub use size_chunker::SizeChunker;

use tracing::{debug, warn};

use crate::error::ChunkError;
use crate::types::{Chunk, ChunkConfig, ChunkStrategy, ContentFamily, ContentUnit};

static SIZE: SizeChunker = SizeChunker;
static PARAGRAPH: ParagraphChunker = ParagraphChunker;
static SENTENCE: SentenceChunker = SentenceChunker::new();

/// Get the chunker for a strategy.
pub fn chunker_for(strategy: ChunkStrategy) -> &'static dyn Chunker {
    match strategy {
        ChunkStrategy::Size => &SIZE,
        ChunkStrategy::Paragraph => &PARAGRAPH,
        ChunkStrategy::Sentence => &SENTENCE,
    }
}

/// List all available chunkers as `(name, description)`.
pub fn list_chunkers() -> Vec<(&'static str, &'static str)> {
    [ChunkStrategy::Size, ChunkStrategy::Paragraph, ChunkStrategy::Sentence]
        .into_iter()
        .map(|s| {
            let chunker = chunker_for(s);
            (chunker.name(), chunker.description())
        })
        .collect()
}

/// Chunk a content unit, resolving the strategy by name.
///
/// Unknown strategy names fall back to `size`.
pub fn chunk(
    content: &ContentUnit,
    chunk_size: usize,
    overlap: usize,
    strategy: &str,
) -> Result<Vec<Chunk>, ChunkError> {
    let config = ChunkConfig {
        chunk_size,
        chunk_overlap: overlap,
        strategy: ChunkStrategy::from_name(strategy),
    };
    chunk_with(content, &config)
}

/// Chunk a content unit with a typed configuration.
///
/// Content whose family is not text-like is always chunked by size; the
/// text strategies only apply to text, code and structured content.
pub fn chunk_with(content: &ContentUnit, config: &ChunkConfig) -> Result<Vec<Chunk>, ChunkError> {
    config.validate()?;

    let family = match content.content_type.as_deref() {
        Some(content_type) => ContentFamily::of(content_type),
        None if std::str::from_utf8(&content.bytes).is_ok() => ContentFamily::Text,
        None => ContentFamily::Binary,
    };

    let strategy = if family.is_text_like() {
        config.strategy
    } else {
        if config.strategy != ChunkStrategy::Size {
            debug!(
                content_id = %content.id,
                family = %family,
                requested = config.strategy.as_str(),
                "Non-text content, chunking by size"
            );
        }
        ChunkStrategy::Size
    };

    let chunker = chunker_for(strategy);
    let chunks = chunker.chunk(&content.bytes, config).map_err(|e| {
        warn!(content_id = %content.id, chunker = chunker.name(), error = %e, "Chunking failed");
        e
    })?;

    debug!(
        content_id = %content.id,
        chunker = chunker.name(),
        bytes = content.len(),
        chunks = chunks.len(),
        "Chunked content"
    );

    Ok(chunks)
}
