//! Paragraph-aligned chunker.

use super::base::{accumulate_units, as_text, char_tail, Chunker};
use crate::error::ChunkError;
use crate::types::{Chunk, ChunkConfig};

/// Groups paragraphs (separated by blank lines) into chunks.
///
/// A chunk boundary only ever falls between paragraphs, and a chunk is
/// emitted before the next paragraph would push its body past `chunk_size`
/// rather than after crossing it, so bodies stay bounded. A paragraph larger
/// than `chunk_size` is emitted as its own oversized chunk. The next chunk is
/// seeded with the trailing `chunk_overlap` characters of the emitted body.
pub struct ParagraphChunker;

impl ParagraphChunker {
    pub fn new() -> Self {
        Self
    }

    /// Split text into paragraphs; each keeps its trailing blank lines so the
    /// pieces concatenate back to the input.
    pub fn split_paragraphs(text: &str) -> Vec<&str> {
        let mut paragraphs = Vec::new();
        let mut start = 0;
        let mut pos = 0;
        let mut has_content = false;
        let mut after_blank = false;

        for line in text.split_inclusive('\n') {
            let blank = line.trim().is_empty();
            if !blank && after_blank {
                paragraphs.push(&text[start..pos]);
                start = pos;
                after_blank = false;
            }
            if blank {
                after_blank = has_content;
            } else {
                has_content = true;
            }
            pos += line.len();
        }

        if start < text.len() {
            paragraphs.push(&text[start..]);
        }

        paragraphs
    }
}

impl Default for ParagraphChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker for ParagraphChunker {
    fn name(&self) -> &'static str {
        "paragraph"
    }

    fn description(&self) -> &'static str {
        "Splits text at blank-line paragraph boundaries with a character overlap"
    }

    fn chunk(&self, content: &[u8], config: &ChunkConfig) -> Result<Vec<Chunk>, ChunkError> {
        config.validate()?;
        let text = as_text(content)?;
        if text.is_empty() {
            return Ok(vec![]);
        }

        let paragraphs = Self::split_paragraphs(text);
        let overlap = config.chunk_overlap;

        Ok(accumulate_units(&paragraphs, config.chunk_size, |emitted| {
            let body: String = emitted.concat();
            char_tail(&body, overlap).to_string()
        }))
    }
}
