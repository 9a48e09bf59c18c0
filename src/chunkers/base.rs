//! Base trait and shared helpers for all chunkers.

use crate::error::ChunkError;
use crate::types::{Chunk, ChunkConfig};

/// The core trait that all chunkers must implement.
///
/// A chunker splits content into an ordered, contiguous sequence of
/// overlapping chunks. Chunkers are pure: no I/O, no shared state.
pub trait Chunker: Send + Sync {
    /// Get the name of this chunker.
    fn name(&self) -> &'static str;

    /// Chunk the given content with the provided configuration.
    ///
    /// Either the whole content is chunked or an error is returned; there
    /// is no partial output.
    fn chunk(&self, content: &[u8], config: &ChunkConfig) -> Result<Vec<Chunk>, ChunkError>;

    /// Get the description of this chunker.
    fn description(&self) -> &'static str {
        "A content chunker"
    }
}

/// Decode content for text-aware chunkers.
pub fn as_text(content: &[u8]) -> Result<&str, ChunkError> {
    std::str::from_utf8(content).map_err(|e| ChunkError::NotText(e.to_string()))
}

/// Longest suffix of `text` that is at most `max_bytes` long and starts on a char boundary.
pub fn char_tail(text: &str, max_bytes: usize) -> &str {
    if max_bytes >= text.len() {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Group atomic units (paragraphs, sentences) into chunks.
///
/// Units are never split. A chunk is emitted before the next unit would push
/// its body past `chunk_size`; a unit that alone exceeds `chunk_size` becomes
/// its own oversized chunk. `overlap_for` receives the units of the chunk just
/// emitted and returns the prefix for the next one.
pub fn accumulate_units<'a, F>(units: &[&'a str], chunk_size: usize, mut overlap_for: F) -> Vec<Chunk>
where
    F: FnMut(&[&'a str]) -> String,
{
    let mut chunks = Vec::new();
    let mut current: Vec<&'a str> = Vec::new();
    let mut current_len = 0;
    let mut prefix = String::new();
    let mut body_offset = 0;

    for &unit in units {
        if !current.is_empty() && current_len + unit.len() > chunk_size {
            chunks.push(text_chunk(chunks.len(), &prefix, &current, body_offset));
            prefix = overlap_for(&current);
            body_offset += current_len;
            current.clear();
            current_len = 0;
        }
        current.push(unit);
        current_len += unit.len();
    }

    if !current.is_empty() {
        chunks.push(text_chunk(chunks.len(), &prefix, &current, body_offset));
    }

    chunks
}

fn text_chunk(index: usize, prefix: &str, units: &[&str], body_offset: usize) -> Chunk {
    let mut bytes = Vec::with_capacity(prefix.len() + units.iter().map(|u| u.len()).sum::<usize>());
    bytes.extend_from_slice(prefix.as_bytes());
    for unit in units {
        bytes.extend_from_slice(unit.as_bytes());
    }
    Chunk::new(index, bytes, prefix.len(), body_offset)
}
