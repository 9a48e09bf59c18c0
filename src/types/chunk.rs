//! Chunk type definitions.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bounded, ordered slice of a content unit.
///
/// The first `overlap_prefix_len` bytes duplicate the tail of the previous
/// chunk; everything after that is the chunk body. Bodies of consecutive
/// chunks concatenate back to the original content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Order of this chunk within its content unit (0-indexed, contiguous)
    pub index: usize,

    /// Overlap prefix followed by the body
    #[serde(with = "super::content_bytes")]
    pub bytes: Vec<u8>,

    /// Number of leading bytes copied from the previous chunk
    pub overlap_prefix_len: usize,

    /// Byte offset of the first body byte in the original content
    pub start_offset: usize,
}

impl Chunk {
    pub fn new(index: usize, bytes: Vec<u8>, overlap_prefix_len: usize, start_offset: usize) -> Self {
        debug_assert!(overlap_prefix_len <= bytes.len());
        Self {
            index,
            bytes,
            overlap_prefix_len,
            start_offset,
        }
    }

    /// A chunk covering an entire content unit.
    pub fn whole(bytes: &[u8]) -> Self {
        Self::new(0, bytes.to_vec(), 0, 0)
    }

    /// The bytes this chunk contributes beyond its overlap prefix.
    pub fn body(&self) -> &[u8] {
        &self.bytes[self.overlap_prefix_len..]
    }

    pub fn body_len(&self) -> usize {
        self.bytes.len() - self.overlap_prefix_len
    }

    /// Byte offset (in the original content) of `bytes[0]`.
    pub fn window_offset(&self) -> usize {
        self.start_offset.saturating_sub(self.overlap_prefix_len)
    }

    /// Chunk content as text (lossy for non-UTF-8 bytes).
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// What the store keeps about each chunk of a persisted content unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub content_id: Uuid,
    pub index: usize,
    pub start_offset: usize,
    pub len: usize,
    pub overlap_prefix_len: usize,
    pub entity_count: usize,
    pub succeeded: bool,
}

impl ChunkRecord {
    pub fn from_chunk(content_id: Uuid, chunk: &Chunk, entity_count: usize, succeeded: bool) -> Self {
        Self {
            content_id,
            index: chunk.index,
            start_offset: chunk.start_offset,
            len: chunk.len(),
            overlap_prefix_len: chunk.overlap_prefix_len,
            entity_count,
            succeeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_excludes_overlap() {
        let chunk = Chunk::new(1, b"abcdef".to_vec(), 2, 10);
        assert_eq!(chunk.body(), b"cdef");
        assert_eq!(chunk.body_len(), 4);
        assert_eq!(chunk.window_offset(), 8);
    }

    #[test]
    fn test_whole_chunk() {
        let chunk = Chunk::whole(b"hello");
        assert_eq!(chunk.index, 0);
        assert_eq!(chunk.overlap_prefix_len, 0);
        assert_eq!(chunk.text(), "hello");
    }
}
