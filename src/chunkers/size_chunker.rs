//! Byte-exact chunker.

use super::base::Chunker;
use crate::error::ChunkError;
use crate::types::{Chunk, ChunkConfig};

/// Splits content at `chunk_size` byte boundaries with no regard for structure.
///
/// Works on any bytes, including binary content, which makes it the fallback
/// for every content type that is not text-like. Each chunk after the first
/// is prefixed with the last `chunk_overlap` bytes of the previous body.
pub struct SizeChunker;

impl SizeChunker {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SizeChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker for SizeChunker {
    fn name(&self) -> &'static str {
        "size"
    }

    fn description(&self) -> &'static str {
        "Splits content into fixed-size byte chunks with overlap"
    }

    fn chunk(&self, content: &[u8], config: &ChunkConfig) -> Result<Vec<Chunk>, ChunkError> {
        config.validate()?;
        if content.is_empty() {
            return Ok(vec![]);
        }

        let mut chunks = Vec::with_capacity(content.len() / config.chunk_size + 1);
        let mut start = 0;

        while start < content.len() {
            let end = (start + config.chunk_size).min(content.len());
            let prefix_len = if start == 0 { 0 } else { config.chunk_overlap.min(start) };
            let chunk = Chunk::new(
                chunks.len(),
                content[start - prefix_len..end].to_vec(),
                prefix_len,
                start,
            );
            chunks.push(chunk);
            start = end;
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_content() {
        let chunks = SizeChunker::new().chunk(b"", &ChunkConfig::with_size(10).with_overlap(2)).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_1050_bytes_500_50() {
        let content: Vec<u8> = (0..1050u32).map(|i| (i % 251) as u8).collect();
        let config = ChunkConfig::with_size(500).with_overlap(50);
        let chunks = SizeChunker::new().chunk(&content, &config).unwrap();

        assert_eq!(chunks.len(), 3);
        let bodies: Vec<usize> = chunks.iter().map(|c| c.body_len()).collect();
        assert_eq!(bodies, vec![500, 500, 50]);

        assert_eq!(chunks[0].overlap_prefix_len, 0);
        for i in 1..chunks.len() {
            let prev = &chunks[i - 1];
            let chunk = &chunks[i];
            assert_eq!(chunk.overlap_prefix_len, 50);
            assert_eq!(&chunk.bytes[..50], &prev.body()[prev.body_len() - 50..]);
        }
    }

    #[test]
    fn test_bodies_reassemble_content() {
        let content = b"The quick brown fox jumps over the lazy dog".repeat(7);
        let config = ChunkConfig::with_size(16).with_overlap(5);
        let chunks = SizeChunker::new().chunk(&content, &config).unwrap();

        let rebuilt: Vec<u8> = chunks.iter().flat_map(|c| c.body().to_vec()).collect();
        assert_eq!(rebuilt, content);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert!(chunk.body_len() <= 16);
        }
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        let config = ChunkConfig::with_size(10).with_overlap(10);
        assert!(matches!(
            SizeChunker::new().chunk(b"abc", &config),
            Err(ChunkError::InvalidConfig(_))
        ));
    }
}
