//! Entity extraction.
//!
//! Each content type resolves, through a [`StrategyTable`], to an ordered
//! list of [`ExtractionStrategy`] implementations. The [`ExtractionChain`]
//! tries them in order until one yields entities:
//!
//! - `ai:<profile>`: the analysis service, behind retries and a circuit breaker
//! - `text-rules`, `structured-rules`, `code-rules`: per-family heuristics

mod ai;
mod chain;
mod code;
mod strategy;
mod structured;
mod table;
mod text;
mod validate;

pub use ai::AiStrategy;
pub use chain::ExtractionChain;
pub use code::{detect_language, extract_symbols, CodeRules, Symbol, SymbolKind};
pub use strategy::{ExtractionStrategy, StrategyOutput};
pub use structured::StructuredRules;
pub use table::{StrategyTable, StrategyTableBuilder, TableEntry};
pub use text::TextRules;
pub use validate::entities_from_response;

use std::borrow::Cow;

use unicode_segmentation::UnicodeSegmentation;

use crate::normalize::collapse_whitespace;
use crate::types::{Chunk, ContentUnit};

/// What a strategy extracts from: one chunk or a whole content unit.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionUnit<'a> {
    /// Chunk index, `None` for an unchunked content unit
    pub index: Option<usize>,
    pub bytes: &'a [u8],
    /// Leading bytes repeated from the previous chunk
    pub overlap_prefix_len: usize,
    /// Offset of `bytes[0]` in the original content
    pub window_offset: usize,
    pub content_type: &'a str,
}

impl<'a> ExtractionUnit<'a> {
    pub fn from_chunk(chunk: &'a Chunk, content_type: &'a str) -> Self {
        Self {
            index: Some(chunk.index),
            bytes: &chunk.bytes,
            overlap_prefix_len: chunk.overlap_prefix_len,
            window_offset: chunk.window_offset(),
            content_type,
        }
    }

    pub fn whole(content: &'a ContentUnit, content_type: &'a str) -> Self {
        Self {
            index: None,
            bytes: &content.bytes,
            overlap_prefix_len: 0,
            window_offset: 0,
            content_type,
        }
    }

    /// Plain text from raw bytes, with no chunk metadata.
    pub fn text_only(bytes: &'a [u8], content_type: &'a str) -> Self {
        Self {
            index: None,
            bytes,
            overlap_prefix_len: 0,
            window_offset: 0,
            content_type,
        }
    }

    /// Decoded text. A character cut by either window edge is dropped, so
    /// byte offsets into the text stay aligned with the content.
    pub fn text(&self) -> Cow<'a, str> {
        let bytes = &self.bytes[self.lead_skip()..];
        let end = match std::str::from_utf8(bytes) {
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            _ => bytes.len(),
        };
        String::from_utf8_lossy(&bytes[..end])
    }

    /// Continuation bytes at the start of the window, left over from a
    /// character that began in the previous chunk.
    fn lead_skip(&self) -> usize {
        self.bytes
            .iter()
            .take(3)
            .take_while(|b| **b & 0xC0 == 0x80)
            .count()
    }

    /// Absolute position of a byte offset into [`text`](Self::text).
    pub fn absolute(&self, offset: usize) -> i64 {
        (self.window_offset + self.lead_skip() + offset) as i64
    }

    /// A match ending inside the overlap prefix was already seen by the previous chunk.
    pub fn in_overlap(&self, end: usize) -> bool {
        self.lead_skip() + end <= self.overlap_prefix_len
    }
}

/// Text around `text[start..end]`: up to `window` graphemes on each side,
/// whitespace collapsed.
pub fn context_window(text: &str, start: usize, end: usize, window: usize) -> String {
    let before: usize = text[..start]
        .graphemes(true)
        .rev()
        .take(window)
        .map(str::len)
        .sum();
    let after: usize = text[end..].graphemes(true).take(window).map(str::len).sum();
    collapse_whitespace(&text[start - before..end + after])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_context_window() {
        let text = "John Smith works at Acme Corp in Paris.";
        let start = text.find("Acme").unwrap();
        let end = start + "Acme Corp".len();
        assert_eq!(context_window(text, start, end, 6), "ks at Acme Corp in Pa");
        assert_eq!(context_window(text, 0, 4, 100), text);
    }

    #[test]
    fn test_context_window_multibyte() {
        let text = "Café in Zürich, naïve.";
        let start = text.find("Zürich").unwrap();
        let end = start + "Zürich".len();
        assert_eq!(context_window(text, start, end, 2), "n Zürich,");
    }

    #[test]
    fn test_unit_offsets() {
        let chunk = Chunk::new(2, b"tail-body".to_vec(), 5, 100);
        let unit = ExtractionUnit::from_chunk(&chunk, "text/plain");
        assert_eq!(unit.window_offset, 95);
        assert_eq!(unit.absolute(5), 100);
        assert!(unit.in_overlap(5));
        assert!(!unit.in_overlap(6));
    }

    #[test]
    fn test_split_characters_dropped_at_window_edges() {
        // "aaaaaaaaaé in Paris now" cut at byte 10 splits the 'é'
        let content = "aaaaaaaaaé in Paris now".as_bytes();
        let head = ExtractionUnit::text_only(&content[..10], "text/plain");
        assert_eq!(head.text(), "aaaaaaaaa");

        let chunk = Chunk::new(1, content[10..].to_vec(), 0, 10);
        let tail = ExtractionUnit::from_chunk(&chunk, "text/plain");
        let text = tail.text();
        assert_eq!(text, " in Paris now");
        let paris = text.find("Paris").unwrap();
        assert_eq!(tail.absolute(paris), "aaaaaaaaaé in ".len() as i64);
    }

    #[test]
    fn test_overlap_measured_from_window_start() {
        // overlap prefix "\xa9 a" repeats the last bytes of the previous chunk
        let chunk = Chunk::new(1, "é abc".as_bytes()[1..].to_vec(), 3, 10);
        let unit = ExtractionUnit::from_chunk(&chunk, "text/plain");
        assert_eq!(unit.text(), " abc");
        assert!(unit.in_overlap(2));
        assert!(!unit.in_overlap(3));
    }
}
