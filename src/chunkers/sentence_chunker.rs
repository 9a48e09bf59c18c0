//! Sentence-based chunker that respects sentence boundaries.

use super::base::{accumulate_units, as_text, Chunker};
use crate::error::ChunkError;
use crate::types::{Chunk, ChunkConfig};

/// Words that end in a period without ending the sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e", "inc", "corp",
    "ltd", "co", "no", "fig", "approx", "dept", "est", "mt",
];

/// Sentence-based chunker that splits text at sentence boundaries.
///
/// Sentences are grouped until the next one would overflow `chunk_size`.
/// The overlap carried into the next chunk is made of whole trailing
/// sentences whose combined length fits in `chunk_overlap`, so it may be
/// shorter than requested or empty.
pub struct SentenceChunker {
    /// Sentence-ending delimiters
    delimiters: &'static [char],
}

impl SentenceChunker {
    /// Create a new sentence chunker with default delimiters.
    pub const fn new() -> Self {
        Self {
            delimiters: &['.', '!', '?'],
        }
    }

    /// Create a sentence chunker with custom delimiters.
    pub const fn with_delimiters(delimiters: &'static [char]) -> Self {
        Self { delimiters }
    }

    /// Split text into sentences. Each sentence keeps its trailing
    /// whitespace so the pieces concatenate back to the input.
    pub fn split_sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut sentences = Vec::new();
        let mut start = 0;
        let mut chars = text.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            if !self.delimiters.contains(&c) {
                continue;
            }

            let after = i + c.len_utf8();
            let rest = &text[after..];
            match rest.chars().next() {
                Some(next) if !next.is_whitespace() => continue,
                _ => {}
            }

            let continuation = rest.trim_start();
            if c == '.' {
                if is_abbreviation(&text[start..i]) {
                    continue;
                }
                // "approx. three" style continuations
                if continuation.chars().next().is_some_and(|n| n.is_lowercase()) {
                    continue;
                }
            }

            let end = after + (rest.len() - continuation.len());
            sentences.push(&text[start..end]);
            start = end;

            while chars.peek().is_some_and(|&(j, _)| j < end) {
                chars.next();
            }
        }

        if start < text.len() {
            sentences.push(&text[start..]);
        }

        sentences
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the word right before a period is an abbreviation or an initial.
fn is_abbreviation(preceding: &str) -> bool {
    let word = preceding
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("")
        .trim_start_matches(|c: char| !c.is_alphanumeric());

    let mut letters = word.chars();
    if let (Some(first), None) = (letters.next(), letters.next()) {
        if first.is_uppercase() {
            return true;
        }
    }

    ABBREVIATIONS.contains(&word.to_lowercase().as_str())
}

/// Whole trailing sentences whose combined length fits in `overlap`.
fn sentence_overlap(emitted: &[&str], overlap: usize) -> String {
    let mut taken = 0;
    let mut first = emitted.len();
    for (k, sentence) in emitted.iter().enumerate().rev() {
        if taken + sentence.len() > overlap {
            break;
        }
        taken += sentence.len();
        first = k;
    }
    emitted[first..].concat()
}

impl Chunker for SentenceChunker {
    fn name(&self) -> &'static str {
        "sentence"
    }

    fn description(&self) -> &'static str {
        "Splits text at sentence boundaries with whole-sentence overlap"
    }

    fn chunk(&self, content: &[u8], config: &ChunkConfig) -> Result<Vec<Chunk>, ChunkError> {
        config.validate()?;
        let text = as_text(content)?;
        if text.is_empty() {
            return Ok(vec![]);
        }

        let sentences = self.split_sentences(text);
        let overlap = config.chunk_overlap;

        Ok(accumulate_units(&sentences, config.chunk_size, |emitted| {
            sentence_overlap(emitted, overlap)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sentence_splitting() {
        let chunker = SentenceChunker::new();
        let content = "This is the first sentence. This is the second sentence! Is this the third?";
        let sentences = chunker.split_sentences(content);
        assert_eq!(
            sentences,
            vec![
                "This is the first sentence. ",
                "This is the second sentence! ",
                "Is this the third?"
            ]
        );
    }

    #[test]
    fn test_abbreviations_do_not_split() {
        let chunker = SentenceChunker::new();
        let content = "Dr. Smith met Mr. Jones at St. Mary's. They spoke about e.g. budgets. J. R. Tolkien wrote books.";
        let sentences = chunker.split_sentences(content);
        assert_eq!(
            sentences,
            vec![
                "Dr. Smith met Mr. Jones at St. Mary's. ",
                "They spoke about e.g. budgets. ",
                "J. R. Tolkien wrote books."
            ]
        );
    }

    #[test]
    fn test_decimal_and_lowercase_continuation() {
        let chunker = SentenceChunker::new();
        let sentences = chunker.split_sentences("Version 2.5 shipped. It costs approx. ten dollars.");
        assert_eq!(sentences, vec!["Version 2.5 shipped. ", "It costs approx. ten dollars."]);
    }

    #[test]
    fn test_large_chunk_holds_all_sentences() {
        let content = "This is the first sentence. This is the second sentence! Is this the third?";
        let chunks = SentenceChunker::new()
            .chunk(content.as_bytes(), &ChunkConfig::with_size(1000).with_overlap(20))
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text(), content);
    }

    #[test]
    fn test_multiple_chunks_with_sentence_overlap() {
        let content = "Sentence one. ".repeat(20) + &"Sentence two. ".repeat(20);
        let config = ChunkConfig::with_size(50).with_overlap(20);
        let chunks = SentenceChunker::new().chunk(content.as_bytes(), &config).unwrap();

        assert!(chunks.len() > 1);
        for window in chunks.windows(2) {
            let prev_body = String::from_utf8(window[0].body().to_vec()).unwrap();
            let prefix = String::from_utf8(window[1].bytes[..window[1].overlap_prefix_len].to_vec()).unwrap();
            // The 14-byte "Sentence one. " fits in 20 bytes; two of them do not
            assert_eq!(prefix.len(), 14);
            assert!(prev_body.ends_with(&prefix));
        }
        let rebuilt: String = chunks
            .iter()
            .map(|c| String::from_utf8(c.body().to_vec()).unwrap())
            .collect();
        assert_eq!(rebuilt, content);
    }

    #[test]
    fn test_overlap_smaller_than_any_sentence_is_empty() {
        let content = "A long first sentence here. Another long sentence follows.";
        let config = ChunkConfig::with_size(30).with_overlap(5);
        let chunks = SentenceChunker::new().chunk(content.as_bytes(), &config).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].overlap_prefix_len, 0);
    }
}
