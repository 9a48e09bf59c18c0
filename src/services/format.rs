//! Format extraction: turning a raw document into the representation
//! entities are extracted from.

use serde_json::json;

/// Plain representation of a document plus whatever metadata the
/// extractor gathered.
#[derive(Debug, Clone, PartialEq)]
pub struct PlainRepresentation {
    pub bytes: Vec<u8>,
    pub metadata: serde_json::Value,
}

/// Converts a document (PDF, office file, media, ...) to a plain representation.
pub trait FormatExtractor: Send + Sync {
    fn extract_plain(&self, bytes: Vec<u8>, mime: &str) -> PlainRepresentation;
}

/// Extractor for content that is already in its plain form.
///
/// Bytes are passed through untouched; metadata records size, type and
/// whether the bytes decode as UTF-8.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughExtractor;

impl FormatExtractor for PassthroughExtractor {
    fn extract_plain(&self, bytes: Vec<u8>, mime: &str) -> PlainRepresentation {
        let text = std::str::from_utf8(&bytes).is_ok();
        let metadata = json!({
            "bytes": bytes.len(),
            "mime": mime,
            "text": text,
        });
        PlainRepresentation { bytes, metadata }
    }
}
