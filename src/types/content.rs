//! Content unit and content-family classification.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of content handed to the pipeline for one ingestion run.
///
/// Immutable once created; the coordinator owns it for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentUnit {
    /// Unique identifier for this content
    pub id: Uuid,

    /// Where the content came from (path, URL, upload name)
    pub source: String,

    /// MIME-like content type, if declared by the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Raw (or format-extracted) bytes
    #[serde(with = "super::content_bytes")]
    pub bytes: Vec<u8>,

    /// Metadata produced by the format extractor
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ContentUnit {
    /// Create a content unit from raw bytes.
    pub fn new(source: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            content_type: None,
            bytes,
            metadata: serde_json::Value::Null,
        }
    }

    /// Create a content unit from text.
    pub fn from_text(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(source, text.into().into_bytes())
    }

    /// Declare the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Attach format-extractor metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Broad family a content type belongs to.
///
/// Families decide which chunking strategies apply and which extraction
/// strategies are registered by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFamily {
    Text,
    Structured,
    Code,
    Media,
    Binary,
}

/// MIME types for source code, mapped to the language they carry.
pub const CODE_MIME_TYPES: &[(&str, &str)] = &[
    ("text/x-python", "python"),
    ("text/x-script.python", "python"),
    ("text/x-rust", "rust"),
    ("text/rust", "rust"),
    ("application/javascript", "javascript"),
    ("text/javascript", "javascript"),
    ("application/typescript", "typescript"),
    ("text/typescript", "typescript"),
    ("text/x-go", "go"),
    ("text/x-java", "java"),
    ("text/x-java-source", "java"),
    ("text/x-c", "c"),
    ("text/x-csrc", "c"),
    ("text/x-c++src", "cpp"),
    ("text/x-ruby", "ruby"),
    ("text/x-php", "php"),
    ("text/x-shellscript", "shell"),
    ("application/x-sh", "shell"),
];

impl ContentFamily {
    /// Classify a MIME-like content type.
    pub fn of(content_type: &str) -> Self {
        let ct = essence(content_type);

        if ct.starts_with("text/code:") || code_language(&ct).is_some() {
            return ContentFamily::Code;
        }

        if ct == "application/json"
            || ct == "application/xml"
            || ct == "text/xml"
            || ct.ends_with("+json")
            || ct.ends_with("+xml")
        {
            return ContentFamily::Structured;
        }

        if ct.starts_with("text/")
            || ct == "application/pdf"
            || ct == "application/rtf"
            || ct == "application/msword"
            || ct.starts_with("application/vnd.openxmlformats-officedocument")
            || ct.starts_with("application/vnd.oasis.opendocument")
        {
            return ContentFamily::Text;
        }

        if ct.starts_with("image/") || ct.starts_with("video/") || ct.starts_with("audio/") {
            return ContentFamily::Media;
        }

        ContentFamily::Binary
    }

    /// Whether paragraph/sentence chunking makes sense for this family.
    pub fn is_text_like(&self) -> bool {
        matches!(
            self,
            ContentFamily::Text | ContentFamily::Structured | ContentFamily::Code
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFamily::Text => "text",
            ContentFamily::Structured => "structured",
            ContentFamily::Code => "code",
            ContentFamily::Media => "media",
            ContentFamily::Binary => "binary",
        }
    }
}

impl std::fmt::Display for ContentFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased MIME type without parameters (`text/plain; charset=utf-8` → `text/plain`).
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

/// Language carried by a code MIME type, if any.
pub fn code_language(content_type: &str) -> Option<String> {
    let ct = essence(content_type);
    if let Some(lang) = ct.strip_prefix("text/code:") {
        return Some(lang.to_string());
    }
    CODE_MIME_TYPES
        .iter()
        .find(|(mime, _)| *mime == ct)
        .map(|(_, lang)| lang.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_classification() {
        assert_eq!(ContentFamily::of("text/plain"), ContentFamily::Text);
        assert_eq!(ContentFamily::of("text/markdown; charset=utf-8"), ContentFamily::Text);
        assert_eq!(ContentFamily::of("application/pdf"), ContentFamily::Text);
        assert_eq!(ContentFamily::of("application/json"), ContentFamily::Structured);
        assert_eq!(ContentFamily::of("application/ld+json"), ContentFamily::Structured);
        assert_eq!(ContentFamily::of("text/xml"), ContentFamily::Structured);
        assert_eq!(ContentFamily::of("text/x-python"), ContentFamily::Code);
        assert_eq!(ContentFamily::of("text/code:rust"), ContentFamily::Code);
        assert_eq!(ContentFamily::of("image/png"), ContentFamily::Media);
        assert_eq!(ContentFamily::of("application/octet-stream"), ContentFamily::Binary);
    }

    #[test]
    fn test_code_language() {
        assert_eq!(code_language("text/x-python"), Some("python".to_string()));
        assert_eq!(code_language("text/code:go"), Some("go".to_string()));
        assert_eq!(code_language("text/plain"), None);
    }
}
