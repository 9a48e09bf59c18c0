//! Content type detection by file name, extension and content sniffing.

use std::collections::HashMap;
use std::path::Path;

/// Determines the MIME type of a content unit.
pub trait ContentTypeDetector: Send + Sync {
    /// `source` is a path or URI; only its file name is consulted.
    fn detect(&self, source: &str, bytes: &[u8]) -> String;
}

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Detector using extension and filename maps, then a content sniff.
pub struct ExtensionDetector {
    extension_map: HashMap<&'static str, &'static str>,
    filename_map: HashMap<&'static str, &'static str>,
}

impl Default for ExtensionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionDetector {
    pub fn new() -> Self {
        let mut extension_map = HashMap::new();

        // Text
        for ext in ["txt", "text", "log", "rst"] {
            extension_map.insert(ext, "text/plain");
        }
        extension_map.insert("md", "text/markdown");
        extension_map.insert("markdown", "text/markdown");
        extension_map.insert("html", "text/html");
        extension_map.insert("htm", "text/html");
        extension_map.insert("csv", "text/csv");
        extension_map.insert("pdf", "application/pdf");
        extension_map.insert("rtf", "application/rtf");
        extension_map.insert("doc", "application/msword");
        extension_map.insert(
            "docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        );
        extension_map.insert("odt", "application/vnd.oasis.opendocument.text");

        // Structured
        extension_map.insert("json", "application/json");
        extension_map.insert("jsonld", "application/ld+json");
        extension_map.insert("xml", "application/xml");
        extension_map.insert("svg", "image/svg+xml");

        // Code
        for ext in ["py", "pyi", "pyw"] {
            extension_map.insert(ext, "text/x-python");
        }
        for ext in ["js", "mjs", "cjs", "jsx"] {
            extension_map.insert(ext, "application/javascript");
        }
        for ext in ["ts", "tsx"] {
            extension_map.insert(ext, "application/typescript");
        }
        extension_map.insert("rs", "text/x-rust");
        extension_map.insert("go", "text/x-go");
        extension_map.insert("java", "text/x-java");
        extension_map.insert("c", "text/x-c");
        extension_map.insert("h", "text/x-c");
        for ext in ["cpp", "cc", "cxx", "hpp"] {
            extension_map.insert(ext, "text/x-c++src");
        }
        extension_map.insert("rb", "text/x-ruby");
        extension_map.insert("php", "text/x-php");
        for ext in ["sh", "bash", "zsh"] {
            extension_map.insert(ext, "text/x-shellscript");
        }

        // Media
        extension_map.insert("png", "image/png");
        extension_map.insert("jpg", "image/jpeg");
        extension_map.insert("jpeg", "image/jpeg");
        extension_map.insert("gif", "image/gif");
        extension_map.insert("webp", "image/webp");
        extension_map.insert("mp4", "video/mp4");
        extension_map.insert("webm", "video/webm");
        extension_map.insert("mp3", "audio/mpeg");
        extension_map.insert("wav", "audio/wav");

        let mut filename_map = HashMap::new();
        filename_map.insert("Dockerfile", "text/x-shellscript");
        filename_map.insert("Makefile", "text/x-shellscript");
        filename_map.insert("Rakefile", "text/x-ruby");
        filename_map.insert("Gemfile", "text/x-ruby");

        Self {
            extension_map,
            filename_map,
        }
    }

    /// Guess a MIME type from the first bytes of the content.
    pub fn sniff(bytes: &[u8]) -> &'static str {
        if bytes.starts_with(b"%PDF") {
            return "application/pdf";
        }
        if bytes.starts_with(b"\x89PNG") {
            return "image/png";
        }
        if bytes.starts_with(b"\xff\xd8\xff") {
            return "image/jpeg";
        }
        let Ok(text) = std::str::from_utf8(bytes) else {
            return OCTET_STREAM;
        };

        let trimmed = text.trim_start_matches('\u{feff}').trim_start();
        if trimmed.starts_with("#!") {
            let first_line = trimmed.lines().next().unwrap_or("");
            return Self::shebang_type(first_line);
        }
        if trimmed.starts_with("<?xml") {
            return "application/xml";
        }
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            return "application/json";
        }
        "text/plain"
    }

    fn shebang_type(shebang: &str) -> &'static str {
        let lower = shebang.to_lowercase();

        if lower.contains("python") {
            "text/x-python"
        } else if lower.contains("node") || lower.contains("deno") {
            "application/javascript"
        } else if lower.contains("ruby") {
            "text/x-ruby"
        } else if lower.contains("php") {
            "text/x-php"
        } else {
            "text/x-shellscript"
        }
    }
}

impl ContentTypeDetector for ExtensionDetector {
    fn detect(&self, source: &str, bytes: &[u8]) -> String {
        let path = Path::new(source);
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

        if let Some(mime) = self.filename_map.get(filename) {
            return mime.to_string();
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if let Some(mime) = self.extension_map.get(extension.as_str()) {
            return mime.to_string();
        }

        Self::sniff(bytes).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_detection() {
        let detector = ExtensionDetector::new();
        assert_eq!(detector.detect("notes/readme.md", b""), "text/markdown");
        assert_eq!(detector.detect("main.PY", b""), "text/x-python");
        assert_eq!(detector.detect("/data/report.pdf", b""), "application/pdf");
        assert_eq!(detector.detect("Dockerfile", b""), "text/x-shellscript");
    }

    #[test]
    fn test_sniff_fallback() {
        let detector = ExtensionDetector::new();
        assert_eq!(detector.detect("blob", b"%PDF-1.7"), "application/pdf");
        assert_eq!(detector.detect("blob", b"  {\"a\": 1}"), "application/json");
        assert_eq!(detector.detect("blob", b"<?xml version=\"1.0\"?><a/>"), "application/xml");
        assert_eq!(detector.detect("blob", b"#!/usr/bin/env python3\nprint(1)"), "text/x-python");
        assert_eq!(detector.detect("blob", b"#!/bin/sh\necho hi"), "text/x-shellscript");
        assert_eq!(detector.detect("blob", b"plain words"), "text/plain");
        assert_eq!(detector.detect("blob", &[0u8, 0xff, 0xfe]), OCTET_STREAM);
    }
}
