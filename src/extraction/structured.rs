//! Rule-based fallback for structured data (JSON, XML).
//!
//! Top-level keys and top-level element names become `other` entities at
//! low relevance. Structure says little about meaning, so this is a weak
//! signal kept only for when nothing better is available.

use async_trait::async_trait;
use lazy_static::lazy_static;
use quick_xml::events::Event;
use regex::Regex;
use tracing::debug;

use super::{context_window, ExtractionStrategy, ExtractionUnit, StrategyOutput};
use crate::error::ExtractionError;
use crate::types::{essence, Entity, EntityType, ExtractionOptions, Mention};

const KEY_RELEVANCE: f32 = 0.5;

lazy_static! {
    /// `"key":` at shallow indentation, for JSON fragments that do not parse.
    static ref SHALLOW_KEY: Regex = Regex::new(r#"(?m)^[ \t]{0,4}"([^"\\\n]{1,128})"[ \t]*:"#).unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    Json,
    Xml,
}

fn syntax_of(content_type: &str, text: &str) -> Syntax {
    let ct = essence(content_type);
    if ct.ends_with("xml") {
        return Syntax::Xml;
    }
    if ct.ends_with("json") {
        return Syntax::Json;
    }
    if text.trim_start().starts_with('<') {
        Syntax::Xml
    } else {
        Syntax::Json
    }
}

/// Rule-based fallback for the structured family.
#[derive(Debug, Default, Clone)]
pub struct StructuredRules;

impl StructuredRules {
    pub fn new() -> Self {
        Self
    }

    /// Top-level keys with the byte offset of their first occurrence.
    fn json_keys(text: &str) -> Vec<(String, usize, usize)> {
        let keys: Vec<String> = match serde_json::from_str::<serde_json::Value>(text) {
            Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
            Ok(serde_json::Value::Array(items)) => {
                let mut keys: Vec<String> = Vec::new();
                for item in items {
                    if let serde_json::Value::Object(map) = item {
                        for key in map.keys() {
                            if !keys.contains(key) {
                                keys.push(key.clone());
                            }
                        }
                    }
                }
                keys
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                debug!(error = %e, "Structured content does not parse, scanning for keys");
                return Self::lenient_json_keys(text);
            }
        };

        keys.into_iter()
            .filter_map(|key| {
                let quoted = format!("\"{}\"", key);
                text.find(&quoted)
                    .map(|start| (key, start + 1, start + quoted.len() - 1))
            })
            .collect()
    }

    fn lenient_json_keys(text: &str) -> Vec<(String, usize, usize)> {
        let mut seen: Vec<String> = Vec::new();
        let mut keys = Vec::new();
        for caps in SHALLOW_KEY.captures_iter(text) {
            let Some(key) = caps.get(1) else { continue };
            if seen.iter().any(|k| k == key.as_str()) {
                continue;
            }
            seen.push(key.as_str().to_string());
            keys.push((key.as_str().to_string(), key.start(), key.end()));
        }
        keys
    }

    /// Children of the root element, or the root itself when it has none.
    fn xml_tags(text: &str) -> Vec<(String, usize, usize)> {
        let mut reader = quick_xml::Reader::from_reader(text.as_bytes());
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut root: Option<String> = None;
        let mut names: Vec<String> = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if depth == 0 {
                        root.get_or_insert(name);
                    } else if depth == 1 && !names.contains(&name) {
                        names.push(name);
                    }
                    depth += 1;
                }
                Ok(Event::Empty(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if depth == 0 {
                        root.get_or_insert(name);
                    } else if depth == 1 && !names.contains(&name) {
                        names.push(name);
                    }
                }
                Ok(Event::End(_)) => depth = depth.saturating_sub(1),
                Ok(Event::Eof) => break,
                Err(e) => {
                    // Fragments (mid-document chunks) stop parsing early; keep what was read
                    debug!(error = %e, "XML parse stopped");
                    break;
                }
                _ => {}
            }
            buf.clear();
        }

        if names.is_empty() {
            names.extend(root);
        }

        let mut cursor = 0;
        names
            .into_iter()
            .filter_map(|name| {
                let open = format!("<{}", name);
                let start = text[cursor..].find(&open).map(|i| cursor + i + 1)?;
                cursor = start;
                Some((name.clone(), start, start + name.len()))
            })
            .collect()
    }
}

#[async_trait]
impl ExtractionStrategy for StructuredRules {
    fn name(&self) -> &str {
        "structured-rules"
    }

    async fn extract(
        &self,
        unit: &ExtractionUnit<'_>,
        options: &ExtractionOptions,
    ) -> Result<StrategyOutput, ExtractionError> {
        let text = unit.text();
        let keys = match syntax_of(unit.content_type, &text) {
            Syntax::Json => Self::json_keys(&text),
            Syntax::Xml => Self::xml_tags(&text),
        };

        let entities = keys
            .into_iter()
            .filter(|(_, _, end)| !unit.in_overlap(*end))
            .map(|(key, start, end)| {
                let context = context_window(&text, start, end, options.context_window);
                Entity::new(key, EntityType::Other).with_mention(Mention::new(
                    context,
                    unit.absolute(start),
                    KEY_RELEVANCE,
                ))
            })
            .collect();

        Ok(StrategyOutput::new(entities))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn names(content_type: &str, text: &str) -> Vec<String> {
        let unit = ExtractionUnit::text_only(text.as_bytes(), content_type);
        StructuredRules::new()
            .extract(&unit, &ExtractionOptions::default())
            .await
            .unwrap()
            .entities
            .into_iter()
            .map(|e| {
                assert_eq!(e.entity_type, EntityType::Other);
                assert_eq!(e.mentions[0].relevance, 0.5);
                e.name
            })
            .collect()
    }

    #[tokio::test]
    async fn test_json_object_top_level_keys() {
        let text = r#"{"customer": {"name": "Ada"}, "order_id": 7, "items": []}"#;
        let mut keys = names("application/json", text).await;
        keys.sort();
        assert_eq!(keys, vec!["customer", "items", "order_id"]);
    }

    #[tokio::test]
    async fn test_json_array_unions_object_keys() {
        let text = r#"[{"id": 1, "title": "a"}, {"id": 2, "author": "b"}]"#;
        let mut keys = names("application/json", text).await;
        keys.sort();
        assert_eq!(keys, vec!["author", "id", "title"]);
    }

    #[tokio::test]
    async fn test_json_fragment_uses_lenient_scan() {
        let text = "  \"service\": \"billing\",\n  \"region\": \"eu-west-1\",\n        \"deep\": 1\n}";
        assert_eq!(names("application/json", text).await, vec!["service", "region"]);
    }

    #[tokio::test]
    async fn test_xml_root_children() {
        let text = "<?xml version=\"1.0\"?><invoice><customer>Ada</customer><total>12</total><line/><total>3</total></invoice>";
        assert_eq!(names("application/xml", text).await, vec!["customer", "total", "line"]);
    }

    #[tokio::test]
    async fn test_xml_without_children_reports_root() {
        assert_eq!(names("text/xml", "<note>hello</note>").await, vec!["note"]);
    }

    #[tokio::test]
    async fn test_key_positions_are_absolute() {
        let text = r#"{"alpha": 1}"#;
        let chunk = crate::types::Chunk::new(0, text.as_bytes().to_vec(), 0, 0);
        let unit = ExtractionUnit::from_chunk(&chunk, "application/json");
        let out = StructuredRules::new()
            .extract(&unit, &ExtractionOptions::default())
            .await
            .unwrap();
        assert_eq!(out.entities[0].mentions[0].position, 2);
    }
}
