//! Content type → ordered extraction strategies.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::{AiStrategy, CodeRules, ExtractionStrategy, StructuredRules, TextRules};
use crate::resilience::CircuitBreaker;
use crate::services::AnalysisService;
use crate::types::{essence, PipelineConfig, CODE_MIME_TYPES};

pub type Strategies = Vec<Arc<dyn ExtractionStrategy>>;

/// One row of the table, for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableEntry {
    pub pattern: String,
    pub strategies: Vec<String>,
}

/// Strategy lookup, most specific match first: exact type, then
/// `family/*`, then the default row.
///
/// Built once at startup and read-only afterwards.
#[derive(Default)]
pub struct StrategyTable {
    exact: HashMap<String, Strategies>,
    wildcard: HashMap<String, Strategies>,
    default: Strategies,
    breaker: Option<Arc<CircuitBreaker>>,
}

/// Lookup key for a content type: parameters dropped, structured-syntax
/// suffixes folded to their base type, code language tags folded to `text/code`.
fn table_key(content_type: &str) -> String {
    let ct = essence(content_type);
    if ct.starts_with("text/code:") {
        return "text/code".to_string();
    }
    if ct.ends_with("+json") {
        return "application/json".to_string();
    }
    if ct.ends_with("+xml") {
        return "application/xml".to_string();
    }
    ct
}

impl StrategyTable {
    pub fn builder() -> StrategyTableBuilder {
        StrategyTableBuilder::default()
    }

    /// The stock table: AI strategy per family profile, then the family's rules.
    ///
    /// Without an analysis service only rule-based strategies are registered.
    pub fn standard(config: &PipelineConfig, service: Option<Arc<dyn AnalysisService>>) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(config.circuit.clone()));
        let ai = |profile: &str| -> Option<Arc<dyn ExtractionStrategy>> {
            service.as_ref().map(|service| {
                Arc::new(AiStrategy::new(
                    profile,
                    config.instructions_for(profile),
                    service.clone(),
                    config.extraction_retry.clone(),
                    breaker.clone(),
                )) as Arc<dyn ExtractionStrategy>
            })
        };
        let chain = |profile: &str, rules: Option<Arc<dyn ExtractionStrategy>>| -> Strategies {
            ai(profile).into_iter().chain(rules).collect()
        };

        let text_rules: Arc<dyn ExtractionStrategy> = Arc::new(TextRules::new());
        let structured_rules: Arc<dyn ExtractionStrategy> = Arc::new(StructuredRules::new());
        let code_rules: Arc<dyn ExtractionStrategy> = Arc::new(CodeRules::new());

        let text = chain("text", Some(text_rules));
        let structured = chain("structured", Some(structured_rules));
        let code = chain("code", Some(code_rules));
        let media = chain("media", None);

        let mut builder = Self::builder()
            .register("text/*", text.clone())
            .register("application/pdf", text.clone())
            .register("application/rtf", text.clone())
            .register("application/msword", text.clone())
            .register(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                text.clone(),
            )
            .register("application/vnd.oasis.opendocument.text", text)
            .register("application/json", structured.clone())
            .register("application/xml", structured.clone())
            .register("text/xml", structured)
            .register("text/code", code.clone())
            .register("image/*", media.clone())
            .register("video/*", media.clone())
            .register("audio/*", media)
            .register("*", Vec::new());
        for (mime, _) in CODE_MIME_TYPES {
            builder = builder.register(mime, code.clone());
        }

        let mut table = builder.build();
        if service.is_some() {
            table.breaker = Some(breaker);
        }
        table
    }

    /// Strategies for a content type, most specific match first.
    pub fn resolve(&self, content_type: &str) -> &[Arc<dyn ExtractionStrategy>] {
        let key = table_key(content_type);
        if let Some(strategies) = self.exact.get(&key) {
            return strategies;
        }
        let top_level = key.split('/').next().unwrap_or_default();
        if let Some(strategies) = self.wildcard.get(top_level) {
            return strategies;
        }
        &self.default
    }

    /// Circuit breaker shared by the AI strategies, if any were registered.
    pub fn circuit_breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.breaker.as_ref()
    }

    /// Every row, sorted by pattern.
    pub fn list(&self) -> Vec<TableEntry> {
        let names = |strategies: &Strategies| -> Vec<String> {
            strategies.iter().map(|s| s.name().to_string()).collect()
        };
        let mut entries: Vec<TableEntry> = self
            .exact
            .iter()
            .map(|(pattern, s)| TableEntry {
                pattern: pattern.clone(),
                strategies: names(s),
            })
            .chain(self.wildcard.iter().map(|(family, s)| TableEntry {
                pattern: format!("{}/*", family),
                strategies: names(s),
            }))
            .collect();
        entries.sort_by(|a, b| a.pattern.cmp(&b.pattern));
        entries.push(TableEntry {
            pattern: "*".to_string(),
            strategies: names(&self.default),
        });
        entries
    }
}

/// Builder for [`StrategyTable`]. Later registrations for the same pattern replace earlier ones.
#[derive(Default)]
pub struct StrategyTableBuilder {
    table: StrategyTable,
}

impl StrategyTableBuilder {
    /// Register strategies for `pattern`: an exact type, `family/*`, or `*`.
    pub fn register(mut self, pattern: &str, strategies: Strategies) -> Self {
        let pattern = pattern.trim();
        if pattern == "*" {
            self.table.default = strategies;
        } else if let Some(family) = pattern.strip_suffix("/*") {
            self.table.wildcard.insert(family.to_lowercase(), strategies);
        } else {
            self.table.exact.insert(table_key(pattern), strategies);
        }
        self
    }

    pub fn build(self) -> StrategyTable {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::NoAnalysis;
    use pretty_assertions::assert_eq;

    fn one(strategy: impl ExtractionStrategy + 'static) -> Strategies {
        let strategy: Arc<dyn ExtractionStrategy> = Arc::new(strategy);
        vec![strategy]
    }

    fn names(table: &StrategyTable, content_type: &str) -> Vec<String> {
        table
            .resolve(content_type)
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    #[test]
    fn test_most_specific_match_first() {
        let table = StrategyTable::builder()
            .register("text/*", one(TextRules::new()))
            .register("text/xml", one(StructuredRules::new()))
            .register("*", one(CodeRules::new()))
            .build();

        assert_eq!(names(&table, "text/xml"), vec!["structured-rules"]);
        assert_eq!(names(&table, "text/markdown; charset=utf-8"), vec!["text-rules"]);
        assert_eq!(names(&table, "application/zip"), vec!["code-rules"]);
    }

    #[test]
    fn test_standard_without_service_is_rules_only() {
        let table = StrategyTable::standard(&PipelineConfig::default(), None);
        assert_eq!(names(&table, "text/plain"), vec!["text-rules"]);
        assert_eq!(names(&table, "application/ld+json"), vec!["structured-rules"]);
        assert_eq!(names(&table, "image/svg+xml"), vec!["structured-rules"]);
        assert_eq!(names(&table, "text/x-python"), vec!["code-rules"]);
        assert_eq!(names(&table, "text/code:rust"), vec!["code-rules"]);
        assert!(names(&table, "image/png").is_empty());
        assert!(names(&table, "application/octet-stream").is_empty());
        assert!(table.circuit_breaker().is_none());
    }

    #[test]
    fn test_standard_with_service_puts_ai_first() {
        let service: Arc<dyn AnalysisService> = Arc::new(NoAnalysis);
        let table = StrategyTable::standard(&PipelineConfig::default(), Some(service));
        assert_eq!(names(&table, "text/plain"), vec!["ai:text", "text-rules"]);
        assert_eq!(names(&table, "application/pdf"), vec!["ai:text", "text-rules"]);
        assert_eq!(names(&table, "application/json"), vec!["ai:structured", "structured-rules"]);
        assert_eq!(names(&table, "application/javascript"), vec!["ai:code", "code-rules"]);
        assert_eq!(names(&table, "video/mp4"), vec!["ai:media"]);
        assert!(table.circuit_breaker().is_some());
    }

    #[test]
    fn test_list_is_sorted_with_default_last() {
        let table = StrategyTable::standard(&PipelineConfig::default(), None);
        let entries = table.list();
        let patterns: Vec<&str> = entries.iter().map(|e| e.pattern.as_str()).collect();
        let mut sorted = patterns[..patterns.len() - 1].to_vec();
        sorted.sort();
        assert_eq!(&patterns[..patterns.len() - 1], sorted.as_slice());
        assert_eq!(patterns.last(), Some(&"*"));
        assert!(patterns.contains(&"text/*"));
    }
}
