//! Entity, mention and extraction-result types.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::normalize::normalize_name;

/// Closed set of entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Person,
    Organization,
    Location,
    Date,
    Product,
    Technology,
    Event,
    Other,
}

impl EntityType {
    pub const ALL: [EntityType; 8] = [
        EntityType::Person,
        EntityType::Organization,
        EntityType::Location,
        EntityType::Date,
        EntityType::Product,
        EntityType::Technology,
        EntityType::Event,
        EntityType::Other,
    ];

    /// Parse a type name (case-insensitive). Anything outside the closed set is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "person" => Some(EntityType::Person),
            "organization" => Some(EntityType::Organization),
            "location" => Some(EntityType::Location),
            "date" => Some(EntityType::Date),
            "product" => Some(EntityType::Product),
            "technology" => Some(EntityType::Technology),
            "event" => Some(EntityType::Event),
            "other" => Some(EntityType::Other),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Organization => "organization",
            EntityType::Location => "location",
            EntityType::Date => "date",
            EntityType::Product => "product",
            EntityType::Technology => "technology",
            EntityType::Event => "event",
            EntityType::Other => "other",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed occurrence of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    /// Surrounding text
    pub context: String,
    /// Byte offset in the content unit, or a symbolic position
    pub position: i64,
    /// Relevance score in [0, 1]
    pub relevance: f32,
}

impl Mention {
    pub fn new(context: impl Into<String>, position: i64, relevance: f32) -> Self {
        Self {
            context: context.into(),
            position,
            relevance: relevance.clamp(0.0, 1.0),
        }
    }

    /// Two mentions are the same occurrence when context and position match.
    pub fn same_occurrence(&self, other: &Mention) -> bool {
        self.position == other.position && self.context == other.context
    }
}

/// Deduplication identity of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub entity_type: EntityType,
    pub normalized_name: String,
}

/// A named entity with its mentions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Name as first observed
    pub name: String,
    pub normalized_name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub mentions: Vec<Mention>,
}

impl Entity {
    /// Create an entity; the normalized name is derived from `name`.
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        let name = name.into();
        let normalized_name = normalize_name(&name, entity_type);
        Self {
            name,
            normalized_name,
            entity_type,
            description: None,
            mentions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mention(mut self, mention: Mention) -> Self {
        self.add_mention(mention);
        self
    }

    /// Append a mention unless the same occurrence is already recorded.
    ///
    /// Returns true if the mention was added.
    pub fn add_mention(&mut self, mention: Mention) -> bool {
        if self.mentions.iter().any(|m| m.same_occurrence(&mention)) {
            return false;
        }
        self.mentions.push(mention);
        true
    }

    pub fn key(&self) -> EntityKey {
        EntityKey {
            entity_type: self.entity_type,
            normalized_name: self.normalized_name.clone(),
        }
    }

    /// Earliest occurrence, in first-seen order.
    pub fn first_mention(&self) -> Option<&Mention> {
        self.mentions.first()
    }

    /// Highest relevance across all mentions.
    pub fn max_relevance(&self) -> f32 {
        self.mentions
            .iter()
            .map(|m| m.relevance)
            .fold(0.0, f32::max)
    }
}

/// A strategy failure recorded on an extraction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyFailure {
    pub strategy: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Output of the extraction chain for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Chunk this result belongs to (`None` for a whole content unit)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    pub entities: Vec<Entity>,
    /// Name of the strategy that produced the entities
    pub source_strategy: String,
    pub succeeded: bool,
    /// Candidates dropped by validation
    #[serde(default)]
    pub rejected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StrategyFailure>,
}

impl ExtractionResult {
    pub fn success(strategy: impl Into<String>, entities: Vec<Entity>) -> Self {
        Self {
            chunk_index: None,
            entities,
            source_strategy: strategy.into(),
            succeeded: true,
            rejected: 0,
            failure: None,
        }
    }

    pub fn empty(strategy: impl Into<String>) -> Self {
        Self::success(strategy, Vec::new())
    }

    pub fn failed(failure: StrategyFailure) -> Self {
        Self {
            chunk_index: None,
            entities: Vec::new(),
            source_strategy: failure.strategy.clone(),
            succeeded: false,
            rejected: 0,
            failure: Some(failure),
        }
    }

    pub fn for_chunk(mut self, index: usize) -> Self {
        self.chunk_index = Some(index);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_parse_is_closed() {
        assert_eq!(EntityType::parse("Person"), Some(EntityType::Person));
        assert_eq!(EntityType::parse(" technology "), Some(EntityType::Technology));
        assert_eq!(EntityType::parse("animal"), None);
        assert_eq!(EntityType::ALL.len(), 8);
    }

    #[test]
    fn test_mention_relevance_clamped() {
        assert_eq!(Mention::new("x", 0, 1.7).relevance, 1.0);
        assert_eq!(Mention::new("x", 0, -0.2).relevance, 0.0);
    }

    #[test]
    fn test_add_mention_dedups_occurrence() {
        let mut entity = Entity::new("Paris", EntityType::Location);
        assert!(entity.add_mention(Mention::new("in Paris", 10, 0.65)));
        assert!(!entity.add_mention(Mention::new("in Paris", 10, 0.9)));
        assert!(entity.add_mention(Mention::new("in Paris", 42, 0.65)));
        assert_eq!(entity.mentions.len(), 2);
    }

    #[test]
    fn test_entity_serializes_type_field() {
        let entity = Entity::new("Acme Corp", EntityType::Organization)
            .with_mention(Mention::new("at Acme Corp", 3, 0.7));
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["type"], "organization");
        assert_eq!(json["normalized_name"], "Acme Corp");
    }
}
