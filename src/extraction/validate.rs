//! Validation of analysis-service candidates.
//!
//! The service is not trusted: candidates missing a name, carrying a type
//! outside the closed set, or not shaped like an object are dropped one by
//! one rather than failing the whole response.

use serde_json::{Map, Value};
use tracing::warn;

use super::ExtractionUnit;
use crate::error::ExtractionError;
use crate::types::{Entity, EntityType, Mention};

const DEFAULT_RELEVANCE: f32 = 0.5;

/// Turn an analysis response into entities.
///
/// Accepts a bare array or an object with an `entities` array; `null` means
/// nothing was found. Returns the valid entities and the number of rejected
/// candidates.
pub fn entities_from_response(
    value: &Value,
    unit: &ExtractionUnit<'_>,
) -> Result<(Vec<Entity>, usize), ExtractionError> {
    let candidates: &[Value] = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("entities") {
            Some(Value::Array(items)) => items.as_slice(),
            Some(Value::Null) => &[],
            None if map.is_empty() => &[],
            _ => {
                return Err(ExtractionError::MalformedResponse(
                    "object without an `entities` array".to_string(),
                ))
            }
        },
        Value::Null => &[],
        other => {
            return Err(ExtractionError::MalformedResponse(format!(
                "expected an array, got {}",
                type_name(other)
            )))
        }
    };

    let mut entities = Vec::with_capacity(candidates.len());
    let mut rejected = 0;
    for (i, candidate) in candidates.iter().enumerate() {
        match candidate_entity(candidate, unit) {
            Ok(entity) => entities.push(entity),
            Err(reason) => {
                rejected += 1;
                warn!(candidate = i, chunk = ?unit.index, reason, "Rejected entity candidate");
            }
        }
    }

    Ok((entities, rejected))
}

fn candidate_entity(candidate: &Value, unit: &ExtractionUnit<'_>) -> Result<Entity, &'static str> {
    let obj = candidate.as_object().ok_or("candidate is not an object")?;

    let name = str_field(obj, "name")
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or("missing name")?;
    let entity_type = str_field(obj, "type")
        .ok_or("missing type")
        .and_then(|t| EntityType::parse(t).ok_or("unknown type"))?;

    let mut entity = Entity::new(name, entity_type);
    if entity.normalized_name.is_empty() {
        return Err("name normalizes to nothing");
    }

    let description = str_field(obj, "description")
        .map(str::trim)
        .filter(|d| !d.is_empty());
    if let Some(description) = description {
        entity = entity.with_description(description);
    }

    if let Some(Value::Array(mentions)) = obj.get("mentions") {
        for mention in mentions.iter().filter_map(Value::as_object) {
            entity.add_mention(candidate_mention(mention, unit));
        }
    }

    if entity.mentions.is_empty() {
        let context = description.unwrap_or(name).to_string();
        entity.add_mention(Mention::new(context, unit.absolute(0), DEFAULT_RELEVANCE));
    }

    Ok(entity)
}

fn candidate_mention(obj: &Map<String, Value>, unit: &ExtractionUnit<'_>) -> Mention {
    let context = str_field(obj, "context").unwrap_or_default();

    let position = match obj.get("position") {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    // Non-negative positions are relative to the unit; negatives are symbolic
    let position = match position {
        Some(p) if p >= 0 => unit.absolute(p as usize),
        Some(p) => p,
        None => unit.absolute(0),
    };

    let relevance = obj
        .get("relevance")
        .and_then(Value::as_f64)
        .map(|r| r as f32)
        .filter(|r| r.is_finite())
        .unwrap_or(DEFAULT_RELEVANCE);

    Mention::new(context, position, relevance)
}

fn str_field<'v>(obj: &'v Map<String, Value>, key: &str) -> Option<&'v str> {
    obj.get(key).and_then(Value::as_str)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn unit() -> ExtractionUnit<'static> {
        ExtractionUnit::text_only(b"John Smith works at Acme Corp.", "text/plain")
    }

    #[test]
    fn test_valid_candidates() {
        let response = json!([
            {
                "name": "Acme Corp",
                "type": "organization",
                "description": "An employer",
                "mentions": [{"context": "works at Acme Corp", "position": 20, "relevance": 0.9}]
            },
            {"name": "John Smith", "type": "Person", "mentions": [{"context": "John Smith works", "position": "0"}]}
        ]);
        let (entities, rejected) = entities_from_response(&response, &unit()).unwrap();
        assert_eq!(rejected, 0);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].description.as_deref(), Some("An employer"));
        assert_eq!(entities[0].mentions[0].position, 20);
        assert_eq!(entities[0].mentions[0].relevance, 0.9);
        assert_eq!(entities[1].entity_type, EntityType::Person);
        assert_eq!(entities[1].mentions[0].position, 0);
        assert_eq!(entities[1].mentions[0].relevance, 0.5);
    }

    #[test]
    fn test_invalid_candidates_are_rejected_individually() {
        let response = json!({"entities": [
            {"name": "", "type": "person"},
            {"name": "Rex", "type": "animal"},
            {"type": "location"},
            "Paris",
            {"name": "Paris", "type": "location"}
        ]});
        let (entities, rejected) = entities_from_response(&response, &unit()).unwrap();
        assert_eq!(rejected, 4);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "Paris");
    }

    #[test]
    fn test_missing_mentions_are_synthesized() {
        let response = json!([{"name": "Acme Corp", "type": "organization", "description": "A company"}]);
        let (entities, _) = entities_from_response(&response, &unit()).unwrap();
        assert_eq!(entities[0].mentions, vec![Mention::new("A company", 0, 0.5)]);
    }

    #[test]
    fn test_relevance_clamped_and_positions_rebased() {
        let chunk = Chunk::new(1, b"xxxxxAcme".to_vec(), 5, 100);
        let unit = ExtractionUnit::from_chunk(&chunk, "text/plain");
        let response = json!([{
            "name": "Acme",
            "type": "organization",
            "mentions": [
                {"context": "Acme", "position": 5, "relevance": 3.5},
                {"context": "doc", "position": -1}
            ]
        }]);
        let (entities, _) = entities_from_response(&response, &unit).unwrap();
        let mentions = &entities[0].mentions;
        assert_eq!(mentions[0].position, 100);
        assert_eq!(mentions[0].relevance, 1.0);
        assert_eq!(mentions[1].position, -1);
    }

    #[test]
    fn test_duplicate_mentions_collapse() {
        let response = json!([{
            "name": "Paris",
            "type": "location",
            "mentions": [
                {"context": "in Paris", "position": 3},
                {"context": "in Paris", "position": 3}
            ]
        }]);
        let (entities, _) = entities_from_response(&response, &unit()).unwrap();
        assert_eq!(entities[0].mentions.len(), 1);
    }

    #[test]
    fn test_malformed_shapes() {
        assert!(entities_from_response(&json!("entities"), &unit()).is_err());
        assert!(entities_from_response(&json!({"items": []}), &unit()).is_err());
        assert_eq!(entities_from_response(&Value::Null, &unit()).unwrap().0.len(), 0);
        assert_eq!(entities_from_response(&json!({}), &unit()).unwrap().0.len(), 0);
    }
}
