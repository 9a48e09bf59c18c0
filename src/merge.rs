//! Entity merging across chunk results.
//!
//! Entities are keyed by `(type, normalized_name)`. Folding the same
//! result twice adds nothing, and the set of keys and mentions does not
//! depend on how results are grouped or ordered. Only mention order does:
//! it follows fold order, so callers fold in chunk-index order.
//!
//! Organization names keep their capitalization, so `IBM` and `ibm` end up
//! as two entities. Case variants are not folded together.

use indexmap::IndexMap;
use tracing::debug;

use crate::types::{Entity, EntityKey, ExtractionResult};

/// Accumulates entities into a canonical, deduplicated set.
#[derive(Debug, Default, Clone)]
pub struct EntityMerger {
    entities: IndexMap<EntityKey, Entity>,
    duplicate_mentions: usize,
}

impl EntityMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one entity into the set.
    pub fn absorb(&mut self, entity: Entity) {
        let key = entity.key();
        match self.entities.get_mut(&key) {
            Some(canonical) => {
                if canonical.description.is_none() {
                    canonical.description = entity.description;
                }
                for mention in entity.mentions {
                    if !canonical.add_mention(mention) {
                        self.duplicate_mentions += 1;
                    }
                }
            }
            None => {
                let Entity {
                    name,
                    normalized_name,
                    entity_type,
                    description,
                    mentions,
                } = entity;
                let mut canonical = Entity {
                    name,
                    normalized_name,
                    entity_type,
                    description,
                    mentions: Vec::with_capacity(mentions.len()),
                };
                for mention in mentions {
                    if !canonical.add_mention(mention) {
                        self.duplicate_mentions += 1;
                    }
                }
                self.entities.insert(key, canonical);
            }
        }
    }

    pub fn absorb_all(&mut self, entities: impl IntoIterator<Item = Entity>) {
        for entity in entities {
            self.absorb(entity);
        }
    }

    /// Fold every entity of an extraction result.
    pub fn absorb_result(&mut self, result: ExtractionResult) {
        self.absorb_all(result.entities);
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    /// Mentions dropped because the same occurrence was already recorded.
    pub fn duplicate_mentions(&self) -> usize {
        self.duplicate_mentions
    }

    /// The canonical entity set, in first-seen order. Entities without a
    /// mention are dropped.
    pub fn finish(self) -> Vec<Entity> {
        let total = self.entities.len();
        let entities: Vec<Entity> = self
            .entities
            .into_values()
            .filter(|e| !e.mentions.is_empty())
            .collect();
        if entities.len() < total {
            debug!(dropped = total - entities.len(), "Dropped entities without mentions");
        }
        entities
    }
}

/// Merge extraction results in the order given.
pub fn merge(results: impl IntoIterator<Item = ExtractionResult>) -> Vec<Entity> {
    let mut merger = EntityMerger::new();
    for result in results {
        merger.absorb_result(result);
    }
    merger.finish()
}

/// Merge two already-merged entity lists.
pub fn merge_entities(left: Vec<Entity>, right: Vec<Entity>) -> Vec<Entity> {
    let mut merger = EntityMerger::new();
    merger.absorb_all(left);
    merger.absorb_all(right);
    merger.finish()
}
