//! Entity store.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ExternalError;
use crate::types::{ChunkRecord, Entity, EntityKey, Mention};

/// Counts reported by a successful persist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistOutcome {
    pub entities_created: usize,
    pub entities_updated: usize,
    pub links_created: usize,
    pub mentions_added: usize,
}

/// Durable home for merged entities and chunk records.
///
/// Entities upsert by `(type, normalized_name)`; the content → entity link
/// is unique per pair, so persisting the same run twice adds no rows.
#[async_trait]
pub trait Store: Send + Sync {
    async fn persist(
        &self,
        content_id: Uuid,
        entities: &[Entity],
        chunks: &[ChunkRecord],
    ) -> Result<PersistOutcome, ExternalError>;
}

#[derive(Debug, Clone)]
struct StoredEntity {
    id: Uuid,
    entity: Entity,
}

#[derive(Debug, Default)]
struct Tables {
    entities: HashMap<EntityKey, StoredEntity>,
    /// (content_id, entity_id) → mentions within that content
    links: HashMap<(Uuid, Uuid), Vec<Mention>>,
    chunks: HashMap<Uuid, Vec<ChunkRecord>>,
}

/// In-process store. One lock per persist, so each call is a single write.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn entity_count(&self) -> usize {
        self.lock().entities.len()
    }

    pub fn link_count(&self) -> usize {
        self.lock().links.len()
    }

    /// Stable id and stored form of an entity.
    pub fn entity(&self, key: &EntityKey) -> Option<(Uuid, Entity)> {
        self.lock()
            .entities
            .get(key)
            .map(|stored| (stored.id, stored.entity.clone()))
    }

    /// Mentions of an entity linked to one content unit.
    pub fn mentions(&self, content_id: Uuid, key: &EntityKey) -> Vec<Mention> {
        let tables = self.lock();
        tables
            .entities
            .get(key)
            .and_then(|stored| tables.links.get(&(content_id, stored.id)))
            .cloned()
            .unwrap_or_default()
    }

    pub fn chunk_records(&self, content_id: Uuid) -> Vec<ChunkRecord> {
        self.lock().chunks.get(&content_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn persist(
        &self,
        content_id: Uuid,
        entities: &[Entity],
        chunks: &[ChunkRecord],
    ) -> Result<PersistOutcome, ExternalError> {
        let mut outcome = PersistOutcome::default();
        let mut tables = self.lock();
        let Tables {
            entities: stored_entities,
            links,
            chunks: stored_chunks,
        } = &mut *tables;

        for entity in entities {
            let stored = match stored_entities.entry(entity.key()) {
                Entry::Occupied(occupied) => {
                    let stored = occupied.into_mut();
                    if stored.entity.description.is_none() && entity.description.is_some() {
                        stored.entity.description = entity.description.clone();
                        outcome.entities_updated += 1;
                    }
                    stored
                }
                Entry::Vacant(vacant) => {
                    outcome.entities_created += 1;
                    let mut canonical = entity.clone();
                    canonical.mentions.clear();
                    vacant.insert(StoredEntity {
                        id: Uuid::new_v4(),
                        entity: canonical,
                    })
                }
            };

            let link = links.entry((content_id, stored.id)).or_insert_with(|| {
                outcome.links_created += 1;
                Vec::new()
            });
            for mention in &entity.mentions {
                if !link.iter().any(|m| m.same_occurrence(mention)) {
                    link.push(mention.clone());
                    outcome.mentions_added += 1;
                }
            }
        }

        stored_chunks.insert(content_id, chunks.to_vec());
        Ok(outcome)
    }
}
