//! Extraction strategy trait.

use async_trait::async_trait;

use super::ExtractionUnit;
use crate::error::ExtractionError;
use crate::types::{Entity, ExtractionOptions};

/// Entities produced by one strategy, plus the candidates it had to drop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyOutput {
    pub entities: Vec<Entity>,
    pub rejected: usize,
}

impl StrategyOutput {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self {
            entities,
            rejected: 0,
        }
    }

    pub fn with_rejected(mut self, rejected: usize) -> Self {
        self.rejected = rejected;
        self
    }
}

impl From<Vec<Entity>> for StrategyOutput {
    fn from(entities: Vec<Entity>) -> Self {
        Self::new(entities)
    }
}

/// One way of extracting entities from a unit of content.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Name reported as the result's source strategy.
    fn name(&self) -> &str;

    /// Preconditions (credentials, options, backend health). Unavailable
    /// strategies are skipped without counting as a failure.
    fn is_available(&self, _options: &ExtractionOptions) -> bool {
        true
    }

    async fn extract(
        &self,
        unit: &ExtractionUnit<'_>,
        options: &ExtractionOptions,
    ) -> Result<StrategyOutput, ExtractionError>;
}
