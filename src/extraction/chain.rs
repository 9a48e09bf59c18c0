//! Ordered fallback over the strategies registered for a content type.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{ExtractionUnit, StrategyTable};
use crate::merge::EntityMerger;
use crate::types::{ExtractionOptions, ExtractionResult, StrategyFailure};

/// Runs strategies in table order until one yields entities.
///
/// Never returns an error: strategy failures are recorded on the result.
#[derive(Clone)]
pub struct ExtractionChain {
    table: Arc<StrategyTable>,
}

impl ExtractionChain {
    pub fn new(table: Arc<StrategyTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &StrategyTable {
        &self.table
    }

    pub async fn extract(&self, unit: &ExtractionUnit<'_>, options: &ExtractionOptions) -> ExtractionResult {
        let strategies = self.table.resolve(unit.content_type);
        let mut last_failure: Option<StrategyFailure> = None;
        let mut last_tried: Option<&str> = None;
        let mut rejected = 0;

        for strategy in strategies {
            if !strategy.is_available(options) {
                debug!(strategy = strategy.name(), chunk = ?unit.index, "Strategy unavailable, skipping");
                continue;
            }
            last_tried = Some(strategy.name());

            match strategy.extract(unit, options).await {
                Ok(output) => {
                    rejected += output.rejected;
                    let mut merger = EntityMerger::new();
                    merger.absorb_all(output.entities.into_iter().filter(|e| options.wants(e.entity_type)));
                    let entities = merger.finish();

                    if entities.is_empty() {
                        debug!(strategy = strategy.name(), chunk = ?unit.index, "No entities, trying next strategy");
                        continue;
                    }

                    debug!(
                        strategy = strategy.name(),
                        chunk = ?unit.index,
                        entities = entities.len(),
                        "Extraction succeeded"
                    );
                    let mut result = ExtractionResult::success(strategy.name(), entities);
                    result.rejected = rejected;
                    result.failure = last_failure;
                    return self.tag(result, unit);
                }
                Err(e) => {
                    warn!(
                        strategy = strategy.name(),
                        chunk = ?unit.index,
                        kind = %e.kind(),
                        error = %e,
                        "Extraction strategy failed"
                    );
                    last_failure = Some(StrategyFailure {
                        strategy: strategy.name().to_string(),
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let mut result = match last_failure {
            Some(failure) => ExtractionResult::failed(failure),
            None => ExtractionResult::empty(last_tried.unwrap_or("none")),
        };
        result.rejected = rejected;
        self.tag(result, unit)
    }

    fn tag(&self, result: ExtractionResult, unit: &ExtractionUnit<'_>) -> ExtractionResult {
        match unit.index {
            Some(index) => result.for_chunk(index),
            None => result,
        }
    }
}
