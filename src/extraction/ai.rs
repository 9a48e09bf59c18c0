//! AI-backed extraction through the analysis service.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info_span, Instrument};

use super::{entities_from_response, ExtractionStrategy, ExtractionUnit, StrategyOutput};
use crate::error::ExtractionError;
use crate::resilience::{CircuitBreaker, ResilientInvoker};
use crate::services::{AnalysisPayload, AnalysisRequest, AnalysisService};
use crate::types::{ContentFamily, ExtractionOptions, RetryPolicy};

/// Sends a unit to the analysis service under one instruction profile.
pub struct AiStrategy {
    name: String,
    profile: String,
    instructions: String,
    service: Arc<dyn AnalysisService>,
    invoker: ResilientInvoker,
    breaker: Arc<CircuitBreaker>,
}

impl AiStrategy {
    pub fn new(
        profile: impl Into<String>,
        instructions: impl Into<String>,
        service: Arc<dyn AnalysisService>,
        policy: RetryPolicy,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        let profile = profile.into();
        Self {
            name: format!("ai:{}", profile),
            profile,
            instructions: instructions.into(),
            service,
            invoker: ResilientInvoker::new("analysis", policy).with_circuit_breaker(breaker.clone()),
            breaker,
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }
}

#[async_trait]
impl ExtractionStrategy for AiStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self, options: &ExtractionOptions) -> bool {
        options.allow_analysis && self.service.is_configured() && !self.breaker.is_open()
    }

    async fn extract(
        &self,
        unit: &ExtractionUnit<'_>,
        _options: &ExtractionOptions,
    ) -> Result<StrategyOutput, ExtractionError> {
        let family = ContentFamily::of(unit.content_type);
        let payload = AnalysisPayload::for_family(family, || unit.text().into_owned(), unit.bytes);
        let request = AnalysisRequest {
            profile: &self.profile,
            instructions: &self.instructions,
            payload: &payload,
        };

        let span = info_span!("analyze", profile = %self.profile, chunk = ?unit.index);
        let response = self
            .invoker
            .invoke(|| self.service.analyze(&request))
            .instrument(span)
            .await?;

        let (entities, rejected) = entities_from_response(&response, unit)?;
        debug!(
            profile = %self.profile,
            entities = entities.len(),
            rejected,
            "Analysis response validated"
        );
        Ok(StrategyOutput::new(entities).with_rejected(rejected))
    }
}
