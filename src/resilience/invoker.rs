//! Retry-with-backoff wrapper for external calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use super::CircuitBreaker;
use crate::error::{ExternalError, InvokeError};
use crate::types::RetryPolicy;

/// Delay before attempt `attempt` (1-based), before jitter.
///
/// The first attempt runs immediately; attempt `k >= 2` waits
/// `min(max_delay, base_delay * 2^(k-2))`.
pub fn next_delay(attempt: u32, policy: &RetryPolicy) -> Duration {
    if attempt < 2 {
        return Duration::ZERO;
    }
    let factor = 2_u64.saturating_pow(attempt - 2);
    let millis = policy
        .base_delay_ms
        .saturating_mul(factor)
        .min(policy.max_delay_ms);
    Duration::from_millis(millis)
}

/// Scale `delay` by a uniform factor in `[1 - pct/100, 1 + pct/100]`.
pub fn apply_jitter<R: Rng>(delay: Duration, jitter_pct: u32, rng: &mut R) -> Duration {
    if jitter_pct == 0 || delay.is_zero() {
        return delay;
    }
    let spread = f64::from(jitter_pct.min(100)) / 100.0;
    let factor = rng.gen_range((1.0 - spread)..=(1.0 + spread));
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}

/// Generic retry/backoff/timeout combinator.
///
/// Knows nothing about chunks or entities; the analysis strategy and the
/// persistence step each hold one with their own policy.
#[derive(Debug, Clone)]
pub struct ResilientInvoker {
    policy: RetryPolicy,
    breaker: Option<Arc<CircuitBreaker>>,
    label: &'static str,
}

impl ResilientInvoker {
    pub fn new(label: &'static str, policy: RetryPolicy) -> Self {
        Self {
            policy,
            breaker: None,
            label,
        }
    }

    /// Report transient failures and successes to a circuit breaker.
    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out.
    ///
    /// Each attempt is bounded by the policy timeout; an elapsed timeout
    /// counts as a transient failure.
    pub async fn invoke<T, F, Fut>(&self, mut op: F) -> Result<T, InvokeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ExternalError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let timeout = self.policy.timeout();
        let mut attempt = 0;

        loop {
            attempt += 1;

            if attempt > 1 {
                let delay = apply_jitter(
                    next_delay(attempt, &self.policy),
                    self.policy.jitter_pct,
                    &mut rand::thread_rng(),
                );
                debug!(call = self.label, attempt, delay_ms = delay.as_millis() as u64, "Backing off");
                tokio::time::sleep(delay).await;
            }

            if let Some(breaker) = &self.breaker {
                if !breaker.allow_request() {
                    return Err(InvokeError::Terminal {
                        source: ExternalError::Unavailable("circuit open".to_string()),
                        attempts: attempt - 1,
                    });
                }
            }

            let outcome = match tokio::time::timeout(timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(ExternalError::Timeout(timeout)),
            };

            match outcome {
                Ok(value) => {
                    if let Some(breaker) = &self.breaker {
                        breaker.record_success();
                    }
                    if attempt > 1 {
                        debug!(call = self.label, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_transient() => {
                    warn!(call = self.label, attempt, error = %err, "Terminal failure, not retrying");
                    return Err(InvokeError::Terminal {
                        source: err,
                        attempts: attempt,
                    });
                }
                Err(err) => {
                    if let Some(breaker) = &self.breaker {
                        breaker.record_failure();
                    }
                    if attempt >= max_attempts {
                        warn!(call = self.label, attempts = attempt, error = %err, "Retries exhausted");
                        return Err(InvokeError::Exhausted {
                            source: err,
                            attempts: attempt,
                        });
                    }
                    warn!(
                        call = self.label,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Transient failure, retrying"
                    );
                }
            }
        }
    }
}
