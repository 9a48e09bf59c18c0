//! Circuit breaker for the analysis backend.
//!
//! Stops sending requests to a backend that keeps failing transiently.
//! Recovery attempts are spaced with exponential backoff and jitter.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Failure threshold exceeded - requests blocked
    Open,
    /// Testing if service recovered - limited requests allowed
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Base recovery timeout
    pub recovery_timeout_ms: u64,
    /// Successful calls in half-open state needed to close again
    pub half_open_max_calls: u32,
    /// Upper bound on the recovery timeout
    pub max_backoff_ms: u64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 30_000,
            half_open_max_calls: 2,
            max_backoff_ms: 300_000,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    successes: u64,
    half_open_calls: u32,
    open_count: u32,
    next_retry: Option<Instant>,
}

/// Thread-safe circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                half_open_calls: 0,
                open_count: 0,
                next_retry: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check if a request should be allowed through.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.lock();
        let state = inner.state;
        match state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let ready = inner.next_retry.map_or(false, |at| Instant::now() >= at);
                if ready {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                }
                ready
            }
            CircuitState::HalfOpen => inner.half_open_calls < self.config.half_open_max_calls,
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.successes += 1;
        let state = inner.state;
        match state {
            CircuitState::HalfOpen => {
                inner.half_open_calls += 1;
                if inner.half_open_calls >= self.config.half_open_max_calls {
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            CircuitState::Closed => inner.failures = 0,
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failures += 1;
        let state = inner.state;
        match state {
            // A single failure while probing re-opens the circuit
            CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Open),
            CircuitState::Closed if inner.failures >= self.config.failure_threshold => {
                self.transition(&mut inner, CircuitState::Open)
            }
            _ => {}
        }
    }

    fn transition(&self, inner: &mut Inner, next: CircuitState) {
        inner.state = next;
        match next {
            CircuitState::Open => {
                let backoff = self.backoff(inner.open_count);
                inner.next_retry = Some(Instant::now() + backoff);
                inner.open_count += 1;
                warn!(
                    failures = inner.failures,
                    retry_in_ms = backoff.as_millis() as u64,
                    "Circuit opened"
                );
            }
            CircuitState::HalfOpen => {
                inner.half_open_calls = 0;
                info!("Circuit half-open, probing recovery");
            }
            CircuitState::Closed => {
                inner.open_count = 0;
                inner.failures = 0;
                inner.next_retry = None;
                info!("Circuit closed, normal operation resumed");
            }
        }
    }

    /// Exponential recovery timeout, capped, with 50-100% jitter.
    fn backoff(&self, open_count: u32) -> Duration {
        let base = self
            .config
            .recovery_timeout_ms
            .saturating_mul(2_u64.saturating_pow(open_count))
            .min(self.config.max_backoff_ms);
        let factor = rand::thread_rng().gen_range(0.5..=1.0);
        Duration::from_millis((base as f64 * factor) as u64)
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Open and still inside its recovery window. Does not change state.
    pub fn is_open(&self) -> bool {
        let inner = self.lock();
        inner.state == CircuitState::Open && inner.next_retry.map_or(true, |at| Instant::now() < at)
    }

    pub fn stats(&self) -> CircuitStats {
        let inner = self.lock();
        CircuitStats {
            state: inner.state,
            failures: inner.failures,
            successes: inner.successes,
            open_count: inner.open_count,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitConfig::default())
    }
}

/// Circuit breaker statistics
#[derive(Debug, Clone, Serialize)]
pub struct CircuitStats {
    pub state: CircuitState,
    pub failures: u32,
    pub successes: u64,
    pub open_count: u32,
}
