//! Resilience layer shared by every external call.
//!
//! - `ResilientInvoker`: retry with exponential backoff, jitter and per-attempt timeout
//! - `CircuitBreaker`: stops calling a backend that keeps failing

mod circuit_breaker;
mod invoker;

pub use circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitState, CircuitStats};
pub use invoker::{apply_jitter, next_delay, ResilientInvoker};
