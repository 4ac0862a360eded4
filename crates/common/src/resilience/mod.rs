//! Resilience patterns for outbound dependency calls
//!
//! - **Circuit Breaker**: fails fast once a dependency's failure ratio crosses
//!   a threshold, then probes recovery through a bounded half-open phase
//! - **Retry**: exponential backoff with cancellation
//!
//! Both are generic over the operation's error type and know nothing about
//! connectors. Adapters compose them with the breaker on the outside:
//!
//! ```text
//! breaker.execute_filtered(|| retry.execute(|| http_call(), &cancel), is_failure)
//! ```
//!
//! so one logical call that needed three attempts is recorded once by the
//! breaker instead of three times.

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerMetrics,
    CircuitState, ConfigError, ConfigResult, Counts, ReadyToTrip, ResilienceError,
    ResilienceResult, StateChangeListener,
};
pub use retry::{
    policies, retry_with_backoff, BackoffStrategy, Jitter, RetryConfig, RetryConfigBuilder,
    RetryDecision, RetryError, RetryExecutor, RetryPolicy, RetryResult,
};
