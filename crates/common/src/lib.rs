//! Generic building blocks shared across StoreLink crates.
//!
//! Nothing in this crate knows about connectors or tenants; it provides the
//! time, resilience, coordination and OAuth primitives the registry and the
//! adapters are assembled from.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `runtime`: async infrastructure (time, resilience, sync)
//! - `platform`: outbound integrations (auth)
//! - `observability`: tracing instrumentation (implied by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;
#[cfg(feature = "runtime")]
pub mod sync;
#[cfg(feature = "runtime")]
pub mod time;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod auth;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "platform")]
pub use auth::{
    ClientCredentialsClient, ClientCredentialsConfig, TokenEndpoint, TokenManager,
    TokenManagerError, TokenResponse,
};
#[cfg(feature = "runtime")]
pub use resilience::{
    retry_with_backoff, BackoffStrategy, CircuitBreaker, CircuitBreakerConfig, CircuitState,
    Counts, Jitter, ResilienceError, ResilienceResult, RetryConfig, RetryDecision, RetryError,
    RetryExecutor, RetryPolicy, RetryResult,
};
#[cfg(feature = "runtime")]
pub use sync::KeyedMutex;
#[cfg(feature = "runtime")]
pub use time::{Clock, MockClock, SystemClock};
