//! Framework-wide defaults
//!
//! Centralized location for the default values used when neither the
//! environment nor a config file overrides them.

// Registry cache
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 5 * 60;
pub const DEFAULT_HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

// Circuit breaker
pub const DEFAULT_BREAKER_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_BREAKER_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BREAKER_MAX_REQUESTS: u32 = 3;
pub const DEFAULT_BREAKER_MIN_REQUESTS: u32 = 5;
pub const DEFAULT_BREAKER_FAILURE_RATIO: f64 = 0.5;

// Retry
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 100;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;
pub const DEFAULT_RETRY_BACKOFF_FACTOR: f64 = 2.0;

// OAuth2 client credentials
pub const DEFAULT_TOKEN_EXPIRY_BUFFER_SECS: u64 = 5 * 60;
pub const DEFAULT_TOKEN_REQUEST_TIMEOUT_SECS: u64 = 30;

// Outbound HTTP
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 30;
pub const USER_AGENT: &str = concat!("storelink/", env!("CARGO_PKG_VERSION"));

// Logging
pub const DEFAULT_LOG_LEVEL: &str = "info";
