//! Application configuration structures
//!
//! Every section carries serde defaults so partial files and environment
//! overrides compose. Loading lives in `storelink-infra::config`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BREAKER_FAILURE_RATIO, DEFAULT_BREAKER_INTERVAL_SECS, DEFAULT_BREAKER_MAX_REQUESTS,
    DEFAULT_BREAKER_MIN_REQUESTS, DEFAULT_BREAKER_TIMEOUT_SECS, DEFAULT_CACHE_TTL_SECS,
    DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_HEALTH_CHECK_TIMEOUT_SECS, DEFAULT_LOG_LEVEL,
    DEFAULT_RETRY_BACKOFF_FACTOR, DEFAULT_RETRY_INITIAL_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS,
    DEFAULT_RETRY_MAX_DELAY_MS, DEFAULT_TOKEN_EXPIRY_BUFFER_SECS, DEFAULT_TOKEN_REQUEST_TIMEOUT_SECS,
};
use crate::errors::{Result, StoreLinkError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub registry: RegistrySettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub retry: RetrySettings,
    pub token: TokenSettings,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.registry.validate()?;
        self.circuit_breaker.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}

/// Connector cache housekeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Idle time after which a cached connector is closed and evicted
    pub cache_ttl_secs: u64,
    /// How often the background sweep runs
    pub cleanup_interval_secs: u64,
    pub health_check_timeout_secs: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            health_check_timeout_secs: DEFAULT_HEALTH_CHECK_TIMEOUT_SECS,
        }
    }
}

impl RegistrySettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.cache_ttl_secs == 0 {
            return Err(StoreLinkError::Config("registry.cache_ttl_secs must be > 0".into()));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(StoreLinkError::Config(
                "registry.cleanup_interval_secs must be > 0".into(),
            ));
        }
        if self.health_check_timeout_secs == 0 {
            return Err(StoreLinkError::Config(
                "registry.health_check_timeout_secs must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Defaults applied to every per-adapter circuit breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Rolling window for closed-state counts
    pub interval_secs: u64,
    /// Open → half-open cooldown
    pub timeout_secs: u64,
    /// Half-open trial budget
    pub max_requests: u32,
    /// Minimum requests in the window before the ratio is considered
    pub min_requests: u32,
    pub failure_ratio: f64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_BREAKER_INTERVAL_SECS,
            timeout_secs: DEFAULT_BREAKER_TIMEOUT_SECS,
            max_requests: DEFAULT_BREAKER_MAX_REQUESTS,
            min_requests: DEFAULT_BREAKER_MIN_REQUESTS,
            failure_ratio: DEFAULT_BREAKER_FAILURE_RATIO,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            return Err(StoreLinkError::Config("circuit_breaker.max_requests must be > 0".into()));
        }
        if !(self.failure_ratio > 0.0 && self.failure_ratio <= 1.0) {
            return Err(StoreLinkError::Config(format!(
                "circuit_breaker.failure_ratio must be in (0, 1], got {}",
                self.failure_ratio
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            initial_delay_ms: DEFAULT_RETRY_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            backoff_factor: DEFAULT_RETRY_BACKOFF_FACTOR,
        }
    }
}

impl RetrySettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(StoreLinkError::Config("retry.max_attempts must be > 0".into()));
        }
        if self.backoff_factor <= 0.0 {
            return Err(StoreLinkError::Config("retry.backoff_factor must be > 0".into()));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(StoreLinkError::Config(
                "retry.max_delay_ms must be >= retry.initial_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    /// Tokens are refreshed this long before they expire
    pub expiry_buffer_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            expiry_buffer_secs: DEFAULT_TOKEN_EXPIRY_BUFFER_SECS,
            request_timeout_secs: DEFAULT_TOKEN_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl TokenSettings {
    pub fn expiry_buffer(&self) -> Duration {
        Duration::from_secs(self.expiry_buffer_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_LEVEL.to_string(), json: false }
    }
}
