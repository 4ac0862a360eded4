//! Error types used throughout the connector framework

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for StoreLink
///
/// Resolution errors (`ConnectorNotFound`, `ConnectorDisabled`,
/// `UnknownAdapterKind`, `Initialization`) surface directly from the registry.
/// Everything else originates in an adapter talking to its backend.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum StoreLinkError {
    #[error("Connector not found: {key}")]
    ConnectorNotFound { key: String },

    #[error("Connector disabled: {key}")]
    ConnectorDisabled { key: String },

    #[error("Unknown adapter kind: {0}")]
    UnknownAdapterKind(String),

    #[error("Connector initialization failed for {key}: {message}")]
    Initialization { key: String, message: String },

    #[error("Health check failed: {0}")]
    HealthCheck(String),

    #[error("Circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    #[error("Circuit breaker '{name}' rejected request: half-open trial budget exhausted")]
    TooManyRequests { name: String },

    #[error("Token acquisition failed: {0}")]
    TokenAcquisition(String),

    /// The identity provider rejected the credentials or answered with an
    /// unusable token; retrying will not help until the document changes.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: Box<StoreLinkError> },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration store error: {0}")]
    ConfigStore(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Connector registry is shut down")]
    Shutdown,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by callers to pick a user-visible response.
///
/// `Unavailable` is the "service unavailable" class: the connector exists and
/// is configured, but the backend cannot be reached right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    NotFound,
    Disabled,
    Misconfigured,
    Unavailable,
    InvalidRequest,
    Internal,
}

crate::impl_domain_status_conversions!(ErrorClass {
    NotFound => "not_found",
    Disabled => "disabled",
    Misconfigured => "misconfigured",
    Unavailable => "unavailable",
    InvalidRequest => "invalid_request",
    Internal => "internal",
});

impl StoreLinkError {
    /// Classify the error for callers that need to distinguish permanent
    /// misconfiguration from transient backend unavailability.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ConnectorNotFound { .. } | Self::NotFound(_) => ErrorClass::NotFound,
            Self::ConnectorDisabled { .. } => ErrorClass::Disabled,
            Self::UnknownAdapterKind(_)
            | Self::Config(_)
            | Self::Unsupported(_)
            | Self::Authentication(_) => ErrorClass::Misconfigured,
            Self::InvalidInput(_) => ErrorClass::InvalidRequest,
            Self::Backend { status, .. } if (400..500).contains(status) && *status != 429 => {
                ErrorClass::InvalidRequest
            }
            Self::Initialization { .. }
            | Self::HealthCheck(_)
            | Self::CircuitOpen { .. }
            | Self::TooManyRequests { .. }
            | Self::TokenAcquisition(_)
            | Self::RetryExhausted { .. }
            | Self::Cancelled(_)
            | Self::Timeout(_)
            | Self::Network(_)
            | Self::Backend { .. }
            | Self::ConfigStore(_)
            | Self::Shutdown => ErrorClass::Unavailable,
            Self::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Whether retrying the same call could plausibly succeed.
    ///
    /// Breaker rejections are not retryable: retrying against an open circuit
    /// only burns attempts.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::TokenAcquisition(_) => true,
            Self::Backend { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// The innermost error, looking through `RetryExhausted` wrappers.
    pub fn root_cause(&self) -> &StoreLinkError {
        match self {
            Self::RetryExhausted { last_error, .. } => last_error.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for StoreLink operations
pub type Result<T> = std::result::Result<T, StoreLinkError>;
