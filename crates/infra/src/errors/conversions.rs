//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use storelink_common::{ResilienceError, RetryError, TokenManagerError};
use storelink_domain::StoreLinkError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub StoreLinkError);

impl From<InfraError> for StoreLinkError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<StoreLinkError> for InfraError {
    fn from(value: StoreLinkError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
pub trait IntoStoreLinkError {
    fn into_storelink(self) -> StoreLinkError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → StoreLinkError */
/* -------------------------------------------------------------------------- */

impl IntoStoreLinkError for HttpError {
    fn into_storelink(self) -> StoreLinkError {
        if self.is_timeout() {
            return StoreLinkError::Timeout("HTTP request timed out".into());
        }

        if self.is_connect() {
            return StoreLinkError::Network(format!("HTTP connection failure: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                404 => StoreLinkError::NotFound(message),
                _ => StoreLinkError::Backend { status: code, message },
            };
        }

        if self.is_decode() {
            return StoreLinkError::Backend {
                status: 200,
                message: format!("undecodable response body: {self}"),
            };
        }

        if self.is_builder() {
            return StoreLinkError::InvalidInput(format!("invalid HTTP request: {self}"));
        }

        StoreLinkError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_storelink())
    }
}

/* -------------------------------------------------------------------------- */
/* TokenManagerError → StoreLinkError */
/* -------------------------------------------------------------------------- */

impl IntoStoreLinkError for TokenManagerError {
    fn into_storelink(self) -> StoreLinkError {
        match self {
            TokenManagerError::Config(message) => {
                StoreLinkError::Config(format!("token configuration: {message}"))
            }
            other if other.is_transient() => StoreLinkError::TokenAcquisition(other.to_string()),
            other => StoreLinkError::Authentication(other.to_string()),
        }
    }
}

impl From<TokenManagerError> for InfraError {
    fn from(value: TokenManagerError) -> Self {
        InfraError(value.into_storelink())
    }
}

/* -------------------------------------------------------------------------- */
/* RetryError / ResilienceError → StoreLinkError */
/* -------------------------------------------------------------------------- */

impl IntoStoreLinkError for RetryError<StoreLinkError> {
    fn into_storelink(self) -> StoreLinkError {
        match self {
            RetryError::Exhausted { attempts, source } => {
                StoreLinkError::RetryExhausted { attempts, last_error: Box::new(source) }
            }
            RetryError::NonRetryable { source, .. } => source,
            RetryError::Cancelled { attempts } => {
                StoreLinkError::Cancelled(format!("cancelled after {attempts} attempt(s)"))
            }
            RetryError::InvalidConfiguration { message } => StoreLinkError::Config(message),
        }
    }
}

impl From<RetryError<StoreLinkError>> for InfraError {
    fn from(value: RetryError<StoreLinkError>) -> Self {
        InfraError(value.into_storelink())
    }
}

impl IntoStoreLinkError for ResilienceError<StoreLinkError> {
    fn into_storelink(self) -> StoreLinkError {
        match self {
            ResilienceError::CircuitOpen { name } => StoreLinkError::CircuitOpen { name },
            ResilienceError::TooManyRequests { name } => StoreLinkError::TooManyRequests { name },
            ResilienceError::OperationFailed { source } => source,
        }
    }
}

impl From<ResilienceError<StoreLinkError>> for InfraError {
    fn from(value: ResilienceError<StoreLinkError>) -> Self {
        InfraError(value.into_storelink())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → StoreLinkError */
/* -------------------------------------------------------------------------- */

impl IntoStoreLinkError for serde_json::Error {
    fn into_storelink(self) -> StoreLinkError {
        StoreLinkError::Backend { status: 200, message: format!("unexpected payload: {self}") }
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(value.into_storelink())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
