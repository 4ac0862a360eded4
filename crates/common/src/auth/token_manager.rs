//! Bearer token cache with double-checked refresh
//!
//! Readers take the shared lock and return the cached token while it is
//! still valid for at least `expiry_buffer`. Otherwise they queue for the
//! exclusive lock, re-check (another caller may have refreshed in the
//! meantime) and only then hit the token endpoint. Concurrent callers on an
//! empty cache therefore issue a single token request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::traits::TokenEndpoint;
use super::types::CachedToken;
use crate::time::{Clock, SystemClock};

/// Errors raised while acquiring a token
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenManagerError {
    /// Transport failure talking to the token endpoint
    #[error("Token request failed: {0}")]
    Request(String),

    #[error("Token endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Token endpoint returned an empty access_token")]
    EmptyAccessToken,

    #[error("Token endpoint returned an invalid expires_in: {0}")]
    InvalidExpiresIn(String),

    #[error("Failed to parse token response: {0}")]
    Parse(String),

    #[error("Invalid token configuration: {0}")]
    Config(String),
}

impl TokenManagerError {
    /// Whether a later attempt could succeed without a configuration change.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Caches one bearer token for one backend configuration.
pub struct TokenManager<T: TokenEndpoint, C: Clock = SystemClock> {
    endpoint: T,
    clock: C,
    expiry_buffer: Duration,
    cached: RwLock<Option<CachedToken>>,
    requests: AtomicU64,
}

impl<T: TokenEndpoint, C: Clock> std::fmt::Debug for TokenManager<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("expiry_buffer", &self.expiry_buffer)
            .field("requests", &self.requests.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<T: TokenEndpoint> TokenManager<T, SystemClock> {
    pub fn new(endpoint: T, expiry_buffer: Duration) -> Self {
        Self::with_clock(endpoint, expiry_buffer, SystemClock)
    }
}

impl<T: TokenEndpoint, C: Clock> TokenManager<T, C> {
    pub fn with_clock(endpoint: T, expiry_buffer: Duration, clock: C) -> Self {
        Self {
            endpoint,
            clock,
            expiry_buffer,
            cached: RwLock::new(None),
            requests: AtomicU64::new(0),
        }
    }

    /// Return a token valid for at least the expiry buffer, refreshing it
    /// if needed.
    pub async fn get_valid_bearer_token(&self) -> Result<String, TokenManagerError> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = self.usable(cached.as_ref()) {
                return Ok(token);
            }
        }

        let mut cached = self.cached.write().await;
        if let Some(token) = self.usable(cached.as_ref()) {
            debug!("token refreshed by a concurrent caller");
            return Ok(token);
        }

        self.requests.fetch_add(1, Ordering::Relaxed);
        let response = self.endpoint.request_token().await.inspect_err(|e| {
            warn!(error = %e, "token acquisition failed");
        })?;

        let lifetime = response.lifetime();
        if lifetime <= self.expiry_buffer {
            warn!(
                ?lifetime,
                buffer = ?self.expiry_buffer,
                "token lifetime is shorter than the expiry buffer; every call will refresh"
            );
        }

        let expires_at = self.clock.now() + lifetime;
        let access_token = response.access_token;
        *cached = Some(CachedToken::new(access_token.clone(), expires_at));
        info!(expires_in_secs = lifetime.as_secs(), "acquired bearer token");

        Ok(access_token)
    }

    /// `Authorization` header value.
    pub async fn bearer_header(&self) -> Result<String, TokenManagerError> {
        Ok(format!("Bearer {}", self.get_valid_bearer_token().await?))
    }

    /// Drop the cached token so the next call requests a new one.
    pub async fn clear_token(&self) {
        *self.cached.write().await = None;
        debug!("cached token cleared");
    }

    pub async fn cached_expiry(&self) -> Option<Instant> {
        self.cached.read().await.as_ref().map(|token| token.expires_at)
    }

    /// Number of token requests issued so far.
    pub fn token_requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    fn usable(&self, token: Option<&CachedToken>) -> Option<String> {
        token
            .filter(|token| token.is_valid(self.clock.now(), self.expiry_buffer))
            .map(|token| token.access_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::auth::types::TokenResponse;
    use crate::time::MockClock;

    /// Issues `token-<n>` and counts calls.
    #[derive(Default)]
    struct CountingEndpoint {
        calls: AtomicU32,
        expires_in: u64,
        delay: Duration,
    }

    impl CountingEndpoint {
        fn new(expires_in: u64) -> Self {
            Self { expires_in, ..Self::default() }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenEndpoint for CountingEndpoint {
        async fn request_token(&self) -> Result<TokenResponse, TokenManagerError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(TokenResponse {
                access_token: format!("token-{n}"),
                token_type: "Bearer".to_string(),
                expires_in: self.expires_in,
                resource: None,
            })
        }
    }

    struct FailingEndpoint;

    #[async_trait]
    impl TokenEndpoint for FailingEndpoint {
        async fn request_token(&self) -> Result<TokenResponse, TokenManagerError> {
            Err(TokenManagerError::Status { status: 401, body: "invalid_client".to_string() })
        }
    }

    #[tokio::test]
    async fn second_call_within_buffer_uses_cache() {
        let endpoint = Arc::new(CountingEndpoint::new(3600));
        let manager = TokenManager::with_clock(
            Arc::clone(&endpoint),
            Duration::from_secs(300),
            MockClock::new(),
        );

        assert_eq!(manager.get_valid_bearer_token().await.unwrap(), "token-1");
        assert_eq!(manager.get_valid_bearer_token().await.unwrap(), "token-1");
        assert_eq!(endpoint.calls(), 1);
        assert_eq!(manager.token_requests(), 1);
    }

    #[tokio::test]
    async fn refreshes_once_inside_expiry_buffer() {
        let clock = MockClock::new();
        let endpoint = Arc::new(CountingEndpoint::new(3600));
        let manager =
            TokenManager::with_clock(Arc::clone(&endpoint), Duration::from_secs(300), clock.clone());

        manager.get_valid_bearer_token().await.unwrap();
        clock.advance(Duration::from_secs(3299));
        assert_eq!(manager.get_valid_bearer_token().await.unwrap(), "token-1");

        clock.advance(Duration::from_secs(1));
        assert_eq!(manager.get_valid_bearer_token().await.unwrap(), "token-2");
        assert_eq!(endpoint.calls(), 2);
    }

    #[tokio::test]
    async fn clear_token_forces_new_request() {
        let endpoint = Arc::new(CountingEndpoint::new(3600));
        let manager = TokenManager::new(Arc::clone(&endpoint), Duration::from_secs(300));

        manager.get_valid_bearer_token().await.unwrap();
        assert!(manager.cached_expiry().await.is_some());

        manager.clear_token().await;
        assert!(manager.cached_expiry().await.is_none());

        assert_eq!(manager.bearer_header().await.unwrap(), "Bearer token-2");
        assert_eq!(endpoint.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_request() {
        let endpoint = Arc::new(CountingEndpoint {
            expires_in: 3600,
            delay: Duration::from_millis(50),
            ..CountingEndpoint::default()
        });
        let manager =
            Arc::new(TokenManager::new(Arc::clone(&endpoint), Duration::from_secs(300)));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.get_valid_bearer_token().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "token-1");
        }
        assert_eq!(endpoint.calls(), 1);
    }

    #[tokio::test]
    async fn failures_leave_cache_empty() {
        let manager = TokenManager::new(FailingEndpoint, Duration::from_secs(300));

        let err = manager.get_valid_bearer_token().await.unwrap_err();

        assert_eq!(err, TokenManagerError::Status { status: 401, body: "invalid_client".into() });
        assert!(!err.is_transient());
        assert!(manager.cached_expiry().await.is_none());
    }

    #[test]
    fn transient_classification() {
        assert!(TokenManagerError::Request("reset".into()).is_transient());
        assert!(TokenManagerError::Status { status: 503, body: String::new() }.is_transient());
        assert!(!TokenManagerError::EmptyAccessToken.is_transient());
    }
}
