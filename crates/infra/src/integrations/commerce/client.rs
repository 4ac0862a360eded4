//! Retail Server client
//!
//! Every outbound call is composed as
//!
//! ```text
//! breaker.execute_filtered(retry.execute(token → GET → decode), counts_as_failure)
//! ```
//!
//! The breaker sees one outcome per logical call no matter how many
//! attempts the retry executor made. Answers that prove the backend is up
//! (404, other non-retryable 4xx, cancellation) are recorded as successes.

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use storelink_common::resilience::policies::PredicateRetry;
use storelink_common::{
    CircuitBreaker, ClientCredentialsClient, RetryConfig, RetryExecutor, TokenManager,
};
use storelink_domain::{Result, StoreLinkError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::settings::{CommercePolicies, CommerceSettings};
use crate::errors::InfraError;
use crate::http::HttpClient;

/// Header carrying the channel's operating unit number
const OPERATING_UNIT_HEADER: &str = "OUN";

pub struct CommerceClient {
    settings: CommerceSettings,
    http: HttpClient,
    tokens: TokenManager<ClientCredentialsClient>,
    breaker: CircuitBreaker,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl std::fmt::Debug for CommerceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceClient")
            .field("base_url", &self.settings.base_url)
            .field("breaker", &self.breaker.name())
            .field("closed", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl CommerceClient {
    pub fn new(
        settings: CommerceSettings,
        policies: &CommercePolicies,
        store_id: &str,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        let endpoint =
            ClientCredentialsClient::new(settings.credentials.clone(), policies.token.request_timeout())
                .map_err(|e| StoreLinkError::from(InfraError::from(e)))?;
        let tokens = TokenManager::new(endpoint, policies.token.expiry_buffer());
        let breaker = CircuitBreaker::new(policies.breaker_config(store_id)?)
            .map_err(|e| StoreLinkError::Config(e.to_string()))?;

        Ok(Self {
            settings,
            http,
            tokens,
            breaker,
            retry: policies.retry_config(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn settings(&self) -> &CommerceSettings {
        &self.settings
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn token_requests(&self) -> u64 {
        self.tokens.token_requests()
    }

    /// GET an OData resource through breaker, retry and token handling.
    #[instrument(skip(self, query), fields(breaker = %self.breaker.name()))]
    pub async fn get_json<T>(&self, path: &str, query: &[(String, String)]) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        let url = self.settings.endpoint(path);
        let url = url.as_str();
        let executor = RetryExecutor::new(
            self.retry.clone(),
            PredicateRetry::new(StoreLinkError::is_retryable),
        );
        let executor = &executor;
        let cancel = &self.cancel;

        self.breaker
            .execute_filtered(
                move || async move {
                    executor
                        .execute(move || self.attempt::<T>(url, query), cancel)
                        .await
                        .map_err(|e| StoreLinkError::from(InfraError::from(e)))
                },
                counts_as_failure,
            )
            .await
            .map_err(|e| InfraError::from(e).into())
    }

    async fn attempt<T: DeserializeOwned>(&self, url: &str, query: &[(String, String)]) -> Result<T> {
        let bearer = self
            .tokens
            .bearer_header()
            .await
            .map_err(|e| StoreLinkError::from(InfraError::from(e)))?;

        let request = self
            .http
            .request(Method::GET, url)
            .header(AUTHORIZATION, bearer)
            .header(OPERATING_UNIT_HEADER, &self.settings.operating_unit_number)
            .header(ACCEPT, "application/json")
            .query(&[("api-version", self.settings.api_version.as_str())])
            .query(query);

        let response = self.http.send_cancellable(request, &self.cancel).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(%url, "Retail Server rejected bearer token, refreshing");
            self.tokens.clear_token().await;
            return Err(StoreLinkError::TokenAcquisition("backend rejected bearer token".into()));
        }

        let response = HttpClient::expect_success(response).await?;
        let body = response.text().await.map_err(|e| StoreLinkError::from(InfraError::from(e)))?;
        debug!(%url, bytes = body.len(), "Retail Server response");
        serde_json::from_str(&body).map_err(|e| InfraError::from(e).into())
    }

    /// Anonymous Retail Server ping, bypassing breaker and retry.
    pub async fn ping(&self) -> Result<()> {
        let url = format!("{}/healthcheck", self.settings.base_url);
        let request = self.http.request(Method::GET, url).query(&[("testname", "ping")]);
        let response = self.http.send_cancellable(request, &self.cancel).await?;
        HttpClient::expect_success(response).await.map(|_| ()).map_err(|e| {
            StoreLinkError::HealthCheck(format!("Retail Server ping failed: {e}"))
        })
    }

    /// Cancel in-flight calls and forget the cached token.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tokens.clear_token().await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Whether an outcome says the backend is unhealthy.
fn counts_as_failure(err: &StoreLinkError) -> bool {
    matches!(err, StoreLinkError::RetryExhausted { .. }) || err.is_retryable()
}

/// Quote a value as an OData string literal.
pub fn odata_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// OData key segment with the key percent-encoded, e.g. `SalesOrders('SO%2F1')`.
pub fn odata_key(entity_set: &str, key: &str) -> String {
    format!("{entity_set}('{}')", urlencoding::encode(&key.replace('\'', "''")))
}
