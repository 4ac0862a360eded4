//! Adapter settings read from the connector document

use storelink_common::{CircuitBreakerConfig, ClientCredentialsConfig, RetryConfig};
use storelink_domain::{
    AppConfig, CircuitBreakerSettings, ConnectorConfig, Result, RetrySettings, StoreLinkError,
    TokenSettings,
};

use crate::errors::IntoStoreLinkError;

pub const DEFAULT_API_VERSION: &str = "7.3";
pub const DEFAULT_CURRENCY: &str = "USD";

/// Per-connector settings.
///
/// Keys in the document's `config` map: `tokenEndpoint`, `clientId`,
/// `clientSecret`, `resource`, `operatingUnitNumber`, and optionally
/// `apiVersion` and `currency`. The Retail Server base URL is the document's
/// `url`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommerceSettings {
    pub base_url: String,
    pub credentials: ClientCredentialsConfig,
    pub operating_unit_number: String,
    pub api_version: String,
    pub currency: String,
}

impl CommerceSettings {
    pub fn from_config(config: &ConnectorConfig) -> Result<Self> {
        let base_url = config.url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(StoreLinkError::Config(format!(
                "connector {} needs an http(s) url, got '{}'",
                config.key(),
                config.url
            )));
        }

        let credentials = ClientCredentialsConfig::new(
            config.required_str("tokenEndpoint")?,
            config.required_str("clientId")?,
            config.required_str("clientSecret")?,
        )
        .with_resource(config.required_str("resource")?);
        credentials.validate().map_err(IntoStoreLinkError::into_storelink)?;

        Ok(Self {
            base_url,
            credentials,
            operating_unit_number: config.required_str("operatingUnitNumber")?,
            api_version: config
                .setting::<String>("apiVersion")
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            currency: config
                .setting::<String>("currency")
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        })
    }

    /// Absolute URL of a Retail Server OData path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/Commerce/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Resilience and token settings shared by every commerce connector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommercePolicies {
    pub circuit_breaker: CircuitBreakerSettings,
    pub retry: RetrySettings,
    pub token: TokenSettings,
}

impl CommercePolicies {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            circuit_breaker: config.circuit_breaker.clone(),
            retry: config.retry.clone(),
            token: config.token.clone(),
        }
    }

    /// Breaker for one store, named `d365-commerce-<storeId>`.
    pub fn breaker_config(&self, store_id: &str) -> Result<CircuitBreakerConfig> {
        let settings = &self.circuit_breaker;
        CircuitBreakerConfig::builder()
            .name(format!("d365-commerce-{store_id}"))
            .max_requests(settings.max_requests)
            .interval(settings.interval())
            .timeout(settings.timeout())
            .min_requests(settings.min_requests)
            .failure_ratio(settings.failure_ratio)
            .build()
            .map_err(|e| StoreLinkError::Config(e.to_string()))
    }

    pub fn retry_config(&self) -> RetryConfig {
        let settings = &self.retry;
        RetryConfig::exponential(
            settings.max_attempts,
            settings.initial_delay(),
            settings.max_delay(),
            settings.backoff_factor,
        )
    }
}
