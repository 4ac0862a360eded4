//! Shared fixtures for infra integration tests.
#![allow(dead_code)]

use serde_json::json;
use storelink_domain::{
    AdapterKind, CircuitBreakerSettings, ConnectorConfig, RetrySettings, TokenSettings,
};
use storelink_infra::integrations::commerce::CommercePolicies;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "acme";
pub const STORE: &str = "042";
pub const TOKEN_PATH: &str = "/tenant-1/oauth2/token";

/// Commerce connector document pointing both the token endpoint and the
/// Retail Server at `server`.
pub fn commerce_config(server: &MockServer) -> ConnectorConfig {
    ConnectorConfig::new(TENANT, STORE, "retail", AdapterKind::D365Commerce)
        .with_url(server.uri())
        .with_version("9.52")
        .with_setting("tokenEndpoint", json!(format!("{}{TOKEN_PATH}", server.uri())))
        .with_setting("clientId", json!("storelink-app"))
        .with_setting("clientSecret", json!("s3cret"))
        .with_setting("resource", json!("https://commerce.dynamics.com"))
        .with_setting("operatingUnitNumber", json!("128"))
}

pub fn static_config(domain: &str) -> ConnectorConfig {
    ConnectorConfig::new(TENANT, STORE, domain, AdapterKind::StaticCatalog)
        .with_version("1.0")
        .with_setting(
            "products",
            json!([
                { "id": "mug", "name": "Coffee Mug", "price": 12.5, "currency": "USD", "category": "Kitchen" },
                { "id": "scarf", "name": "Wool Scarf", "price": 25.0, "currency": "USD" }
            ]),
        )
        .with_setting(
            "orders",
            json!([{ "id": "SO-1", "customerId": "c-1", "status": "shipped", "total": 12.5 }]),
        )
}

/// Millisecond backoff and a breaker that trips after two failed calls.
pub fn fast_policies() -> CommercePolicies {
    CommercePolicies {
        circuit_breaker: CircuitBreakerSettings {
            interval_secs: 60,
            timeout_secs: 60,
            max_requests: 1,
            min_requests: 2,
            failure_ratio: 0.5,
        },
        retry: RetrySettings {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_factor: 2.0,
        },
        token: TokenSettings::default(),
    }
}

pub async fn mount_token(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": "3599"
        })))
        .mount(server)
        .await;
}

pub async fn mount_ping(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/healthcheck"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

pub fn product_body(record_id: i64, name: &str) -> serde_json::Value {
    json!({
        "RecordId": record_id,
        "ItemId": "0001",
        "Name": name,
        "Price": 19.99,
        "CategoryName": "Kitchen"
    })
}
