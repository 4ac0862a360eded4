use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, StatusCode};
use storelink_domain::constants::{DEFAULT_BACKEND_TIMEOUT_SECS, USER_AGENT};
use storelink_domain::{Result, StoreLinkError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::InfraError;

/// Longest backend error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Thin reqwest wrapper mapping transport and status failures onto
/// [`StoreLinkError`].
///
/// Retrying is left to the caller's `RetryExecutor` so every attempt passes
/// through the circuit breaker accounting in one place.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the request once.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder.build().map_err(|err| StoreLinkError::from(InfraError::from(err)))?;

        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                debug!(%method, %url, status = %response.status(), "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                Err(InfraError::from(err).into())
            }
        }
    }

    /// Execute the request, abandoning it as soon as `cancel` fires.
    pub async fn send_cancellable(
        &self,
        builder: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(StoreLinkError::Cancelled("HTTP request cancelled".into()))
            }
            result = self.send(builder) => result,
        }
    }

    /// Pass 2xx responses through; turn everything else into an error.
    ///
    /// 404 becomes `NotFound`. Other statuses become `Backend`, which is
    /// retryable for 429 and 5xx only.
    pub async fn expect_success(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

/// Map a non-success status and its body to a domain error.
pub fn status_error(status: StatusCode, body: &str) -> StoreLinkError {
    let detail = truncate(body.trim(), MAX_ERROR_BODY);
    let message = if detail.is_empty() {
        status.canonical_reason().unwrap_or("unknown status").to_string()
    } else {
        detail.to_string()
    };

    match status {
        StatusCode::NOT_FOUND => StoreLinkError::NotFound(message),
        _ => StoreLinkError::Backend { status: status.as_u16(), message },
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: String,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS),
            user_agent: USER_AGENT.to_string(),
            default_headers: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let mut builder =
            ReqwestClient::builder().timeout(self.timeout).user_agent(self.user_agent).no_proxy();

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            StoreLinkError::from(infra)
        })?;

        Ok(HttpClient { client })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn sends_user_agent_and_returns_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let response = client.send(client.request(Method::GET, server.uri())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn expect_success_maps_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let response = client.send(client.request(Method::GET, server.uri())).await.unwrap();
        let err = HttpClient::expect_success(response).await.unwrap_err();

        assert_eq!(err, StoreLinkError::Backend { status: 503, message: "maintenance".into() });
        assert!(err.is_retryable());
    }

    #[test]
    fn status_error_classifies_client_errors() {
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, ""),
            StoreLinkError::NotFound("Not Found".into())
        );

        let bad = status_error(StatusCode::BAD_REQUEST, "missing $filter");
        assert!(!bad.is_retryable());
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
    }

    #[test]
    fn long_bodies_are_truncated_on_char_boundary() {
        let body = "é".repeat(400);
        match status_error(StatusCode::BAD_GATEWAY, &body) {
            StoreLinkError::Backend { message, .. } => {
                assert!(message.len() <= MAX_ERROR_BODY);
                assert!(message.chars().all(|c| c == 'é'));
            }
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn times_out_slow_backends() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = HttpClient::builder().timeout(Duration::from_millis(50)).build().unwrap();
        let err = client.send(client.request(Method::GET, server.uri())).await.unwrap_err();

        assert!(matches!(err, StoreLinkError::Timeout(_)));
    }

    #[tokio::test]
    async fn cancellation_abandons_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = client
            .send_cancellable(client.request(Method::GET, server.uri()), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreLinkError::Cancelled(_)));
    }
}
