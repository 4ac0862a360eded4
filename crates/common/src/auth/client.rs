//! Client-credentials grant over reqwest

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use super::token_manager::TokenManagerError;
use super::traits::TokenEndpoint;
use super::types::{ClientCredentialsConfig, TokenResponse};

/// Upper bound on the error body echoed into [`TokenManagerError::Status`]
const MAX_ERROR_BODY: usize = 512;

/// Posts a form-encoded `client_credentials` grant to the configured token
/// endpoint.
#[derive(Debug, Clone)]
pub struct ClientCredentialsClient {
    config: ClientCredentialsConfig,
    http: Client,
}

impl ClientCredentialsClient {
    /// Build a client with its own connection pool and request timeout.
    pub fn new(config: ClientCredentialsConfig, timeout: Duration) -> Result<Self, TokenManagerError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TokenManagerError::Config(format!("failed to build HTTP client: {e}")))?;
        Self::with_client(config, http)
    }

    /// Reuse an existing reqwest client (shared pool).
    pub fn with_client(config: ClientCredentialsConfig, http: Client) -> Result<Self, TokenManagerError> {
        config.validate()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientCredentialsConfig {
        &self.config
    }
}

#[async_trait]
impl TokenEndpoint for ClientCredentialsClient {
    #[instrument(skip(self), fields(client_id = %self.config.client_id))]
    async fn request_token(&self) -> Result<TokenResponse, TokenManagerError> {
        let response = self
            .http
            .post(&self.config.token_endpoint)
            .form(&self.config.form_params())
            .send()
            .await
            .map_err(|e| TokenManagerError::Request(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| TokenManagerError::Request(e.to_string()))?;

        if status != StatusCode::OK {
            let mut body = body;
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(TokenManagerError::Status { status: status.as_u16(), body });
        }

        debug!("token endpoint answered");
        TokenResponse::parse(&body)
    }
}
