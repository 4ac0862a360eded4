//! Client-credentials configuration and token payloads

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::token_manager::TokenManagerError;

/// Settings for one client-credentials grant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCredentialsConfig {
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    /// Entra ID v1 `resource` parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// v2 `scope` parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl fmt::Debug for ClientCredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentialsConfig")
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("resource", &self.resource)
            .field("scope", &self.scope)
            .finish()
    }
}

impl ClientCredentialsConfig {
    pub fn new(
        token_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            token_endpoint: token_endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            resource: None,
            scope: None,
        }
    }

    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn validate(&self) -> Result<(), TokenManagerError> {
        let endpoint = self.token_endpoint.trim();
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(TokenManagerError::Config(format!(
                "token endpoint must be an http(s) URL, got '{}'",
                self.token_endpoint
            )));
        }
        if self.client_id.trim().is_empty() {
            return Err(TokenManagerError::Config("client id must not be empty".to_string()));
        }
        if self.client_secret.is_empty() {
            return Err(TokenManagerError::Config("client secret must not be empty".to_string()));
        }
        Ok(())
    }

    /// Form fields for the grant request.
    pub fn form_params(&self) -> Vec<(&'static str, &str)> {
        let mut params = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        if let Some(resource) = &self.resource {
            params.push(("resource", resource.as_str()));
        }
        if let Some(scope) = &self.scope {
            params.push(("scope", scope.as_str()));
        }
        params
    }
}

/// Validated token endpoint response.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds, always positive
    pub expires_in: u64,
    pub resource: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("resource", &self.resource)
            .finish()
    }
}

/// Wire shape; Entra ID v1 sends `expires_in` as a string.
#[derive(Deserialize)]
struct RawTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
    #[serde(default)]
    resource: Option<String>,
}

impl TokenResponse {
    /// Parse and validate a token endpoint body.
    pub fn parse(body: &str) -> Result<Self, TokenManagerError> {
        let raw: RawTokenResponse = serde_json::from_str(body)
            .map_err(|e| TokenManagerError::Parse(format!("invalid token response: {e}")))?;

        let access_token = raw.access_token.unwrap_or_default();
        if access_token.trim().is_empty() {
            return Err(TokenManagerError::EmptyAccessToken);
        }

        let expires_in = match raw.expires_in {
            Some(value) => parse_expires_in(&value)?,
            None => {
                return Err(TokenManagerError::InvalidExpiresIn("missing".to_string()));
            }
        };

        Ok(Self {
            access_token,
            token_type: raw.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_in,
            resource: raw.resource,
        })
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }
}

fn parse_expires_in(value: &serde_json::Value) -> Result<u64, TokenManagerError> {
    let seconds = match value {
        serde_json::Value::Number(number) => number.as_i64(),
        serde_json::Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };

    match seconds {
        Some(seconds) if seconds > 0 => Ok(seconds.unsigned_abs()),
        _ => Err(TokenManagerError::InvalidExpiresIn(value.to_string())),
    }
}

/// Token held by a [`super::TokenManager`].
#[derive(Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: Instant,
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl CachedToken {
    pub fn new(access_token: String, expires_at: Instant) -> Self {
        Self { access_token, expires_at }
    }

    /// Usable if it will not expire within `buffer` of `now`.
    pub fn is_valid(&self, now: Instant, buffer: Duration) -> bool {
        now.checked_add(buffer).is_some_and(|deadline| deadline < self.expires_at)
    }
}
