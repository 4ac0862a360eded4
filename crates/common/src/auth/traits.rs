//! Seam between the token cache and the authorization server

use async_trait::async_trait;

use super::token_manager::TokenManagerError;
use super::types::TokenResponse;

/// Performs one client-credentials grant.
///
/// Implemented by [`super::ClientCredentialsClient`] for real servers and by
/// counting fakes in tests.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Request a fresh token. Implementations must not cache.
    async fn request_token(&self) -> Result<TokenResponse, TokenManagerError>;
}

#[async_trait]
impl<T: TokenEndpoint + ?Sized> TokenEndpoint for std::sync::Arc<T> {
    async fn request_token(&self) -> Result<TokenResponse, TokenManagerError> {
        (**self).request_token().await
    }
}
