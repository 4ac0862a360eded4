//! OAuth 2.0 client-credentials token acquisition
//!
//! Backends that authenticate service-to-service (for example Dynamics 365
//! Commerce behind Entra ID) need a bearer token obtained with the
//! `client_credentials` grant. [`TokenManager`] caches one token per backend
//! configuration and refreshes it shortly before it expires.
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────────────┐
//! │   TokenManager   │ ───► │ TokenEndpoint (trait)    │
//! │  cache + refresh │      │  ClientCredentialsClient │ ──► POST <tokenEndpoint>
//! └──────────────────┘      └──────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - **[`types`]**: configuration, token response parsing, cached token
//! - **[`traits`]**: the [`TokenEndpoint`] seam used for testing
//! - **[`client`]**: reqwest-backed form POST against the token endpoint
//! - **[`token_manager`]**: cache with double-checked refresh

pub mod client;
pub mod token_manager;
pub mod traits;
pub mod types;

pub use client::ClientCredentialsClient;
pub use token_manager::{TokenManager, TokenManagerError};
pub use traits::TokenEndpoint;
pub use types::{CachedToken, ClientCredentialsConfig, TokenResponse};
