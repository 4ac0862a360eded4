//! Dynamics 365 Commerce adapter
//!
//! Talks to a Retail Server (Commerce Scale Unit) over OData with an Entra ID
//! client-credentials token.
//!
//! # Architecture
//!
//! - **Settings**: `CommerceSettings` parsed from the connector document,
//!   `CommercePolicies` from the application config
//! - **Client**: `CommerceClient` - token manager, circuit breaker
//!   (`d365-commerce-<storeId>`) and retry executor around every GET
//! - **Connector**: `D365CommerceConnector` - `RetailOperations` over the
//!   client
//! - **Models**: OData DTOs mapped to domain products and orders
//!
//! # Error Handling
//!
//! - 404: `NotFound`, not counted by the breaker
//! - 429/5xx, timeouts, connection failures: retried, then `RetryExhausted`
//! - 401 from Retail Server: cached token dropped, call retried with a new one
//! - Breaker open: `CircuitOpen` without touching the network

pub mod client;
pub mod connector;
pub mod models;
pub mod settings;

pub use client::CommerceClient;
pub use connector::{D365CommerceConnector, D365CommerceFactory};
pub use settings::{CommercePolicies, CommerceSettings};
