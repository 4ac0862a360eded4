//! # StoreLink Infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - HTTP client wrapper and error conversions
//! - Application configuration loader (TOML/JSON + environment)
//! - Connector configuration stores (in-memory, JSON file)
//! - Adapters: Dynamics 365 Commerce (OData), static catalog
//! - Logging and registry bootstrap
//!
//! ## Architecture
//! - Implements traits defined in `storelink-core`
//! - Depends on `storelink-common`, `storelink-domain` and `storelink-core`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod bootstrap;
pub mod config;
pub mod config_store;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod observability;

// Re-export commonly used items
pub use bootstrap::{default_registry, registry_with_adapters};
pub use config_store::{InMemoryConfigStore, JsonFileConfigStore};
pub use errors::{InfraError, IntoStoreLinkError};
pub use http::{HttpClient, HttpClientBuilder};
pub use integrations::commerce::{D365CommerceConnector, D365CommerceFactory};
pub use integrations::static_catalog::{StaticCatalogConnector, StaticCatalogFactory};
pub use observability::init_logging;
