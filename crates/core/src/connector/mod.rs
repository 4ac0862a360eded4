//! Connector ports
//!
//! A connector is one live adapter instance bound to a tenant/store/domain.
//! Every connector implements the base [`Connector`] lifecycle; domain
//! extensions ([`RetailOperations`], [`WishlistOperations`]) are discovered
//! through the typed `as_*` accessors instead of downcasting.

pub mod config_store;
pub mod ports;

pub use config_store::ConnectorConfigStore;
pub use ports::{Capability, Connector, RetailOperations, WishlistOperations};
