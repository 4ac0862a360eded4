//! # StoreLink Core
//!
//! Ports and orchestration - no HTTP or storage code.
//!
//! This crate contains:
//! - The adapter contract ([`Connector`] plus domain extension traits)
//! - The configuration store port
//! - The [`ConnectorRegistry`] that resolves, caches and evicts connectors
//!
//! ## Architecture Principles
//! - Only depends on `storelink-common` and `storelink-domain`
//! - Adapters and stores live in `storelink-infra`, reached through traits

pub mod connector;
pub mod registry;

pub use connector::{
    Capability, Connector, ConnectorConfigStore, RetailOperations, WishlistOperations,
};
pub use registry::{ConnectorFactory, ConnectorRegistry, EvictionTask, FactoryRegistry};
