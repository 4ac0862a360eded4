//! Catalog served from the connector document
//!
//! `static-catalog` connectors read their products and orders from the
//! document's `config` map (`products`, `orders`) and keep wishlists in
//! memory. Used for demo stores and for exercising the registry without a
//! backend.

mod connector;

pub use connector::{StaticCatalogConnector, StaticCatalogFactory};
