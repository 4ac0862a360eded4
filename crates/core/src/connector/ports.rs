//! Adapter contract

use async_trait::async_trait;
use storelink_domain::{
    AdapterKind, ConnectorConfig, Order, Product, ProductQuery, Result, Wishlist,
};

/// Domain extension supported by a connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Retail,
    Wishlist,
}

storelink_domain::impl_domain_status_conversions!(Capability {
    Retail => "retail",
    Wishlist => "wishlist",
});

/// Base capability every adapter provides.
///
/// The registry drives the lifecycle: the factory builds the value,
/// [`Connector::initialize`] runs once before the instance is shared, and
/// [`Connector::close`] runs once when the instance leaves the cache.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Functional area served, e.g. `retail`
    fn domain(&self) -> &str;

    fn adapter_kind(&self) -> AdapterKind;

    /// Prepare backend clients. Called exactly once, before the connector is
    /// cached.
    async fn initialize(&mut self, config: &ConnectorConfig) -> Result<()>;

    /// Cheap reachability probe against the backend.
    async fn health_check(&self) -> Result<()>;

    /// Release backend resources. Must tolerate in-flight calls failing.
    async fn close(&self) -> Result<()>;

    fn as_retail(&self) -> Option<&dyn RetailOperations> {
        None
    }

    fn as_wishlist(&self) -> Option<&dyn WishlistOperations> {
        None
    }

    fn capabilities(&self) -> Vec<Capability> {
        let mut capabilities = Vec::new();
        if self.as_retail().is_some() {
            capabilities.push(Capability::Retail);
        }
        if self.as_wishlist().is_some() {
            capabilities.push(Capability::Wishlist);
        }
        capabilities
    }
}

/// Catalog and order retrieval
#[async_trait]
pub trait RetailOperations: Send + Sync {
    async fn get_product(&self, product_id: &str) -> Result<Product>;

    async fn search_products(&self, query: &ProductQuery) -> Result<Vec<Product>>;

    async fn get_order(&self, order_id: &str) -> Result<Order>;

    async fn list_orders(&self, customer_id: &str) -> Result<Vec<Order>>;
}

/// Customer wishlists. Mutations return the updated list.
#[async_trait]
pub trait WishlistOperations: Send + Sync {
    async fn get_wishlist(&self, customer_id: &str) -> Result<Wishlist>;

    async fn add_to_wishlist(&self, customer_id: &str, product_id: &str) -> Result<Wishlist>;

    async fn remove_from_wishlist(&self, customer_id: &str, product_id: &str) -> Result<Wishlist>;
}
