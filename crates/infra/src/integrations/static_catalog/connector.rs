use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use storelink_core::{Connector, ConnectorFactory, RetailOperations, WishlistOperations};
use storelink_domain::{
    AdapterKind, ConnectorConfig, Order, Product, ProductQuery, Result, StoreLinkError, Wishlist,
    WishlistItem,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Connector whose catalog lives in its configuration document.
#[derive(Debug)]
pub struct StaticCatalogConnector {
    domain: String,
    products: Vec<Product>,
    orders: Vec<Order>,
    wishlists: RwLock<HashMap<String, Wishlist>>,
    closed: CancellationToken,
}

impl StaticCatalogConnector {
    pub fn new(domain: impl Into<String>, products: Vec<Product>, orders: Vec<Order>) -> Self {
        Self {
            domain: domain.into(),
            products,
            orders,
            wishlists: RwLock::new(HashMap::new()),
            closed: CancellationToken::new(),
        }
    }

    /// Parse `products` and `orders` from the document. Missing lists are empty.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self> {
        let products = parse_list::<Product>(config, "products")?;
        let orders = parse_list::<Order>(config, "orders")?;
        Ok(Self::new(config.domain.clone(), products, orders))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(StoreLinkError::Cancelled(format!("connector '{}' is closed", self.domain)));
        }
        Ok(())
    }

    fn ensure_known_product(&self, product_id: &str) -> Result<()> {
        if self.products.iter().any(|p| p.id == product_id) {
            Ok(())
        } else {
            Err(StoreLinkError::NotFound(format!("product {product_id}")))
        }
    }
}

fn parse_list<T: serde::de::DeserializeOwned>(config: &ConnectorConfig, key: &str) -> Result<Vec<T>> {
    match config.config.get(key) {
        None => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            StoreLinkError::Config(format!("connector {} has malformed '{key}': {e}", config.key()))
        }),
    }
}

fn require_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StoreLinkError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

#[async_trait]
impl Connector for StaticCatalogConnector {
    fn domain(&self) -> &str {
        &self.domain
    }

    fn adapter_kind(&self) -> AdapterKind {
        AdapterKind::StaticCatalog
    }

    async fn initialize(&mut self, _config: &ConnectorConfig) -> Result<()> {
        debug!(
            domain = %self.domain,
            products = self.products.len(),
            orders = self.orders.len(),
            "Static catalog loaded"
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        self.ensure_open()
            .map_err(|_| StoreLinkError::HealthCheck(format!("connector '{}' is closed", self.domain)))
    }

    async fn close(&self) -> Result<()> {
        self.closed.cancel();
        self.wishlists.write().clear();
        Ok(())
    }

    fn as_retail(&self) -> Option<&dyn RetailOperations> {
        Some(self)
    }

    fn as_wishlist(&self) -> Option<&dyn WishlistOperations> {
        Some(self)
    }
}

#[async_trait]
impl RetailOperations for StaticCatalogConnector {
    async fn get_product(&self, product_id: &str) -> Result<Product> {
        self.ensure_open()?;
        self.products
            .iter()
            .find(|p| p.id == product_id)
            .cloned()
            .ok_or_else(|| StoreLinkError::NotFound(format!("product {product_id}")))
    }

    async fn search_products(&self, query: &ProductQuery) -> Result<Vec<Product>> {
        self.ensure_open()?;
        Ok(self
            .products
            .iter()
            .filter(|p| query.matches(p))
            .skip(query.offset())
            .take(query.limit() as usize)
            .cloned()
            .collect())
    }

    async fn get_order(&self, order_id: &str) -> Result<Order> {
        self.ensure_open()?;
        self.orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
            .ok_or_else(|| StoreLinkError::NotFound(format!("order {order_id}")))
    }

    async fn list_orders(&self, customer_id: &str) -> Result<Vec<Order>> {
        self.ensure_open()?;
        require_id("customerId", customer_id)?;
        Ok(self.orders.iter().filter(|o| o.customer_id == customer_id).cloned().collect())
    }
}

#[async_trait]
impl WishlistOperations for StaticCatalogConnector {
    async fn get_wishlist(&self, customer_id: &str) -> Result<Wishlist> {
        self.ensure_open()?;
        require_id("customerId", customer_id)?;
        Ok(self
            .wishlists
            .read()
            .get(customer_id)
            .cloned()
            .unwrap_or_else(|| Wishlist::new(customer_id)))
    }

    async fn add_to_wishlist(&self, customer_id: &str, product_id: &str) -> Result<Wishlist> {
        self.ensure_open()?;
        require_id("customerId", customer_id)?;
        self.ensure_known_product(product_id)?;

        let mut wishlists = self.wishlists.write();
        let wishlist =
            wishlists.entry(customer_id.to_string()).or_insert_with(|| Wishlist::new(customer_id));
        if !wishlist.contains(product_id) {
            wishlist
                .items
                .push(WishlistItem { product_id: product_id.to_string(), added_at: Utc::now() });
        }
        Ok(wishlist.clone())
    }

    async fn remove_from_wishlist(&self, customer_id: &str, product_id: &str) -> Result<Wishlist> {
        self.ensure_open()?;
        require_id("customerId", customer_id)?;

        let mut wishlists = self.wishlists.write();
        match wishlists.get_mut(customer_id) {
            Some(wishlist) => {
                wishlist.items.retain(|item| item.product_id != product_id);
                Ok(wishlist.clone())
            }
            None => Ok(Wishlist::new(customer_id)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCatalogFactory;

impl ConnectorFactory for StaticCatalogFactory {
    fn create(&self, config: &ConnectorConfig) -> Result<Box<dyn Connector>> {
        Ok(Box::new(StaticCatalogConnector::from_config(config)?))
    }
}
