//! Shared test helpers for `storelink-core` integration tests.
//!
//! Lightweight mocks for the configuration store and for connectors, with
//! counters so tests can assert how often the registry drove each lifecycle
//! step.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use storelink_core::{Connector, ConnectorConfigStore, ConnectorFactory, RetailOperations};
use storelink_domain::{
    AdapterKind, ConnectorConfig, Order, Product, ProductQuery, Result, StoreLinkError,
};

pub const TENANT: &str = "acme";
pub const STORE: &str = "042";

pub fn retail_config() -> ConnectorConfig {
    ConnectorConfig::new(TENANT, STORE, "retail", AdapterKind::StaticCatalog)
        .with_url("https://commerce.example.test")
        .with_version("1.0")
}

/// In-memory configuration store counting lookups.
#[derive(Default)]
pub struct MockConfigStore {
    configs: Mutex<Vec<ConnectorConfig>>,
    finds: AtomicU32,
}

impl MockConfigStore {
    pub fn with(configs: Vec<ConnectorConfig>) -> Arc<Self> {
        Arc::new(Self { configs: Mutex::new(configs), finds: AtomicU32::new(0) })
    }

    pub fn finds(&self) -> u32 {
        self.finds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectorConfigStore for MockConfigStore {
    async fn find(
        &self,
        tenant_id: &str,
        store_id: &str,
        domain: &str,
    ) -> Result<Option<ConnectorConfig>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .configs
            .lock()
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.store_id == store_id && c.domain == domain)
            .cloned())
    }

    async fn list(&self, tenant_id: &str, store_id: &str) -> Result<Vec<ConnectorConfig>> {
        Ok(self
            .configs
            .lock()
            .iter()
            .filter(|c| c.tenant_id == tenant_id && c.store_id == store_id)
            .cloned()
            .collect())
    }
}

/// Lifecycle counters shared by a factory and every connector it builds.
#[derive(Debug, Default)]
pub struct Lifecycle {
    pub created: AtomicU32,
    pub initialized: AtomicU32,
    pub health_checks: AtomicU32,
    pub closed: AtomicU32,
}

impl Lifecycle {
    pub fn created(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn initialized(&self) -> u32 {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn health_checks(&self) -> u32 {
        self.health_checks.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u32 {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Behaviour {
    pub init_delay: Duration,
    pub health_delay: Duration,
    pub fail_init: bool,
    pub fail_health: bool,
}

#[derive(Clone, Default)]
pub struct MockFactory {
    pub lifecycle: Arc<Lifecycle>,
    pub behaviour: Behaviour,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behaviour(behaviour: Behaviour) -> Self {
        Self { lifecycle: Arc::new(Lifecycle::default()), behaviour }
    }
}

impl ConnectorFactory for MockFactory {
    fn create(&self, config: &ConnectorConfig) -> Result<Box<dyn Connector>> {
        let instance = self.lifecycle.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(MockConnector {
            domain: config.domain.clone(),
            instance,
            lifecycle: Arc::clone(&self.lifecycle),
            behaviour: self.behaviour,
        }))
    }
}

pub struct MockConnector {
    domain: String,
    instance: u32,
    lifecycle: Arc<Lifecycle>,
    behaviour: Behaviour,
}

#[async_trait]
impl Connector for MockConnector {
    fn domain(&self) -> &str {
        &self.domain
    }

    fn adapter_kind(&self) -> AdapterKind {
        AdapterKind::StaticCatalog
    }

    async fn initialize(&mut self, _config: &ConnectorConfig) -> Result<()> {
        if !self.behaviour.init_delay.is_zero() {
            tokio::time::sleep(self.behaviour.init_delay).await;
        }
        self.lifecycle.initialized.fetch_add(1, Ordering::SeqCst);
        if self.behaviour.fail_init {
            return Err(StoreLinkError::Network("backend unreachable".into()));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        self.lifecycle.health_checks.fetch_add(1, Ordering::SeqCst);
        if !self.behaviour.health_delay.is_zero() {
            tokio::time::sleep(self.behaviour.health_delay).await;
        }
        if self.behaviour.fail_health {
            return Err(StoreLinkError::HealthCheck("ping returned 503".into()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.lifecycle.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn as_retail(&self) -> Option<&dyn RetailOperations> {
        Some(self)
    }
}

#[async_trait]
impl RetailOperations for MockConnector {
    async fn get_product(&self, product_id: &str) -> Result<Product> {
        Ok(Product {
            id: product_id.to_string(),
            name: format!("instance-{}", self.instance),
            description: None,
            price: 9.99,
            currency: "USD".into(),
            category: None,
            available: true,
        })
    }

    async fn search_products(&self, _query: &ProductQuery) -> Result<Vec<Product>> {
        Ok(Vec::new())
    }

    async fn get_order(&self, order_id: &str) -> Result<Order> {
        Err(StoreLinkError::NotFound(format!("order {order_id}")))
    }

    async fn list_orders(&self, _customer_id: &str) -> Result<Vec<Order>> {
        Ok(Vec::new())
    }
}

/// Identity comparison that ignores vtable pointers.
pub fn same_instance(a: &Arc<dyn Connector>, b: &Arc<dyn Connector>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
