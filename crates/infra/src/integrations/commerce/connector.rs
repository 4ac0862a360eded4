//! Dynamics 365 Commerce connector

use std::time::Duration;

use async_trait::async_trait;
use storelink_core::{Connector, ConnectorFactory, RetailOperations};
use storelink_domain::constants::DEFAULT_BACKEND_TIMEOUT_SECS;
use storelink_domain::{
    AdapterKind, ConnectorConfig, Order, Product, ProductQuery, Result, StoreLinkError,
};
use tracing::info;

use super::client::{odata_key, odata_literal, CommerceClient};
use super::models::{ODataCollection, ProductDto, SalesOrderDto};
use super::settings::{CommercePolicies, CommerceSettings};

/// Retail connector backed by a Retail Server (Commerce Scale Unit).
///
/// Settings are validated when the factory builds the value; HTTP and token
/// clients are created by `initialize`.
#[derive(Debug)]
pub struct D365CommerceConnector {
    domain: String,
    store_id: String,
    settings: CommerceSettings,
    policies: CommercePolicies,
    client: Option<CommerceClient>,
}

impl D365CommerceConnector {
    pub fn new(config: &ConnectorConfig, policies: CommercePolicies) -> Result<Self> {
        Ok(Self {
            domain: config.domain.clone(),
            store_id: config.store_id.clone(),
            settings: CommerceSettings::from_config(config)?,
            policies,
            client: None,
        })
    }

    pub fn client(&self) -> Result<&CommerceClient> {
        match &self.client {
            Some(client) if !client.is_shut_down() => Ok(client),
            Some(_) => Err(StoreLinkError::Cancelled(format!(
                "connector for store {} is closed",
                self.store_id
            ))),
            None => Err(StoreLinkError::Internal(format!(
                "connector for store {} used before initialize",
                self.store_id
            ))),
        }
    }

    fn currency(&self) -> &str {
        &self.settings.currency
    }
}

#[async_trait]
impl Connector for D365CommerceConnector {
    fn domain(&self) -> &str {
        &self.domain
    }

    fn adapter_kind(&self) -> AdapterKind {
        AdapterKind::D365Commerce
    }

    async fn initialize(&mut self, config: &ConnectorConfig) -> Result<()> {
        let timeout = config
            .timeout()
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS));
        let client =
            CommerceClient::new(self.settings.clone(), &self.policies, &self.store_id, timeout)?;
        info!(
            store_id = %self.store_id,
            base_url = %self.settings.base_url,
            breaker = %client.breaker().name(),
            "Commerce connector initialized"
        );
        self.client = Some(client);
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        self.client()?.ping().await
    }

    async fn close(&self) -> Result<()> {
        if let Some(client) = &self.client {
            client.shutdown().await;
        }
        Ok(())
    }

    fn as_retail(&self) -> Option<&dyn RetailOperations> {
        Some(self)
    }
}

#[async_trait]
impl RetailOperations for D365CommerceConnector {
    async fn get_product(&self, product_id: &str) -> Result<Product> {
        let record_id: i64 = product_id.trim().parse().map_err(|_| {
            StoreLinkError::InvalidInput(format!("product id must be numeric, got '{product_id}'"))
        })?;

        let dto: ProductDto =
            self.client()?.get_json(&format!("Products({record_id})"), &[]).await?;
        Ok(dto.into_product(self.currency()))
    }

    async fn search_products(&self, query: &ProductQuery) -> Result<Vec<Product>> {
        let mut filters = Vec::new();
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            filters.push(format!(
                "contains(tolower(Name), {})",
                odata_literal(&search.trim().to_lowercase())
            ));
        }
        if let Some(category) = query.category.as_deref() {
            filters.push(format!("CategoryName eq {}", odata_literal(category)));
        }

        let mut params = vec![
            ("$top".to_string(), query.limit().to_string()),
            ("$skip".to_string(), query.offset().to_string()),
        ];
        if !filters.is_empty() {
            params.push(("$filter".to_string(), filters.join(" and ")));
        }

        let page: ODataCollection<ProductDto> =
            self.client()?.get_json("Products", &params).await?;
        Ok(page.value.into_iter().map(|dto| dto.into_product(self.currency())).collect())
    }

    async fn get_order(&self, order_id: &str) -> Result<Order> {
        let dto: SalesOrderDto =
            self.client()?.get_json(&odata_key("SalesOrders", order_id), &[]).await?;
        Ok(dto.into_order(self.currency()))
    }

    async fn list_orders(&self, customer_id: &str) -> Result<Vec<Order>> {
        let params =
            vec![("$filter".to_string(), format!("CustomerId eq {}", odata_literal(customer_id)))];
        let page: ODataCollection<SalesOrderDto> =
            self.client()?.get_json("SalesOrders", &params).await?;
        Ok(page.value.into_iter().map(|dto| dto.into_order(self.currency())).collect())
    }
}

/// Builds [`D365CommerceConnector`]s with shared resilience settings.
#[derive(Debug, Clone, Default)]
pub struct D365CommerceFactory {
    policies: CommercePolicies,
}

impl D365CommerceFactory {
    pub fn new(policies: CommercePolicies) -> Self {
        Self { policies }
    }
}

impl ConnectorFactory for D365CommerceFactory {
    fn create(&self, config: &ConnectorConfig) -> Result<Box<dyn Connector>> {
        Ok(Box::new(D365CommerceConnector::new(config, self.policies.clone())?))
    }
}
