//! Retail Server OData payloads and their mapping to domain models

use chrono::{DateTime, Utc};
use serde::Deserialize;
use storelink_domain::{Order, OrderLine, OrderStatus, Product};

/// OData collection envelope (`{"value": [...]}`)
#[derive(Debug, Deserialize)]
pub struct ODataCollection<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProductDto {
    pub record_id: i64,
    #[serde(default)]
    pub item_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub adjusted_price: Option<f64>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub is_discontinued: bool,
}

impl ProductDto {
    pub fn into_product(self, currency: &str) -> Product {
        Product {
            id: self.record_id.to_string(),
            name: self.name,
            description: self.description.filter(|d| !d.trim().is_empty()),
            price: self.adjusted_price.unwrap_or(self.price),
            currency: currency.to_string(),
            category: self.category_name,
            available: !self.is_discontinued,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SalesLineDto {
    pub product_id: i64,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SalesOrderDto {
    pub id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub status_value: Option<i32>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub sales_lines: Vec<SalesLineDto>,
    #[serde(default)]
    pub created_date_time: Option<DateTime<Utc>>,
}

/// Retail Server `SalesStatus` values
fn order_status(value: Option<i32>) -> OrderStatus {
    match value {
        Some(2) | Some(6) => OrderStatus::Processing,
        Some(3) => OrderStatus::Shipped,
        Some(4) => OrderStatus::Completed,
        Some(5) => OrderStatus::Cancelled,
        _ => OrderStatus::Pending,
    }
}

impl SalesOrderDto {
    pub fn into_order(self, default_currency: &str) -> Order {
        Order {
            id: self.id,
            customer_id: self.customer_id.unwrap_or_default(),
            status: order_status(self.status_value),
            total: self.total_amount,
            currency: self
                .currency_code
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| default_currency.to_string()),
            lines: self
                .sales_lines
                .into_iter()
                .map(|line| OrderLine {
                    product_id: line.product_id.to_string(),
                    quantity: line.quantity.max(0.0).round() as u32,
                    unit_price: line.price,
                })
                .collect(),
            created_at: self.created_date_time,
        }
    }
}
