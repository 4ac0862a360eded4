//! Retail domain models returned by connectors implementing the retail
//! extension.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sellable product as exposed to callers, independent of backend shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

/// Product search parameters. Pagination is 1-based.
///
/// A `page_size` of zero is treated as one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self { search: None, category: None, page: 1, page_size: 20 }
    }
}

impl ProductQuery {
    pub fn search(text: impl Into<String>) -> Self {
        Self { search: Some(text.into()), ..Self::default() }
    }

    /// Records per page, never zero.
    pub fn limit(&self) -> u32 {
        self.page_size.max(1)
    }

    /// Number of records to skip for the current page.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) as usize * self.limit() as usize
    }

    /// Case-insensitive match used by in-memory catalogs.
    pub fn matches(&self, product: &Product) -> bool {
        let search_ok = self.search.as_deref().map_or(true, |needle| {
            let needle = needle.to_lowercase();
            product.name.to_lowercase().contains(&needle)
                || product
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
        });
        let category_ok = self.category.as_deref().map_or(true, |wanted| {
            product.category.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(wanted))
        });
        search_ok && category_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Completed,
    Cancelled,
}

crate::impl_domain_status_conversions!(OrderStatus {
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl Serialize for OrderStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub status: OrderStatus,
    pub total: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub lines: Vec<OrderLine>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
