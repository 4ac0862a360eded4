//! Connector configuration documents and cache identity

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, StoreLinkError};

/// Identity of a connector: `tenantId:storeId:domain`.
///
/// This is also the registry cache key, so it must stay stable for the
/// lifetime of the tenant/store/domain triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorKey {
    pub tenant_id: String,
    pub store_id: String,
    pub domain: String,
}

impl ConnectorKey {
    pub fn new(
        tenant_id: impl Into<String>,
        store_id: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self { tenant_id: tenant_id.into(), store_id: store_id.into(), domain: domain.into() }
    }

    /// Reject empty or separator-bearing components so keys cannot collide.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("tenantId", &self.tenant_id),
            ("storeId", &self.store_id),
            ("domain", &self.domain),
        ] {
            if value.trim().is_empty() {
                return Err(StoreLinkError::InvalidInput(format!("{field} must not be empty")));
            }
            if value.contains(':') {
                return Err(StoreLinkError::InvalidInput(format!(
                    "{field} must not contain ':' (got '{value}')"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConnectorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.tenant_id, self.store_id, self.domain)
    }
}

/// Adapter implementations known to this build.
///
/// Configuration documents carry the kind as a string; it is parsed with
/// [`ConnectorConfig::kind`] so unknown kinds fail with
/// `UnknownAdapterKind` instead of silently missing a factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AdapterKind {
    /// Dynamics 365 Commerce Retail Server (OData + Entra ID client credentials)
    D365Commerce,
    /// Catalog served from the connector document itself
    StaticCatalog,
}

crate::impl_domain_status_conversions!(AdapterKind {
    D365Commerce => "d365-commerce",
    StaticCatalog => "static-catalog",
});

impl AdapterKind {
    pub const ALL: [AdapterKind; 2] = [AdapterKind::D365Commerce, AdapterKind::StaticCatalog];
}

impl Serialize for AdapterKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AdapterKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn default_enabled() -> bool {
    true
}

/// Connector definition as stored in the external configuration store.
///
/// Read-only once fetched; the registry never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorConfig {
    pub store_id: String,
    pub tenant_id: String,
    pub domain: String,
    #[serde(default)]
    pub url: String,
    pub adapter_kind: String,
    #[serde(default)]
    pub version: String,
    /// Adapter-specific settings, opaque to the registry
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Per-call timeout in milliseconds (0 = adapter default)
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default)]
    pub priority: i32,
}

impl ConnectorConfig {
    pub fn new(
        tenant_id: impl Into<String>,
        store_id: impl Into<String>,
        domain: impl Into<String>,
        adapter_kind: AdapterKind,
    ) -> Self {
        Self {
            store_id: store_id.into(),
            tenant_id: tenant_id.into(),
            domain: domain.into(),
            url: String::new(),
            adapter_kind: adapter_kind.to_string(),
            version: String::new(),
            config: HashMap::new(),
            enabled: true,
            timeout_ms: 0,
            priority: 0,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn key(&self) -> ConnectorKey {
        ConnectorKey::new(&self.tenant_id, &self.store_id, &self.domain)
    }

    /// Parse the adapter kind carried by the document.
    pub fn kind(&self) -> Result<AdapterKind> {
        self.adapter_kind
            .parse()
            .map_err(|_| StoreLinkError::UnknownAdapterKind(self.adapter_kind.clone()))
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Typed access to an adapter setting.
    pub fn setting<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config.get(key).and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// String setting that must be present and non-empty.
    pub fn required_str(&self, key: &str) -> Result<String> {
        match self.config.get(key).and_then(serde_json::Value::as_str) {
            Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
            _ => Err(StoreLinkError::Config(format!(
                "connector {} is missing required setting '{key}'",
                self.key()
            ))),
        }
    }
}

/// Operational metadata reported by the registry for each configured
/// connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorMetadata {
    pub domain: String,
    pub adapter_kind: String,
    pub version: String,
    pub url: String,
    pub enabled: bool,
    /// Whether a live instance is currently cached
    pub cached: bool,
    /// `None` until the connector has been constructed and health-checked
    pub healthy: Option<bool>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl ConnectorMetadata {
    /// Metadata for a connector that has no live instance.
    pub fn from_config(config: &ConnectorConfig) -> Self {
        Self {
            domain: config.domain.clone(),
            adapter_kind: config.adapter_kind.clone(),
            version: config.version.clone(),
            url: config.url.clone(),
            enabled: config.enabled,
            cached: false,
            healthy: None,
            last_checked: None,
        }
    }
}
