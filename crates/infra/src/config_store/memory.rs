use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use storelink_core::ConnectorConfigStore;
use storelink_domain::{ConnectorConfig, ConnectorKey, Result};

/// In-process configuration store.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    configs: RwLock<HashMap<ConnectorKey, ConnectorConfig>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store; fails on invalid or duplicate keys.
    pub fn with_configs(configs: Vec<ConnectorConfig>) -> Result<Self> {
        Ok(Self { configs: RwLock::new(super::index(configs)?) })
    }

    /// Insert or replace the document for the config's key.
    ///
    /// Callers holding a cached connector for the key should invalidate it.
    pub fn upsert(&self, config: ConnectorConfig) -> Result<Option<ConnectorConfig>> {
        let key = config.key();
        key.validate()?;
        Ok(self.configs.write().insert(key, config))
    }

    pub fn remove(&self, tenant_id: &str, store_id: &str, domain: &str) -> Option<ConnectorConfig> {
        self.configs.write().remove(&ConnectorKey::new(tenant_id, store_id, domain))
    }

    pub fn len(&self) -> usize {
        self.configs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConnectorConfigStore for InMemoryConfigStore {
    async fn find(
        &self,
        tenant_id: &str,
        store_id: &str,
        domain: &str,
    ) -> Result<Option<ConnectorConfig>> {
        Ok(self.configs.read().get(&ConnectorKey::new(tenant_id, store_id, domain)).cloned())
    }

    async fn list(&self, tenant_id: &str, store_id: &str) -> Result<Vec<ConnectorConfig>> {
        Ok(super::list_matching(&self.configs.read(), tenant_id, store_id))
    }
}

#[cfg(test)]
mod tests {
    use storelink_domain::{AdapterKind, StoreLinkError};

    use super::*;

    fn config(store: &str, domain: &str) -> ConnectorConfig {
        ConnectorConfig::new("acme", store, domain, AdapterKind::StaticCatalog)
    }

    #[tokio::test]
    async fn find_and_list_are_scoped_to_tenant_and_store() {
        let store = InMemoryConfigStore::with_configs(vec![
            config("042", "wishlist"),
            config("042", "retail"),
            config("043", "retail"),
        ])
        .unwrap();

        assert!(store.find("acme", "042", "retail").await.unwrap().is_some());
        assert!(store.find("acme", "042", "kitchen").await.unwrap().is_none());

        let domains: Vec<_> =
            store.list("acme", "042").await.unwrap().into_iter().map(|c| c.domain).collect();
        assert_eq!(domains, vec!["retail", "wishlist"]);
    }

    #[tokio::test]
    async fn upsert_replaces_and_remove_deletes() {
        let store = InMemoryConfigStore::new();
        assert!(store.upsert(config("042", "retail")).unwrap().is_none());
        assert!(store.upsert(config("042", "retail").disabled()).unwrap().is_some());

        assert!(!store.find("acme", "042", "retail").await.unwrap().unwrap().enabled);
        assert!(store.remove("acme", "042", "retail").is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn rejects_duplicate_and_invalid_keys() {
        let duplicate =
            InMemoryConfigStore::with_configs(vec![config("042", "retail"), config("042", "retail")]);
        assert!(matches!(duplicate, Err(StoreLinkError::ConfigStore(_))));

        assert!(InMemoryConfigStore::new().upsert(config("0:42", "retail")).is_err());
    }
}
