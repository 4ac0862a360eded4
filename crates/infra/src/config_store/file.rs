use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use storelink_core::ConnectorConfigStore;
use storelink_domain::{ConnectorConfig, ConnectorKey, Result, StoreLinkError};
use tracing::info;

/// Connector documents read from a JSON array on disk.
///
/// The file is parsed fully before the in-memory copy is swapped, so a
/// broken edit leaves the previous documents in place.
#[derive(Debug)]
pub struct JsonFileConfigStore {
    path: PathBuf,
    configs: RwLock<HashMap<ConnectorKey, ConnectorConfig>>,
}

impl JsonFileConfigStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let configs = read_documents(&path).await?;
        info!(path = %path.display(), documents = configs.len(), "Loaded connector documents");
        Ok(Self { path, configs: RwLock::new(configs) })
    }

    /// Re-read the file. Returns the number of documents now loaded.
    pub async fn reload(&self) -> Result<usize> {
        let configs = read_documents(&self.path).await?;
        let count = configs.len();
        *self.configs.write() = configs;
        info!(path = %self.path.display(), documents = count, "Reloaded connector documents");
        Ok(count)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn read_documents(path: &Path) -> Result<HashMap<ConnectorKey, ConnectorConfig>> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        StoreLinkError::ConfigStore(format!("failed to read {}: {e}", path.display()))
    })?;
    let documents: Vec<ConnectorConfig> = serde_json::from_str(&contents).map_err(|e| {
        StoreLinkError::ConfigStore(format!("invalid connector documents in {}: {e}", path.display()))
    })?;
    super::index(documents)
}

#[async_trait]
impl ConnectorConfigStore for JsonFileConfigStore {
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
