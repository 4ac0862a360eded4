//! Connector configuration store implementations
//!
//! - **[`memory`]**: mutable in-process store for embedding and tests
//! - **[`file`]**: JSON document file, reloadable at runtime

pub mod file;
pub mod memory;

pub use file::JsonFileConfigStore;
pub use memory::InMemoryConfigStore;

use std::collections::HashMap;

use storelink_domain::{ConnectorConfig, ConnectorKey, Result, StoreLinkError};

/// Index documents by key, rejecting invalid or duplicate keys.
fn index(configs: Vec<ConnectorConfig>) -> Result<HashMap<ConnectorKey, ConnectorConfig>> {
    let mut indexed = HashMap::with_capacity(configs.len());
    for config in configs {
        let key = config.key();
        key.validate().map_err(|e| StoreLinkError::ConfigStore(e.to_string()))?;
        if indexed.insert(key.clone(), config).is_some() {
            return Err(StoreLinkError::ConfigStore(format!("duplicate connector document {key}")));
        }
    }
    Ok(indexed)
}

fn list_matching(
    configs: &HashMap<ConnectorKey, ConnectorConfig>,
    tenant_id: &str,
    store_id: &str,
) -> Vec<ConnectorConfig> {
    let mut listed: Vec<ConnectorConfig> = configs
        .iter()
        .filter(|(key, _)| key.tenant_id == tenant_id && key.store_id == store_id)
        .map(|(_, config)| config.clone())
        .collect();
    listed.sort_by(|a, b| a.domain.cmp(&b.domain));
    listed
}
