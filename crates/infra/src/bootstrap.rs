//! Registry wiring with the adapters shipped in this crate

use std::sync::Arc;

use storelink_core::{ConnectorConfigStore, ConnectorRegistry};
use storelink_domain::{AdapterKind, AppConfig, Result};
use tracing::info;

use crate::integrations::commerce::{CommercePolicies, D365CommerceFactory};
use crate::integrations::static_catalog::StaticCatalogFactory;

/// Registry without a running eviction task, with every built-in adapter
/// registered.
pub fn registry_with_adapters(
    store: Arc<dyn ConnectorConfigStore>,
    config: &AppConfig,
) -> Result<Arc<ConnectorRegistry>> {
    config.validate()?;

    let registry = ConnectorRegistry::new(store, config.registry.clone());
    registry.register_factory(
        AdapterKind::D365Commerce,
        D365CommerceFactory::new(CommercePolicies::from_app(config)),
    );
    registry.register_factory(AdapterKind::StaticCatalog, StaticCatalogFactory);
    registry.ensure_factories(&AdapterKind::ALL)?;

    Ok(Arc::new(registry))
}

/// Registry ready for use: built-in adapters registered and idle eviction
/// running every `registry.cleanup_interval_secs`.
///
/// Must be called from within a Tokio runtime.
pub fn default_registry(
    store: Arc<dyn ConnectorConfigStore>,
    config: &AppConfig,
) -> Result<Arc<ConnectorRegistry>> {
    let registry = registry_with_adapters(store, config)?;
    registry.start_eviction()?;

    info!(
        adapters = ?registry.factories().kinds(),
        cache_ttl_secs = config.registry.cache_ttl_secs,
        cleanup_interval_secs = config.registry.cleanup_interval_secs,
        "Connector registry started"
    );
    Ok(registry)
}
