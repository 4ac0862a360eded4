//! Port to the external store holding connector definitions

use async_trait::async_trait;
use storelink_domain::{ConnectorConfig, Result};

/// Read access to connector configuration documents.
///
/// Implementations return copies; callers never observe later mutations of a
/// document they already fetched.
#[async_trait]
pub trait ConnectorConfigStore: Send + Sync {
    /// The document for one tenant/store/domain, if any.
    async fn find(
        &self,
        tenant_id: &str,
        store_id: &str,
        domain: &str,
    ) -> Result<Option<ConnectorConfig>>;

    /// Every domain configured for a tenant/store pair.
    async fn list(&self, tenant_id: &str, store_id: &str) -> Result<Vec<ConnectorConfig>>;
}
