//! Connector registry
//!
//! Resolves a tenant/store/domain triple to a live [`Connector`]: cached
//! instances are served under a shared lock, misses are built at most once
//! per key (a per-key async lock plus a cache re-check), and idle instances
//! are closed by a background [`EvictionTask`].
//!
//! Resolution errors (`ConnectorNotFound`, `ConnectorDisabled`,
//! `UnknownAdapterKind`, `Initialization`) surface directly; the registry
//! never retries.

pub mod cache;
pub mod eviction;
pub mod factory;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use storelink_common::{Clock, KeyedMutex, SystemClock};
use storelink_domain::{
    AdapterKind, ConnectorConfig, ConnectorKey, ConnectorMetadata, RegistrySettings, Result,
    StoreLinkError,
};
use tracing::{debug, info, instrument, warn};

pub use cache::{CacheEntry, ConnectorCache};
pub use eviction::EvictionTask;
pub use factory::{ConnectorFactory, FactoryRegistry};

use crate::connector::{Connector, ConnectorConfigStore};

pub struct ConnectorRegistry<C: Clock = SystemClock> {
    store: Arc<dyn ConnectorConfigStore>,
    factories: FactoryRegistry,
    cache: ConnectorCache<C>,
    inflight: KeyedMutex<ConnectorKey>,
    settings: RegistrySettings,
    eviction: Mutex<Option<EvictionTask>>,
}

impl<C: Clock> fmt::Debug for ConnectorRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("factories", &self.factories)
            .field("cached", &self.cache.len())
            .field("closed", &self.cache.is_closed())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ConnectorRegistry<SystemClock> {
    pub fn new(store: Arc<dyn ConnectorConfigStore>, settings: RegistrySettings) -> Self {
        Self::with_clock(store, settings, SystemClock)
    }
}

impl<C: Clock> ConnectorRegistry<C> {
    /// Registry measuring idle time with `clock`.
    pub fn with_clock(
        store: Arc<dyn ConnectorConfigStore>,
        settings: RegistrySettings,
        clock: C,
    ) -> Self {
        Self {
            store,
            factories: FactoryRegistry::new(),
            cache: ConnectorCache::new(clock),
            inflight: KeyedMutex::new(),
            settings,
            eviction: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    pub fn factories(&self) -> &FactoryRegistry {
        &self.factories
    }

    /// Register the factory for `kind`, replacing any previous one.
    pub fn register_factory(&self, kind: AdapterKind, factory: impl ConnectorFactory + 'static) {
        self.factories.register(kind, Arc::new(factory));
    }

    /// Fail fast if any of `kinds` has no registered factory.
    pub fn ensure_factories(&self, kinds: &[AdapterKind]) -> Result<()> {
        self.factories.ensure(kinds)
    }

    /// Resolve the connector for a tenant/store/domain.
    ///
    /// Hits refresh the entry's access time. A miss loads the configuration,
    /// builds the connector through its factory, initializes it (bounded by
    /// the configured connector timeout) and runs a health check (bounded by
    /// the registry health-check timeout). A failing health check is logged
    /// and the connector is cached anyway.
    ///
    /// # Errors
    ///
    /// - `Shutdown` after [`ConnectorRegistry::close`]
    /// - `ConnectorNotFound` when the store has no document
    /// - `ConnectorDisabled` when the document is disabled; no factory runs
    /// - `UnknownAdapterKind` when no factory handles the document's kind
    /// - `Initialization` when the factory or `initialize` fails
    #[instrument(skip(self), level = "debug")]
    pub async fn get_connector(
        &self,
        tenant_id: &str,
        store_id: &str,
        domain: &str,
    ) -> Result<Arc<dyn Connector>> {
        let key = ConnectorKey::new(tenant_id, store_id, domain);
        key.validate()?;
        self.ensure_open()?;

        if let Some(connector) = self.cache.get(&key) {
            return Ok(connector);
        }

        let _flight = self.inflight.lock(&key).await;
        self.ensure_open()?;
        if let Some(connector) = self.cache.get(&key) {
            debug!(%key, "Connector built by concurrent caller");
            return Ok(connector);
        }

        let config = self
            .store
            .find(tenant_id, store_id, domain)
            .await?
            .ok_or_else(|| StoreLinkError::ConnectorNotFound { key: key.to_string() })?;
        if !config.enabled {
            return Err(StoreLinkError::ConnectorDisabled { key: key.to_string() });
        }
        let kind = config.kind()?;
        let factory = self.factories.get(kind)?;

        let (pending, healthy) = self.build(&key, &config, factory.as_ref()).await?;
        match self.cache.insert(key.clone(), Arc::from(pending.release()), healthy) {
            Ok(connector) => {
                info!(%key, adapter_kind = %kind, healthy, "Connector cached");
                Ok(connector)
            }
            Err(orphan) => {
                close_connector(&key, orphan.as_ref()).await;
                Err(StoreLinkError::Shutdown)
            }
        }
    }

    async fn build(
        &self,
        key: &ConnectorKey,
        config: &ConnectorConfig,
        factory: &dyn ConnectorFactory,
    ) -> Result<(PendingConnector, bool)> {
        let connector = factory.create(config).map_err(|err| initialization_error(key, err))?;
        let mut pending = PendingConnector::new(key, connector);

        let initialized = match config.timeout() {
            Some(limit) => tokio::time::timeout(limit, pending.connector_mut().initialize(config))
                .await
                .unwrap_or_else(|_| {
                    Err(StoreLinkError::Timeout(format!(
                        "initialization exceeded {}ms",
                        limit.as_millis()
                    )))
                }),
            None => pending.connector_mut().initialize(config).await,
        };
        if let Err(err) = initialized {
            warn!(%key, error = %err, "Connector initialization failed");
            let connector = pending.release();
            close_connector(key, connector.as_ref()).await;
            return Err(initialization_error(key, err));
        }

        let healthy = self.check_health(key, pending.connector()).await;
        Ok((pending, healthy))
    }

    async fn check_health(&self, key: &ConnectorKey, connector: &dyn Connector) -> bool {
        let limit = self.settings.health_check_timeout();
        match tokio::time::timeout(limit, connector.health_check()).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!(%key, error = %err, "Health check failed, caching connector anyway");
                false
            }
            Err(_) => {
                warn!(
                    %key,
                    timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    "Health check timed out, caching connector anyway"
                );
                false
            }
        }
    }

    /// Metadata for every connector configured for a tenant/store pair.
    ///
    /// Uncached connectors are reported from their configuration only; no
    /// connector is constructed. Ordered by descending priority, then domain.
    pub async fn list_connectors(
        &self,
        tenant_id: &str,
        store_id: &str,
    ) -> Result<Vec<ConnectorMetadata>> {
        let mut configs = self.store.list(tenant_id, store_id).await?;
        configs.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.domain.cmp(&b.domain)));
        Ok(configs.iter().map(|config| self.metadata_for(config)).collect())
    }

    pub async fn connector_metadata(
        &self,
        tenant_id: &str,
        store_id: &str,
        domain: &str,
    ) -> Result<ConnectorMetadata> {
        let config = self.store.find(tenant_id, store_id, domain).await?.ok_or_else(|| {
            StoreLinkError::ConnectorNotFound {
                key: ConnectorKey::new(tenant_id, store_id, domain).to_string(),
            }
        })?;
        Ok(self.metadata_for(&config))
    }

    fn metadata_for(&self, config: &ConnectorConfig) -> ConnectorMetadata {
        let mut metadata = ConnectorMetadata::from_config(config);
        if let Some(entry) = self.cache.peek(&config.key()) {
            metadata.cached = true;
            metadata.healthy = Some(entry.healthy());
            metadata.last_checked = Some(entry.last_checked());
        }
        metadata
    }

    /// Drop and close the cached connector for one key.
    ///
    /// Waits for an in-flight construction of the same key, so a connector
    /// built from a stale document does not survive the invalidation.
    /// Returns whether an entry was removed.
    pub async fn invalidate_cache(
        &self,
        tenant_id: &str,
        store_id: &str,
        domain: &str,
    ) -> Result<bool> {
        let key = ConnectorKey::new(tenant_id, store_id, domain);
        key.validate()?;

        let _flight = self.inflight.lock(&key).await;
        match self.cache.remove(&key) {
            Some(entry) => {
                close_connector(&key, entry.connector().as_ref()).await;
                info!(%key, "Connector invalidated");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// One eviction sweep: close and drop entries idle longer than the
    /// cache TTL. Returns the number evicted.
    pub async fn evict_idle(&self) -> usize {
        let idle = self.cache.take_idle(self.settings.cache_ttl());
        for (key, entry) in &idle {
            info!(%key, "Evicting idle connector");
            close_connector(key, entry.connector().as_ref()).await;
        }
        idle.len()
    }

    /// Start the periodic eviction sweep on the current tokio runtime.
    pub fn start_eviction(self: &Arc<Self>) -> Result<()> {
        self.ensure_open()?;

        let mut slot = self.eviction.lock();
        if slot.as_ref().is_some_and(EvictionTask::is_running) {
            return Err(StoreLinkError::Internal("Eviction task already running".into()));
        }
        *slot = Some(EvictionTask::spawn(Arc::downgrade(self), self.settings.cleanup_interval()));
        Ok(())
    }

    pub fn is_eviction_running(&self) -> bool {
        self.eviction.lock().as_ref().is_some_and(EvictionTask::is_running)
    }

    /// Stop eviction, close every cached connector and refuse further
    /// resolution. Later calls are no-ops.
    pub async fn close(&self) -> Result<()> {
        let Some(drained) = self.cache.close() else {
            debug!("Connector registry already closed");
            return Ok(());
        };

        let task = self.eviction.lock().take();
        let stopped = match task {
            Some(mut task) => task.stop().await,
            None => Ok(()),
        };

        for (key, entry) in &drained {
            close_connector(key, entry.connector().as_ref()).await;
        }
        info!(closed = drained.len(), "Connector registry closed");
        stopped
    }

    pub fn is_closed(&self) -> bool {
        self.cache.is_closed()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.cache.is_closed() {
            return Err(StoreLinkError::Shutdown);
        }
        Ok(())
    }
}

/// Connector built by `get_connector` that the cache does not own yet.
///
/// If the resolving future is dropped before the connector is released (for
/// example while initialize or the health check is pending), the connector is
/// closed on a background task.
struct PendingConnector {
    key: ConnectorKey,
    connector: Option<Box<dyn Connector>>,
}

impl PendingConnector {
    fn new(key: &ConnectorKey, connector: Box<dyn Connector>) -> Self {
        Self { key: key.clone(), connector: Some(connector) }
    }

    fn connector(&self) -> &dyn Connector {
        match &self.connector {
            Some(connector) => connector.as_ref(),
            None => unreachable!("pending connector used after release"),
        }
    }

    fn connector_mut(&mut self) -> &mut dyn Connector {
        match &mut self.connector {
            Some(connector) => connector.as_mut(),
            None => unreachable!("pending connector used after release"),
        }
    }

    fn release(mut self) -> Box<dyn Connector> {
        match self.connector.take() {
            Some(connector) => connector,
            None => unreachable!("pending connector released twice"),
        }
    }
}

impl Drop for PendingConnector {
    fn drop(&mut self) {
        let Some(connector) = self.connector.take() else {
            return;
        };
        let key = self.key.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(%key, "Resolution abandoned, closing connector");
                handle.spawn(async move { close_connector(&key, connector.as_ref()).await });
            }
            Err(_) => warn!(%key, "Resolution abandoned outside a runtime, connector not closed"),
        }
    }
}

fn initialization_error(key: &ConnectorKey, err: StoreLinkError) -> StoreLinkError {
    match err {
        err @ StoreLinkError::Initialization { .. } => err,
        other => StoreLinkError::Initialization { key: key.to_string(), message: other.to_string() },
    }
}

async fn close_connector(key: &ConnectorKey, connector: &dyn Connector) {
    if let Err(err) = connector.close().await {
        warn!(%key, error = %err, "Error closing connector");
    }
}
