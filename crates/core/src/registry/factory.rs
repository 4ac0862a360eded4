//! Adapter factories keyed by [`AdapterKind`]

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use storelink_domain::{AdapterKind, ConnectorConfig, Result, StoreLinkError};
use tracing::{debug, info};

use crate::connector::Connector;

/// Builds an uninitialized connector from its configuration document.
///
/// Construction must be cheap and side-effect free; network work belongs in
/// [`Connector::initialize`].
pub trait ConnectorFactory: Send + Sync {
    fn create(&self, config: &ConnectorConfig) -> Result<Box<dyn Connector>>;
}

impl<F> ConnectorFactory for F
where
    F: Fn(&ConnectorConfig) -> Result<Box<dyn Connector>> + Send + Sync,
{
    fn create(&self, config: &ConnectorConfig) -> Result<Box<dyn Connector>> {
        self(config)
    }
}

/// Read-mostly table of factories, written at startup.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: RwLock<HashMap<AdapterKind, Arc<dyn ConnectorFactory>>>,
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry").field("kinds", &self.kinds()).finish()
    }
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the factory for `kind`.
    pub fn register(&self, kind: AdapterKind, factory: Arc<dyn ConnectorFactory>) {
        let replaced = self.factories.write().insert(kind, factory).is_some();
        if replaced {
            info!(adapter_kind = %kind, "Replaced connector factory");
        } else {
            debug!(adapter_kind = %kind, "Registered connector factory");
        }
    }

    pub fn get(&self, kind: AdapterKind) -> Result<Arc<dyn ConnectorFactory>> {
        self.factories
            .read()
            .get(&kind)
            .cloned()
            .ok_or_else(|| StoreLinkError::UnknownAdapterKind(kind.to_string()))
    }

    pub fn contains(&self, kind: AdapterKind) -> bool {
        self.factories.read().contains_key(&kind)
    }

    /// Fail on the first kind without a factory.
    pub fn ensure(&self, kinds: &[AdapterKind]) -> Result<()> {
        let factories = self.factories.read();
        match kinds.iter().find(|kind| !factories.contains_key(kind)) {
            Some(missing) => Err(StoreLinkError::UnknownAdapterKind(missing.to_string())),
            None => Ok(()),
        }
    }

    /// Registered kinds in stable order.
    pub fn kinds(&self) -> Vec<AdapterKind> {
        let mut kinds: Vec<_> = self.factories.read().keys().copied().collect();
        kinds.sort();
        kinds
    }
}
