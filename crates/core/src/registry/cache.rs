//! Live connector instances keyed by tenant/store/domain
//!
//! Hits take the read lock and bump an atomic access stamp, so lookups never
//! wait on each other. Inserts, removals and sweeps take the write lock for
//! the duration of a map operation only; no lock is held across an await.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use storelink_common::Clock;
use storelink_domain::ConnectorKey;

use crate::connector::Connector;

/// One cached connector with its bookkeeping.
pub struct CacheEntry {
    connector: Arc<dyn Connector>,
    /// Millis since the cache origin
    last_access: AtomicU64,
    healthy: bool,
    last_checked: DateTime<Utc>,
}

impl CacheEntry {
    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// Result of the health check run when the entry was built.
    pub fn healthy(&self) -> bool {
        self.healthy
    }

    pub fn last_checked(&self) -> DateTime<Utc> {
        self.last_checked
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<ConnectorKey, Arc<CacheEntry>>,
    closed: bool,
}

pub struct ConnectorCache<C: Clock> {
    clock: C,
    origin: Instant,
    state: RwLock<CacheState>,
}

impl<C: Clock> ConnectorCache<C> {
    pub fn new(clock: C) -> Self {
        let origin = clock.now();
        Self { clock, origin, state: RwLock::new(CacheState::default()) }
    }

    fn stamp(&self) -> u64 {
        let elapsed = self.clock.now().saturating_duration_since(self.origin);
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    /// Cached connector for `key`, refreshing its access time.
    pub fn get(&self, key: &ConnectorKey) -> Option<Arc<dyn Connector>> {
        let state = self.state.read();
        let entry = state.entries.get(key)?;
        entry.last_access.store(self.stamp(), Ordering::Relaxed);
        Some(Arc::clone(&entry.connector))
    }

    /// Entry for `key` without touching its access time.
    pub fn peek(&self, key: &ConnectorKey) -> Option<Arc<CacheEntry>> {
        self.state.read().entries.get(key).cloned()
    }

    /// Store a freshly built connector.
    ///
    /// Once the cache is closed the connector is handed back so the caller
    /// can release it.
    pub fn insert(
        &self,
        key: ConnectorKey,
        connector: Arc<dyn Connector>,
        healthy: bool,
    ) -> Result<Arc<dyn Connector>, Arc<dyn Connector>> {
        let entry = Arc::new(CacheEntry {
            connector: Arc::clone(&connector),
            last_access: AtomicU64::new(self.stamp()),
            healthy,
            last_checked: DateTime::<Utc>::from(self.clock.system_time()),
        });

        let mut state = self.state.write();
        if state.closed {
            return Err(connector);
        }
        state.entries.insert(key, entry);
        Ok(connector)
    }

    pub fn remove(&self, key: &ConnectorKey) -> Option<Arc<CacheEntry>> {
        self.state.write().entries.remove(key)
    }

    /// Remove and return every entry idle for longer than `ttl`.
    pub fn take_idle(&self, ttl: Duration) -> Vec<(ConnectorKey, Arc<CacheEntry>)> {
        let now = self.stamp();
        let ttl = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

        let mut state = self.state.write();
        let idle: Vec<ConnectorKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| {
                now.saturating_sub(entry.last_access.load(Ordering::Relaxed)) > ttl
            })
            .map(|(key, _)| key.clone())
            .collect();

        idle.into_iter()
            .filter_map(|key| state.entries.remove(&key).map(|entry| (key, entry)))
            .collect()
    }

    /// Mark the cache closed and drain it.
    ///
    /// Returns `None` when already closed.
    pub fn close(&self) -> Option<Vec<(ConnectorKey, Arc<CacheEntry>)>> {
        let mut state = self.state.write();
        if state.closed {
            return None;
        }
        state.closed = true;
        Some(state.entries.drain().collect())
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use storelink_common::MockClock;
    use storelink_domain::{AdapterKind, ConnectorConfig, Result};

    use super::*;

    struct Idle;

    #[async_trait]
    impl Connector for Idle {
        fn domain(&self) -> &str {
            "retail"
        }

        fn adapter_kind(&self) -> AdapterKind {
            AdapterKind::StaticCatalog
        }

        async fn initialize(&mut self, _config: &ConnectorConfig) -> Result<()> {
            Ok(())
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn key(domain: &str) -> ConnectorKey {
        ConnectorKey::new("acme", "042", domain)
    }

    #[test]
    fn hit_refreshes_access_time() {
        let clock = MockClock::new();
        let cache = ConnectorCache::new(clock.clone());
        assert!(cache.insert(key("retail"), Arc::new(Idle), true).is_ok());
        assert!(cache.insert(key("wishlist"), Arc::new(Idle), true).is_ok());

        clock.advance(Duration::from_secs(20));
        assert!(cache.get(&key("retail")).is_some());
        clock.advance(Duration::from_secs(20));

        let evicted = cache.take_idle(Duration::from_secs(30));

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].0, key("wishlist"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn entry_exactly_at_ttl_is_kept() {
        let clock = MockClock::new();
        let cache = ConnectorCache::new(clock.clone());
        assert!(cache.insert(key("retail"), Arc::new(Idle), false).is_ok());

        clock.advance(Duration::from_secs(30));

        assert!(cache.take_idle(Duration::from_secs(30)).is_empty());
        assert!(!cache.peek(&key("retail")).unwrap().healthy());
    }

    #[test]
    fn closed_cache_rejects_inserts_and_closes_once() {
        let cache = ConnectorCache::new(MockClock::new());
        assert!(cache.insert(key("retail"), Arc::new(Idle), true).is_ok());

        assert_eq!(cache.close().map(|drained| drained.len()), Some(1));
        assert!(cache.close().is_none());
        assert!(cache.is_closed());
        assert!(cache.insert(key("retail"), Arc::new(Idle), true).is_err());
        assert!(cache.is_empty());
    }
}
