//! Integration tests for connector resolution, caching and eviction.

mod support;

use std::sync::Arc;
use std::time::Duration;

use storelink_common::MockClock;
use storelink_core::{Capability, ConnectorRegistry};
use storelink_domain::{AdapterKind, ConnectorConfig, RegistrySettings, StoreLinkError};
use support::{
    retail_config, same_instance, Behaviour, MockConfigStore, MockFactory, STORE, TENANT,
};

fn registry_with(
    store: Arc<MockConfigStore>,
    factory: &MockFactory,
    clock: MockClock,
) -> Arc<ConnectorRegistry<MockClock>> {
    let registry = ConnectorRegistry::with_clock(store, RegistrySettings::default(), clock);
    registry.register_factory(AdapterKind::StaticCatalog, factory.clone());
    Arc::new(registry)
}

/// Repeated resolution inside the TTL serves the cached instance.
///
/// # Test Steps
/// 1. Resolve the retail connector twice
/// 2. Verify both handles point at the same instance
/// 3. Verify the factory, initialize and health check each ran once
#[tokio::test]
async fn repeated_resolution_returns_cached_instance() {
    let store = MockConfigStore::with(vec![retail_config()]);
    let factory = MockFactory::new();
    let registry = registry_with(Arc::clone(&store), &factory, MockClock::new());

    let first = registry.get_connector(TENANT, STORE, "retail").await.unwrap();
    let second = registry.get_connector(TENANT, STORE, "retail").await.unwrap();

    assert!(same_instance(&first, &second));
    assert_eq!(factory.lifecycle.created(), 1);
    assert_eq!(factory.lifecycle.initialized(), 1);
    assert_eq!(factory.lifecycle.health_checks(), 1);
    assert_eq!(store.finds(), 1);
    assert_eq!(registry.cached_count(), 1);
}

#[tokio::test]
async fn resolved_connector_exposes_retail_operations() {
    let store = MockConfigStore::with(vec![retail_config()]);
    let registry = registry_with(store, &MockFactory::new(), MockClock::new());

    let connector = registry.get_connector(TENANT, STORE, "retail").await.unwrap();

    assert_eq!(connector.domain(), "retail");
    assert_eq!(connector.capabilities(), vec![Capability::Retail]);
    assert!(connector.as_wishlist().is_none());
    let product = connector.as_retail().unwrap().get_product("sku-1").await.unwrap();
    assert_eq!(product.name, "instance-1");
}

/// Invalidation closes the cached connector and forces a rebuild.
///
/// # Test Steps
/// 1. Resolve, then invalidate the key
/// 2. Verify the old instance was closed exactly once
/// 3. Resolve again and verify a second instance was built
#[tokio::test]
async fn invalidate_closes_and_rebuilds() -> anyhow::Result<()> {
    let store = MockConfigStore::with(vec![retail_config()]);
    let factory = MockFactory::new();
    let registry = registry_with(store, &factory, MockClock::new());

    let first = registry.get_connector(TENANT, STORE, "retail").await?;
    assert!(registry.invalidate_cache(TENANT, STORE, "retail").await?);
    assert!(!registry.invalidate_cache(TENANT, STORE, "retail").await?);
    assert_eq!(factory.lifecycle.closed(), 1);

    let second = registry.get_connector(TENANT, STORE, "retail").await?;

    assert!(!same_instance(&first, &second));
    assert_eq!(factory.lifecycle.created(), 2);
    Ok(())
}

/// Idle entries are closed once by a sweep; touched entries survive.
///
/// # Test Steps
/// 1. Cache retail and wishlist connectors
/// 2. Advance the clock past half the TTL and touch retail
/// 3. Advance past the TTL for wishlist only and sweep
/// 4. Verify only wishlist was evicted and closed, then sweep again
#[tokio::test]
async fn sweep_evicts_only_idle_entries() -> anyhow::Result<()> {
    let wishlist = ConnectorConfig { domain: "wishlist".into(), ..retail_config() };
    let store = MockConfigStore::with(vec![retail_config(), wishlist]);
    let factory = MockFactory::new();
    let clock = MockClock::new();
    let registry = registry_with(store, &factory, clock.clone());
    let ttl = registry.settings().cache_ttl();

    registry.get_connector(TENANT, STORE, "retail").await?;
    registry.get_connector(TENANT, STORE, "wishlist").await?;

    clock.advance(ttl / 2);
    registry.get_connector(TENANT, STORE, "retail").await?;
    clock.advance(ttl / 2 + Duration::from_secs(1));

    assert_eq!(registry.evict_idle().await, 1);
    assert_eq!(registry.cached_count(), 1);
    assert_eq!(factory.lifecycle.closed(), 1);

    assert_eq!(registry.evict_idle().await, 0);
    assert_eq!(factory.lifecycle.closed(), 1);

    registry.get_connector(TENANT, STORE, "wishlist").await?;
    assert_eq!(factory.lifecycle.created(), 3);
    Ok(())
}

/// Concurrent misses for one key build exactly one connector.
///
/// # Test Steps
/// 1. Use a factory whose initialize takes 50ms
/// 2. Spawn 16 concurrent resolutions of the same key
/// 3. Verify one factory call, one initialize, one health check
/// 4. Verify every caller got the same instance
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_build_once() {
    let store = MockConfigStore::with(vec![retail_config()]);
    let factory = MockFactory::with_behaviour(Behaviour {
        init_delay: Duration::from_millis(50),
        ..Behaviour::default()
    });
    let registry = registry_with(store, &factory, MockClock::new());

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.get_connector(TENANT, STORE, "retail").await })
        })
        .collect();

    let mut connectors = Vec::new();
    for task in tasks {
        connectors.push(task.await.unwrap().unwrap());
    }

    assert_eq!(factory.lifecycle.created(), 1);
    assert_eq!(factory.lifecycle.initialized(), 1);
    assert_eq!(factory.lifecycle.health_checks(), 1);
    assert!(connectors.iter().all(|c| same_instance(c, &connectors[0])));
}

#[tokio::test]
async fn different_keys_resolve_independently() {
    let other_store = ConnectorConfig { store_id: "043".into(), ..retail_config() };
    let store = MockConfigStore::with(vec![retail_config(), other_store]);
    let factory = MockFactory::new();
    let registry = registry_with(store, &factory, MockClock::new());

    let a = registry.get_connector(TENANT, STORE, "retail").await.unwrap();
    let b = registry.get_connector(TENANT, "043", "retail").await.unwrap();

    assert!(!same_instance(&a, &b));
    assert_eq!(registry.cached_count(), 2);
}

/// A disabled document fails without touching the factory.
///
/// # Test Steps
/// 1. Store a disabled retail document
/// 2. Resolve it and verify `ConnectorDisabled`
/// 3. Verify the factory never ran and nothing was cached
#[tokio::test]
async fn disabled_config_never_invokes_factory() {
    let store = MockConfigStore::with(vec![retail_config().disabled()]);
    let factory = MockFactory::new();
    let registry = registry_with(store, &factory, MockClock::new());

    let err = registry.get_connector(TENANT, STORE, "retail").await.err().unwrap();

    assert_eq!(err, StoreLinkError::ConnectorDisabled { key: "acme:042:retail".into() });
    assert_eq!(factory.lifecycle.created(), 0);
    assert_eq!(registry.cached_count(), 0);
}

#[tokio::test]
async fn missing_config_is_connector_not_found() {
    let registry = registry_with(MockConfigStore::with(vec![]), &MockFactory::new(), MockClock::new());

    let err = registry.get_connector(TENANT, STORE, "kitchen").await.err().unwrap();

    assert_eq!(err, StoreLinkError::ConnectorNotFound { key: "acme:042:kitchen".into() });
}

#[tokio::test]
async fn invalid_key_is_rejected_before_lookup() {
    let store = MockConfigStore::with(vec![retail_config()]);
    let registry = registry_with(Arc::clone(&store), &MockFactory::new(), MockClock::new());

    let err = registry.get_connector(TENANT, "", "retail").await.err().unwrap();

    assert!(matches!(err, StoreLinkError::InvalidInput(_)));
    assert_eq!(store.finds(), 0);
}

#[tokio::test]
async fn unknown_or_unregistered_kind_fails_resolution() {
    let mut magento = retail_config();
    magento.domain = "kitchen".into();
    magento.adapter_kind = "magento".into();
    let commerce = ConnectorConfig {
        domain: "orders".into(),
        adapter_kind: AdapterKind::D365Commerce.to_string(),
        ..retail_config()
    };
    let store = MockConfigStore::with(vec![magento, commerce]);
    let registry = registry_with(store, &MockFactory::new(), MockClock::new());

    let unknown = registry.get_connector(TENANT, STORE, "kitchen").await.err().unwrap();
    let unregistered = registry.get_connector(TENANT, STORE, "orders").await.err().unwrap();

    assert_eq!(unknown, StoreLinkError::UnknownAdapterKind("magento".into()));
    assert_eq!(unregistered, StoreLinkError::UnknownAdapterKind("d365-commerce".into()));
    assert!(registry.ensure_factories(&[AdapterKind::StaticCatalog]).is_ok());
    assert!(registry.ensure_factories(&AdapterKind::ALL).is_err());
}

/// Failed initialization is reported, releases the instance and is not
/// cached.
///
/// # Test Steps
/// 1. Use a factory whose initialize fails
/// 2. Resolve and verify an `Initialization` error naming the key
/// 3. Verify the half-built connector was closed and nothing was cached
/// 4. Resolve again and verify the factory is retried
#[tokio::test]
async fn initialization_failure_is_not_cached() {
    let store = MockConfigStore::with(vec![retail_config()]);
    let factory =
        MockFactory::with_behaviour(Behaviour { fail_init: true, ..Behaviour::default() });
    let registry = registry_with(store, &factory, MockClock::new());

    let err = registry.get_connector(TENANT, STORE, "retail").await.err().unwrap();

    match err {
        StoreLinkError::Initialization { key, message } => {
            assert_eq!(key, "acme:042:retail");
            assert!(message.contains("backend unreachable"));
        }
        other => panic!("expected Initialization, got {other:?}"),
    }
    assert_eq!(factory.lifecycle.closed(), 1);
    assert_eq!(factory.lifecycle.health_checks(), 0);
    assert_eq!(registry.cached_count(), 0);

    let _ = registry.get_connector(TENANT, STORE, "retail").await;
    assert_eq!(factory.lifecycle.created(), 2);
}

#[tokio::test(start_paused = true)]
async fn initialization_is_bounded_by_connector_timeout() {
    let store = MockConfigStore::with(vec![retail_config().with_timeout(Duration::from_millis(50))]);
    let factory = MockFactory::with_behaviour(Behaviour {
        init_delay: Duration::from_secs(10),
        ..Behaviour::default()
    });
    let registry = registry_with(store, &factory, MockClock::new());

    let err = registry.get_connector(TENANT, STORE, "retail").await.err().unwrap();

    assert!(matches!(err, StoreLinkError::Initialization { ref message, .. } if message.contains("exceeded 50ms")));
    assert_eq!(registry.cached_count(), 0);
}

/// Abandoning a resolution mid-build still closes the built connector.
///
/// # Test Steps
/// 1. Use a factory whose health check hangs for 10s
/// 2. Drop the resolution after 100ms, once initialize has completed
/// 3. Let the background close run
/// 4. Verify the connector was closed exactly once and nothing was cached
/// 5. Verify a fresh resolution still builds and caches a new instance
#[tokio::test(start_paused = true)]
async fn abandoned_resolution_closes_the_built_connector() {
    let store = MockConfigStore::with(vec![retail_config()]);
    let factory = MockFactory::with_behaviour(Behaviour {
        health_delay: Duration::from_secs(10),
        ..Behaviour::default()
    });
    let registry = registry_with(store, &factory, MockClock::new());

    let abandoned = tokio::time::timeout(
        Duration::from_millis(100),
        registry.get_connector(TENANT, STORE, "retail"),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(factory.lifecycle.initialized(), 1);
    assert_eq!(factory.lifecycle.health_checks(), 1);

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(factory.lifecycle.closed(), 1);
    assert_eq!(registry.cached_count(), 0);

    let resolved = tokio::time::timeout(
        Duration::from_secs(30),
        registry.get_connector(TENANT, STORE, "retail"),
    )
    .await;
    assert!(matches!(resolved, Ok(Ok(_))));
    assert_eq!(factory.lifecycle.created(), 2);
    assert_eq!(factory.lifecycle.closed(), 1);
    assert_eq!(registry.cached_count(), 1);
}

/// A failing health check is logged but the connector is still cached.
///
/// # Test Steps
/// 1. Use a factory whose health check fails
/// 2. Resolve successfully
/// 3. Verify metadata reports the connector cached but unhealthy
#[tokio::test]
async fn unhealthy_connector_is_still_cached() {
    let store = MockConfigStore::with(vec![retail_config()]);
    let factory =
        MockFactory::with_behaviour(Behaviour { fail_health: true, ..Behaviour::default() });
    let registry = registry_with(store, &factory, MockClock::new());

    registry.get_connector(TENANT, STORE, "retail").await.unwrap();
    let metadata = registry.connector_metadata(TENANT, STORE, "retail").await.unwrap();

    assert_eq!(registry.cached_count(), 1);
    assert!(metadata.cached);
    assert_eq!(metadata.healthy, Some(false));
    assert!(metadata.last_checked.is_some());
}

/// Listing reports every configured domain without building connectors.
///
/// # Test Steps
/// 1. Configure retail (cached) plus a disabled wishlist and a kitchen domain
/// 2. List connectors for the store
/// 3. Verify ordering, cache flags and health, and that only one connector
///    was ever built
#[tokio::test]
async fn list_connectors_does_not_construct() {
    let kitchen = ConnectorConfig {
        domain: "kitchen".into(),
        priority: 10,
        ..retail_config()
    };
    let wishlist =
        ConnectorConfig { domain: "wishlist".into(), ..retail_config() }
            .disabled();
    let store = MockConfigStore::with(vec![retail_config(), wishlist, kitchen]);
    let factory = MockFactory::new();
    let registry = registry_with(store, &factory, MockClock::new());
    registry.get_connector(TENANT, STORE, "retail").await.unwrap();

    let listed = registry.list_connectors(TENANT, STORE).await.unwrap();

    let domains: Vec<_> = listed.iter().map(|m| m.domain.as_str()).collect();
    assert_eq!(domains, vec!["kitchen", "retail", "wishlist"]);
    assert!(!listed[0].cached);
    assert_eq!(listed[0].healthy, None);
    assert!(listed[1].cached);
    assert_eq!(listed[1].healthy, Some(true));
    assert_eq!(listed[1].adapter_kind, "static-catalog");
    assert_eq!(listed[1].url, "https://commerce.example.test");
    assert!(!listed[2].enabled);
    assert_eq!(factory.lifecycle.created(), 1);
}

#[tokio::test]
async fn metadata_for_unknown_domain_is_not_found() {
    let registry = registry_with(MockConfigStore::with(vec![]), &MockFactory::new(), MockClock::new());

    let err = registry.connector_metadata(TENANT, STORE, "retail").await.err().unwrap();

    assert!(matches!(err, StoreLinkError::ConnectorNotFound { .. }));
}

/// Close releases every cached connector once and refuses later lookups.
///
/// # Test Steps
/// 1. Cache two connectors and start the eviction task
/// 2. Close the registry twice
/// 3. Verify each connector was closed exactly once and eviction stopped
/// 4. Verify resolution now fails with `Shutdown`
#[tokio::test]
async fn close_is_idempotent_and_refuses_resolution() {
    let wishlist = ConnectorConfig { domain: "wishlist".into(), ..retail_config() };
    let store = MockConfigStore::with(vec![retail_config(), wishlist]);
    let factory = MockFactory::new();
    let registry = registry_with(store, &factory, MockClock::new());
    registry.get_connector(TENANT, STORE, "retail").await.unwrap();
    registry.get_connector(TENANT, STORE, "wishlist").await.unwrap();
    registry.start_eviction().unwrap();
    assert!(registry.is_eviction_running());

    registry.close().await.unwrap();
    registry.close().await.unwrap();

    assert_eq!(factory.lifecycle.closed(), 2);
    assert_eq!(registry.cached_count(), 0);
    assert!(!registry.is_eviction_running());
    assert!(registry.is_closed());
    assert_eq!(
        registry.get_connector(TENANT, STORE, "retail").await.err().unwrap(),
        StoreLinkError::Shutdown
    );
    assert!(matches!(registry.start_eviction(), Err(StoreLinkError::Shutdown)));
}

#[tokio::test]
async fn starting_eviction_twice_is_rejected() {
    let registry = registry_with(MockConfigStore::with(vec![]), &MockFactory::new(), MockClock::new());

    registry.start_eviction().unwrap();

    assert!(matches!(registry.start_eviction(), Err(StoreLinkError::Internal(_))));
    registry.close().await.unwrap();
}

/// The background task sweeps idle connectors on its interval.
///
/// # Test Steps
/// 1. Start eviction and cache a connector
/// 2. Advance the registry clock past the TTL
/// 3. Let tokio time pass one cleanup interval
/// 4. Verify the connector was closed exactly once and removed
#[tokio::test(start_paused = true)]
async fn background_task_evicts_idle_connectors() {
    let store = MockConfigStore::with(vec![retail_config()]);
    let factory = MockFactory::new();
    let clock = MockClock::new();
    let registry = registry_with(store, &factory, clock.clone());
    let settings = registry.settings().clone();
    registry.start_eviction().unwrap();

    registry.get_connector(TENANT, STORE, "retail").await.unwrap();
    clock.advance(settings.cache_ttl() + Duration::from_secs(1));
    tokio::time::sleep(settings.cleanup_interval() + Duration::from_secs(1)).await;

    assert_eq!(factory.lifecycle.closed(), 1);
    assert_eq!(registry.cached_count(), 0);

    tokio::time::sleep(settings.cleanup_interval()).await;
    assert_eq!(factory.lifecycle.closed(), 1);

    registry.close().await.unwrap();
}
