//! Per-key async mutual exclusion
//!
//! [`KeyedMutex`] hands out one async lock per key. Tasks contending for the
//! same key queue behind each other; tasks for different keys never block
//! each other. Combined with a re-check of the protected cache after the lock
//! is acquired, this yields single-flight construction: the first task builds
//! the value, the queued tasks find it and return.
//!
//! Entries are dropped from the table when the last guard or waiter for a key
//! goes away, so the table only holds keys that are currently contended.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub struct KeyedMutex<K>
where
    K: Eq + Hash + Clone,
{
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> Default for KeyedMutex<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self { locks: DashMap::new() }
    }
}

impl<K> fmt::Debug for KeyedMutex<K>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedMutex").field("active_keys", &self.locks.len()).finish()
    }
}

impl<K> KeyedMutex<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &K) -> KeyedGuard<'_, K> {
        let mutex = Arc::clone(
            self.locks.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).value(),
        );
        // Dropped after the lock future if this call is cancelled while queued.
        let mut waiter = Waiter { owner: self, key: Some(key.clone()) };
        let guard = mutex.lock_owned().await;
        let key = waiter.key.take().unwrap_or_else(|| key.clone());
        KeyedGuard { owner: self, key, guard: Some(guard) }
    }

    fn prune(&self, key: &K) {
        self.locks.remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    /// Keys currently held or awaited.
    pub fn active_keys(&self) -> usize {
        self.locks.len()
    }
}

/// A queued `lock` call that has not acquired yet.
struct Waiter<'a, K>
where
    K: Eq + Hash + Clone,
{
    owner: &'a KeyedMutex<K>,
    key: Option<K>,
}

impl<K> Drop for Waiter<'_, K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.owner.prune(&key);
        }
    }
}

/// Exclusive access to one key; released on drop.
pub struct KeyedGuard<'a, K>
where
    K: Eq + Hash + Clone,
{
    owner: &'a KeyedMutex<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K> KeyedGuard<'_, K>
where
    K: Eq + Hash + Clone,
{
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K> Drop for KeyedGuard<'_, K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        // Release first so the guard's own Arc no longer counts.
        drop(self.guard.take());
        self.owner.prune(&self.key);
    }
}
