//! Cache layer that orchestrates compute-if-absent over the context cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use super::storage::ContextCache;
use super::traits::{CacheResult, Cacheable};

/// Cache layer that manages caching logic and rebuilding.
///
/// Sits between the context builders and the cache. A miss takes a per-key
/// lock for the whole check-build-store sequence, so concurrent misses on
/// one key wait for a single rebuild instead of each running their own.
/// The lock is dropped from the table once its last caller is done.
pub struct CacheLayer {
  cache: Arc<ContextCache>,
  key_locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl CacheLayer {
  pub fn new(cache: Arc<ContextCache>) -> Self {
    Self {
      cache,
      key_locks: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  pub fn cache(&self) -> &Arc<ContextCache> {
    &self.cache
  }

  fn key_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
    let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(key.to_string()).or_default())
  }

  fn release_key_lock(&self, key: &str, lock: &Arc<AsyncMutex<()>>) {
    let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
    // Held by the table and by us only: nobody else is waiting on it.
    let ours = locks.get(key).is_some_and(|held| Arc::ptr_eq(held, lock));
    if ours && Arc::strong_count(lock) == 2 {
      locks.remove(key);
    }
  }

  /// Return the cached value for `key`, or build, store and return it.
  ///
  /// 1. Check cache - if fresh, return immediately
  /// 2. Take the key lock and check again (another caller may have built it)
  /// 3. Build, store under `T`'s TTL class, return
  pub async fn get_or_build<T, F, Fut>(&self, key: &str, build: F) -> CacheResult<Arc<T>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
  {
    if let Some((data, cached_at)) = self.cache.lookup_with_stats::<T>(key) {
      debug!(key, "context cache hit");
      return CacheResult::from_cache(data, cached_at);
    }

    let lock = self.key_lock(key);
    let result = self.build_locked(key, &lock, build).await;
    self.release_key_lock(key, &lock);
    result
  }

  async fn build_locked<T, F, Fut>(
    &self,
    key: &str,
    lock: &AsyncMutex<()>,
    build: F,
  ) -> CacheResult<Arc<T>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
  {
    let _guard = lock.lock().await;

    if let Some((data, cached_at)) = self.cache.lookup::<T>(key) {
      debug!(key, "context built by concurrent caller");
      return CacheResult::from_cache(data, cached_at);
    }

    debug!(key, "context cache miss, rebuilding");
    let data = Arc::new(build().await);
    let cached_at = self.cache.set(key, Arc::clone(&data), T::cache_kind());
    CacheResult::built(data, cached_at)
  }

  #[cfg(test)]
  fn pending_locks(&self) -> usize {
    self.key_locks.lock().unwrap_or_else(PoisonError::into_inner).len()
  }
}

impl Clone for CacheLayer {
  fn clone(&self) -> Self {
    Self {
      cache: Arc::clone(&self.cache),
      key_locks: Arc::clone(&self.key_locks),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::traits::{CacheKind, CacheSource, CacheTtls, ManualClock};
  use chrono::Duration;
  use std::sync::atomic::{AtomicU32, Ordering};

  #[derive(Debug, PartialEq)]
  struct Snapshot(u32);

  impl Cacheable for Snapshot {
    fn cache_kind() -> CacheKind {
      CacheKind::Inventory
    }
  }

  fn layer() -> (CacheLayer, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::fixed());
    let cache = Arc::new(ContextCache::with_clock(CacheTtls::default(), clock.clone()));
    (CacheLayer::new(cache), clock)
  }

  #[tokio::test]
  async fn test_miss_builds_then_hits() {
    let (layer, clock) = layer();
    let counter = AtomicU32::new(0);
    let builds = &counter;
    let build = move || async move { Snapshot(builds.fetch_add(1, Ordering::SeqCst)) };

    let first = layer.get_or_build("inventory_context", build).await;
    assert_eq!(first.source, CacheSource::Built);

    clock.advance(Duration::minutes(4));
    let second = layer.get_or_build("inventory_context", build).await;
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert!(Arc::ptr_eq(&first.data, &second.data));

    clock.advance(Duration::minutes(2));
    let third = layer.get_or_build("inventory_context", build).await;
    assert_eq!(third.source, CacheSource::Built);
    assert_eq!(*third.data, Snapshot(1));
    assert_eq!(builds.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_concurrent_misses_build_once() {
    let (layer, _) = layer();
    let builds = Arc::new(AtomicU32::new(0));

    let tasks: Vec<_> = (0..8)
      .map(|_| {
        let layer = layer.clone();
        let builds = builds.clone();
        tokio::spawn(async move {
          layer
            .get_or_build("inventory_context", || async move {
              tokio::time::sleep(std::time::Duration::from_millis(20)).await;
              Snapshot(builds.fetch_add(1, Ordering::SeqCst))
            })
            .await
            .data
        })
      })
      .collect();

    let results = futures::future::join_all(tasks).await;
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    for result in results {
      assert_eq!(*result.unwrap(), Snapshot(0));
    }
    assert_eq!(layer.pending_locks(), 0);
  }

  #[tokio::test]
  async fn test_key_locks_do_not_accumulate() {
    let (layer, _) = layer();
    for user in 0..50 {
      let key = format!("user_context:user-{}", user);
      layer.get_or_build(&key, || async { Snapshot(user) }).await;
    }

    assert_eq!(layer.cache().stats().entries, 50);
    assert_eq!(layer.pending_locks(), 0);
  }

  #[tokio::test]
  async fn test_hits_are_counted() {
    let (layer, _) = layer();
    layer.get_or_build("k", || async { Snapshot(0) }).await;
    layer.get_or_build("k", || async { Snapshot(0) }).await;

    let stats = layer.cache().stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
  }
}
