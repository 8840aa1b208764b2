//! In-memory context cache with lazy TTL expiry.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::traits::{CacheKind, CacheTtls, Clock, SystemClock};

/// A single cached value.
///
/// Entries are replaced wholesale on refresh and never mutated in place.
struct CacheEntry {
  data: Arc<dyn Any + Send + Sync>,
  timestamp: DateTime<Utc>,
  ttl: Duration,
}

impl CacheEntry {
  fn is_valid(&self, now: DateTime<Utc>) -> bool {
    now - self.timestamp <= self.ttl
  }
}

/// Hit/miss counters and current size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
  pub hits: u64,
  pub misses: u64,
  /// Physical entries, including expired ones not yet swept
  pub entries: usize,
}

impl CacheStats {
  pub fn hit_rate(&self) -> f64 {
    let total = self.hits + self.misses;
    if total == 0 {
      0.0
    } else {
      self.hits as f64 / total as f64
    }
  }
}

/// Process-local cache of derived context objects.
///
/// Expiry is checked only on read; there is no background sweeper. The map
/// holds a handful of named keys, so expired entries lingering until their
/// next read cost next to nothing.
pub struct ContextCache {
  entries: Mutex<HashMap<String, CacheEntry>>,
  ttls: CacheTtls,
  clock: Arc<dyn Clock>,
  hits: AtomicU64,
  misses: AtomicU64,
}

impl ContextCache {
  /// Create a cache backed by the wall clock.
  pub fn new(ttls: CacheTtls) -> Self {
    Self::with_clock(ttls, Arc::new(SystemClock))
  }

  pub fn with_clock(ttls: CacheTtls, clock: Arc<dyn Clock>) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      ttls,
      clock,
      hits: AtomicU64::new(0),
      misses: AtomicU64::new(0),
    }
  }

  pub fn clock(&self) -> &Arc<dyn Clock> {
    &self.clock
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
    // The map is left consistent by every critical section, so a poisoned
    // lock is still safe to use.
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Store a value under `key` with the TTL of `kind`, replacing any previous entry.
  ///
  /// Returns the timestamp recorded for the entry.
  pub fn set<T: Any + Send + Sync>(
    &self,
    key: &str,
    value: Arc<T>,
    kind: CacheKind,
  ) -> DateTime<Utc> {
    let timestamp = self.clock.now();
    let entry = CacheEntry {
      data: value,
      timestamp,
      ttl: self.ttls.ttl_for(kind),
    };
    self.entries().insert(key.to_string(), entry);
    debug!(key, kind = kind.as_str(), "cache set");
    timestamp
  }

  /// Get an unexpired value. An expired entry found here is evicted.
  #[allow(dead_code)]
  pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
    self.lookup(key).map(|(data, _)| data)
  }

  /// Like [`get`](Self::get), but counts the outcome in the hit/miss stats.
  #[allow(dead_code)]
  pub fn get_with_stats<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
    self.lookup_with_stats(key).map(|(data, _)| data)
  }

  /// Get an unexpired value together with the time it was stored.
  pub fn lookup<T: Any + Send + Sync>(&self, key: &str) -> Option<(Arc<T>, DateTime<Utc>)> {
    let now = self.clock.now();
    let mut entries = self.entries();

    let entry = entries.get(key)?;
    if !entry.is_valid(now) {
      entries.remove(key);
      debug!(key, "cache entry expired");
      return None;
    }

    let timestamp = entry.timestamp;
    Arc::clone(&entry.data)
      .downcast::<T>()
      .ok()
      .map(|data| (data, timestamp))
  }

  pub fn lookup_with_stats<T: Any + Send + Sync>(
    &self,
    key: &str,
  ) -> Option<(Arc<T>, DateTime<Utc>)> {
    let result = self.lookup(key);
    if result.is_some() {
      self.hits.fetch_add(1, Ordering::Relaxed);
    } else {
      self.misses.fetch_add(1, Ordering::Relaxed);
    }
    result
  }

  /// Remove one key. Returns whether an entry was present.
  pub fn invalidate(&self, key: &str) -> bool {
    self.entries().remove(key).is_some()
  }

  /// Remove every key matching `pattern`. Returns the number of keys removed.
  pub fn invalidate_pattern(&self, pattern: &Regex) -> usize {
    let mut entries = self.entries();
    let before = entries.len();
    entries.retain(|key, _| !pattern.is_match(key));
    let removed = before - entries.len();
    debug!(pattern = pattern.as_str(), removed, "cache invalidated by pattern");
    removed
  }

  /// Compile `pattern` and invalidate the keys it matches.
  pub fn invalidate_matching(&self, pattern: &str) -> Result<usize, regex::Error> {
    let regex = Regex::new(pattern)?;
    Ok(self.invalidate_pattern(&regex))
  }

  pub fn clear(&self) {
    self.entries().clear();
  }

  pub fn stats(&self) -> CacheStats {
    CacheStats {
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      entries: self.entries().len(),
    }
  }
}

impl std::fmt::Debug for ContextCache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ContextCache")
      .field("ttls", &self.ttls)
      .field("stats", &self.stats())
      .finish_non_exhaustive()
  }
}
