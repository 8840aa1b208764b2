//! Core traits and types for the context cache.

use chrono::{DateTime, Duration, Utc};
use std::any::Any;

/// TTL class a cached value is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
  /// Aggregated inventory snapshot
  Inventory,
  /// Third-party feeds and system health; changes slowly
  External,
  /// Per-user data
  UserSpecific,
}

impl CacheKind {
  pub fn default_ttl(self) -> Duration {
    match self {
      CacheKind::Inventory => Duration::minutes(5),
      CacheKind::External => Duration::minutes(15),
      CacheKind::UserSpecific => Duration::minutes(2),
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      CacheKind::Inventory => "inventory",
      CacheKind::External => "external",
      CacheKind::UserSpecific => "user-specific",
    }
  }
}

/// TTL for each cache kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
  pub inventory: Duration,
  pub external: Duration,
  pub user_specific: Duration,
}

impl Default for CacheTtls {
  fn default() -> Self {
    Self {
      inventory: CacheKind::Inventory.default_ttl(),
      external: CacheKind::External.default_ttl(),
      user_specific: CacheKind::UserSpecific.default_ttl(),
    }
  }
}

impl CacheTtls {
  pub fn ttl_for(&self, kind: CacheKind) -> Duration {
    match kind {
      CacheKind::Inventory => self.inventory,
      CacheKind::External => self.external,
      CacheKind::UserSpecific => self.user_specific,
    }
  }
}

/// Trait for values that can live in the context cache.
///
/// Implementors declare the TTL class they are stored under; the cache key is
/// chosen by the caller.
pub trait Cacheable: Any + Send + Sync {
  fn cache_kind() -> CacheKind;
}

/// Source of the current time for expiry checks.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was stored
  pub cached_at: DateTime<Utc>,
}

impl<T> CacheResult<T> {
  /// Create a result for data that was just built and stored.
  pub fn built(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Built,
      cached_at,
    }
  }

  /// Create a result for data served from a live entry.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
      cached_at,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Rebuilt on a miss
  Built,
  /// Served from an unexpired entry
  CacheFresh,
}

#[cfg(test)]
pub use manual::ManualClock;
