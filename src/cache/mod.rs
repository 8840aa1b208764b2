//! Process-local caching of derived context objects.
//!
//! This module provides:
//! - A TTL cache keyed by string, with TTLs chosen by value kind
//! - Lazy expiry on read (no background sweeper)
//! - Key and regex-pattern invalidation
//! - Compute-if-absent with per-key locking for concurrent misses

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::ContextCache;
pub use traits::{CacheKind, CacheResult, CacheTtls, Cacheable, Clock};

#[cfg(test)]
pub use traits::{CacheSource, ManualClock};
