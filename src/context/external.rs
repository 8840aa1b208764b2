//! Builds the external context from third-party feeds and system health.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::feeds::ExternalFeeds;
use super::types::{ExternalContext, ExternalField};
use crate::cache::{CacheLayer, CacheResult};
use crate::error::FetchError;
use crate::store::InventoryStore;

pub const EXTERNAL_CONTEXT_KEY: &str = "external_context";

/// Builds [`ExternalContext`] through the cache.
///
/// All three sources are fetched concurrently and each one settles on its
/// own: a failed feed leaves its field empty and the others untouched.
pub struct ExternalContextBuilder<S, F> {
  store: Arc<S>,
  feeds: Arc<F>,
  cache: CacheLayer,
  timeout: Duration,
}

impl<S: InventoryStore, F: ExternalFeeds> ExternalContextBuilder<S, F> {
  pub fn new(store: Arc<S>, feeds: Arc<F>, cache: CacheLayer, timeout: Duration) -> Self {
    Self {
      store,
      feeds,
      cache,
      timeout,
    }
  }

  pub async fn build(&self) -> Arc<ExternalContext> {
    self.fetch().await.data
  }

  pub async fn fetch(&self) -> CacheResult<Arc<ExternalContext>> {
    self
      .cache
      .get_or_build(EXTERNAL_CONTEXT_KEY, || self.assemble())
      .await
  }

  pub fn invalidate(&self) -> bool {
    self.cache.cache().invalidate(EXTERNAL_CONTEXT_KEY)
  }

  async fn assemble(&self) -> ExternalContext {
    let now = self.cache.cache().clock().now();

    let (weather, economic, system_health) = tokio::join!(
      self.bounded("weather", self.feeds.weather()),
      self.bounded("economic", self.feeds.economic()),
      self.bounded("system health", self.store.system_health(now)),
    );

    let mut unavailable = Vec::new();
    let weather = settle(ExternalField::Weather, weather, &mut unavailable);
    let economic = settle(ExternalField::Economic, economic, &mut unavailable);
    let system_health = settle(ExternalField::SystemHealth, system_health, &mut unavailable);

    info!(unavailable = unavailable.len(), "built external context");
    ExternalContext {
      generated_at: now,
      weather,
      economic,
      system_health,
      unavailable,
    }
  }

  async fn bounded<T>(
    &self,
    what: &'static str,
    fut: impl Future<Output = Result<T, FetchError>>,
  ) -> Result<T, FetchError> {
    tokio::time::timeout(self.timeout, fut)
      .await
      .map_err(|_| FetchError::Timeout(what))?
  }
}

fn settle<T>(
  field: ExternalField,
  result: Result<T, FetchError>,
  unavailable: &mut Vec<ExternalField>,
) -> Option<T> {
  match result {
    Ok(value) => Some(value),
    Err(err) => {
      warn!(field = field.as_str(), error = %err, "external source unavailable");
      unavailable.push(field);
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, CacheTtls, Clock, ContextCache, ManualClock};
  use crate::context::types::{EconomicSnapshot, WeatherSnapshot};
  use crate::db::{seed::seed_demo_data, Database};
  use crate::store::SqliteStore;
  use chrono::Duration as ChronoDuration;
  use std::collections::BTreeMap;

  struct StubFeeds {
    weather_key: bool,
    economic_delay: Duration,
  }

  impl ExternalFeeds for StubFeeds {
    async fn weather(&self) -> Result<WeatherSnapshot, FetchError> {
      if !self.weather_key {
        return Err(FetchError::MissingApiKey("weather API"));
      }
      Ok(WeatherSnapshot {
        location: "London".to_string(),
        temperature_c: 18.0,
        conditions: "clear sky".to_string(),
        humidity: Some(60),
      })
    }

    async fn economic(&self) -> Result<EconomicSnapshot, FetchError> {
      tokio::time::sleep(self.economic_delay).await;
      Ok(EconomicSnapshot {
        base_currency: "USD".to_string(),
        rates: BTreeMap::from([("EUR".to_string(), 0.92)]),
        updated_at: None,
      })
    }
  }

  fn builder(
    feeds: StubFeeds,
  ) -> (
    Arc<ManualClock>,
    ExternalContextBuilder<SqliteStore, StubFeeds>,
  ) {
    let clock = Arc::new(ManualClock::fixed());
    let cache = Arc::new(ContextCache::with_clock(CacheTtls::default(), clock.clone()));
    let db = Database::open_in_memory().unwrap();
    seed_demo_data(db.conn(), clock.now()).unwrap();

    let builder = ExternalContextBuilder::new(
      Arc::new(SqliteStore::new(db)),
      Arc::new(feeds),
      CacheLayer::new(cache),
      Duration::from_millis(200),
    );
    (clock, builder)
  }

  #[tokio::test]
  async fn test_missing_key_leaves_other_fields() {
    let (_clock, builder) = builder(StubFeeds {
      weather_key: false,
      economic_delay: Duration::ZERO,
    });

    let context = builder.build().await;

    assert!(context.weather.is_none());
    assert_eq!(context.economic.as_ref().map(|e| e.rates.len()), Some(1));
    assert_eq!(
      context.system_health.as_ref().map(|h| h.product_count),
      Some(18)
    );
    assert_eq!(context.unavailable, vec![ExternalField::Weather]);
  }

  #[tokio::test]
  async fn test_slow_feed_times_out() {
    let (_clock, builder) = builder(StubFeeds {
      weather_key: true,
      economic_delay: Duration::from_secs(5),
    });

    let context = builder.build().await;

    assert!(context.weather.is_some());
    assert!(context.economic.is_none());
    assert_eq!(context.unavailable, vec![ExternalField::Economic]);
  }

  #[tokio::test]
  async fn test_external_ttl_is_fifteen_minutes() {
    let (clock, builder) = builder(StubFeeds {
      weather_key: true,
      economic_delay: Duration::ZERO,
    });

    builder.build().await;
    clock.advance(ChronoDuration::minutes(14));
    assert_eq!(builder.fetch().await.source, CacheSource::CacheFresh);

    clock.advance(ChronoDuration::minutes(2));
    assert_eq!(builder.fetch().await.source, CacheSource::Built);
  }

  #[tokio::test]
  async fn test_invalidate_forces_rebuild() {
    let (_clock, builder) = builder(StubFeeds {
      weather_key: true,
      economic_delay: Duration::ZERO,
    });

    builder.build().await;
    assert!(builder.invalidate());
    assert!(!builder.invalidate());
    assert_eq!(builder.fetch().await.source, CacheSource::Built);
  }
}
