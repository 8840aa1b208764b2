//! Builds the aggregated inventory snapshot.

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::stats;
use super::types::{InventoryContext, Overview, Predictions, RecentActivity, Section};
use crate::cache::{CacheLayer, CacheResult};
use crate::config::InventoryConfig;
use crate::error::FetchError;
use crate::store::{InventoryStore, QueryParams};

pub const INVENTORY_CONTEXT_KEY: &str = "inventory_context";

/// Collects the sections that failed during one build.
#[derive(Debug, Default)]
struct SectionFailures(Vec<Section>);

impl SectionFailures {
  /// Unwrap a section result, recording and logging a failure as an empty value.
  fn take<T: Default>(&mut self, section: Section, result: Result<T, FetchError>) -> T {
    match result {
      Ok(value) => value,
      Err(err) => {
        if section.is_critical() {
          error!(section = section.as_str(), error = %err, "inventory query failed");
        } else {
          warn!(section = section.as_str(), error = %err, "inventory query failed");
        }
        self.0.push(section);
        T::default()
      }
    }
  }
}

/// Builds [`InventoryContext`] through the cache.
pub struct InventoryContextBuilder<S> {
  store: Arc<S>,
  cache: CacheLayer,
  settings: InventoryConfig,
}

impl<S: InventoryStore> InventoryContextBuilder<S> {
  pub fn new(store: Arc<S>, cache: CacheLayer, settings: InventoryConfig) -> Self {
    Self {
      store,
      cache,
      settings,
    }
  }

  /// Get the inventory context, rebuilding it on a cache miss.
  pub async fn build(&self) -> Arc<InventoryContext> {
    self.fetch().await.data
  }

  /// Like [`build`](Self::build), with cache metadata.
  pub async fn fetch(&self) -> CacheResult<Arc<InventoryContext>> {
    self
      .cache
      .get_or_build(INVENTORY_CONTEXT_KEY, || self.assemble())
      .await
  }

  /// Drop the cached context so the next build reads fresh data.
  pub fn invalidate(&self) -> bool {
    self.cache.cache().invalidate(INVENTORY_CONTEXT_KEY)
  }

  async fn assemble(&self) -> InventoryContext {
    let started = Instant::now();
    let params = QueryParams::new(self.cache.cache().clock().now(), &self.settings);
    let store = &*self.store;

    let (
      totals,
      alerts,
      expiring,
      categories,
      vendors,
      movements,
      orders,
      insights,
      activity,
      forecasts,
    ) = tokio::join!(
      store.totals(&params),
      store.stock_alerts(&params),
      store.expiring_products(&params),
      store.categories(&params),
      store.vendors(&params),
      store.recent_movements(&params),
      store.recent_orders(&params),
      store.recent_insights(&params),
      store.recent_activity(&params),
      store.upcoming_forecasts(&params),
    );

    let mut failures = SectionFailures::default();
    let totals = failures.take(Section::Totals, totals);
    let alerts = failures.take(Section::StockAlerts, alerts);
    let expiring = failures.take(Section::Expiring, expiring);
    let categories = failures.take(Section::Categories, categories);
    let vendors = failures.take(Section::Vendors, vendors);
    let movements = failures.take(Section::Movements, movements);
    let orders = failures.take(Section::Orders, orders);
    let insights = failures.take(Section::Insights, insights);
    let activity = failures.take(Section::Activity, activity);
    let forecasts = failures.take(Section::Forecasts, forecasts);

    let overview = Overview {
      total_products: totals.total_products,
      total_quantity: totals.total_quantity,
      low_stock_count: totals.low_stock_count,
      critical_stock_count: totals.critical_stock_count,
      out_of_stock_count: totals.out_of_stock_count,
      category_count: totals.category_count,
      vendor_count: totals.vendor_count,
      movements_last_30_days: totals.movements_last_30_days,
      total_inventory_value: stats::total_inventory_value(&categories),
      monthly_usage_value: totals.monthly_usage_value,
      health_score: stats::health_score(&totals),
    };

    let predictions = Predictions {
      stockouts: stats::stockout_predictions(&forecasts, params.today()),
      demand_spikes: stats::demand_spikes(&categories),
    };

    let failed_sections = failures.0;
    let context = InventoryContext {
      generated_at: params.now,
      overview,
      stock_alerts: alerts
        .iter()
        .map(|row| stats::stock_alert(row, params.critical_stock_threshold))
        .collect(),
      expiring_soon: expiring,
      categories: categories.iter().map(stats::category_performance).collect(),
      vendors: vendors.iter().map(stats::vendor_performance).collect(),
      recent: RecentActivity {
        movements,
        orders,
        insights,
        activity,
      },
      predictions,
      degraded: !failed_sections.is_empty(),
      failed_sections,
    };

    info!(
      elapsed_ms = started.elapsed().as_millis() as u64,
      health_score = context.overview.health_score,
      degraded = context.degraded,
      "built inventory context"
    );
    context
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, CacheTtls, Clock, ContextCache, ManualClock};
  use crate::context::types::StockHealth;
  use crate::db::{seed::seed_demo_data, Database};
  use crate::store::types::*;
  use crate::store::SqliteStore;
  use chrono::{DateTime, Duration, Utc};
  use std::sync::atomic::{AtomicU32, Ordering};

  fn clock_and_layer() -> (Arc<ManualClock>, CacheLayer) {
    let clock = Arc::new(ManualClock::fixed());
    let cache = Arc::new(ContextCache::with_clock(CacheTtls::default(), clock.clone()));
    (clock, CacheLayer::new(cache))
  }

  fn seeded_builder() -> (Arc<ManualClock>, InventoryContextBuilder<SqliteStore>) {
    let (clock, layer) = clock_and_layer();
    let db = Database::open_in_memory().unwrap();
    seed_demo_data(db.conn(), clock.now()).unwrap();
    let store = Arc::new(SqliteStore::new(db));
    (
      clock,
      InventoryContextBuilder::new(store, layer, InventoryConfig::default()),
    )
  }

  /// Store that counts builds and can fail chosen sections.
  #[derive(Default)]
  struct StubStore {
    calls: AtomicU32,
    fail_critical: bool,
    fail_optional: bool,
  }

  impl StubStore {
    fn fail<T>(&self, fail: bool, value: T) -> Result<T, FetchError> {
      if fail {
        Err(FetchError::TaskJoin("stub failure".to_string()))
      } else {
        Ok(value)
      }
    }
  }

  impl InventoryStore for StubStore {
    async fn totals(&self, _: &QueryParams) -> Result<InventoryTotals, FetchError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self.fail(
        self.fail_critical,
        InventoryTotals {
          total_products: 4,
          low_stock_count: 1,
          category_count: 1,
          vendor_count: 1,
          movements_last_30_days: 5,
          ..Default::default()
        },
      )
    }

    async fn stock_alerts(&self, _: &QueryParams) -> Result<Vec<StockAlertRow>, FetchError> {
      Ok(Vec::new())
    }

    async fn expiring_products(
      &self,
      _: &QueryParams,
    ) -> Result<Vec<ExpiringProductRow>, FetchError> {
      Ok(Vec::new())
    }

    async fn categories(&self, _: &QueryParams) -> Result<Vec<CategoryRow>, FetchError> {
      self.fail(
        self.fail_critical,
        vec![CategoryRow {
          id: 1,
          name: "Only".to_string(),
          product_count: 4,
          total_quantity: 40,
          total_value: 100.0,
          price_sum: 10.0,
          low_stock_count: 1,
          movements_last_30_days: 5,
          movements_prev_30_days: 5,
        }],
      )
    }

    async fn vendors(&self, _: &QueryParams) -> Result<Vec<VendorRow>, FetchError> {
      Ok(Vec::new())
    }

    async fn recent_movements(&self, _: &QueryParams) -> Result<Vec<MovementRow>, FetchError> {
      self.fail(self.fail_optional, Vec::new())
    }

    async fn recent_orders(&self, _: &QueryParams) -> Result<Vec<OrderRow>, FetchError> {
      self.fail(self.fail_optional, Vec::new())
    }

    async fn recent_insights(&self, _: &QueryParams) -> Result<Vec<InsightRow>, FetchError> {
      Ok(Vec::new())
    }

    async fn recent_activity(&self, _: &QueryParams) -> Result<Vec<ActivityRow>, FetchError> {
      Ok(Vec::new())
    }

    async fn upcoming_forecasts(&self, _: &QueryParams) -> Result<Vec<ForecastRow>, FetchError> {
      self.fail(self.fail_optional, Vec::new())
    }

    async fn system_health(&self, _: DateTime<Utc>) -> Result<SystemHealth, FetchError> {
      unreachable!("not used by the inventory builder")
    }

    async fn user_activity(
      &self,
      _: &str,
      _: &QueryParams,
    ) -> Result<Vec<ActivityRow>, FetchError> {
      Ok(Vec::new())
    }
  }

  fn stub_builder(
    store: StubStore,
  ) -> (
    Arc<ManualClock>,
    Arc<StubStore>,
    InventoryContextBuilder<StubStore>,
  ) {
    let (clock, layer) = clock_and_layer();
    let store = Arc::new(store);
    let builder = InventoryContextBuilder::new(store.clone(), layer, InventoryConfig::default());
    (clock, store, builder)
  }

  #[tokio::test]
  async fn test_seeded_context() {
    let (clock, builder) = seeded_builder();
    let context = builder.build().await;

    assert!(!context.degraded);
    assert_eq!(context.generated_at, clock.now());
    assert_eq!(context.overview.health_score, 60);
    assert_eq!(context.overview.total_products, 18);
    assert!((context.overview.total_inventory_value - 1665.81).abs() < 1e-6);
    assert_eq!(context.critical_alerts().count(), 3);
    assert_eq!(context.expiring_soon.len(), 5);

    let health = |name: &str| {
      context
        .categories
        .iter()
        .find(|c| c.name == name)
        .map(|c| c.stock_health)
    };
    assert_eq!(health("Bakery"), Some(StockHealth::Healthy));
    assert_eq!(health("Dairy"), Some(StockHealth::Attention));
    assert_eq!(health("Beverages"), Some(StockHealth::Critical));

    let reliability = |name: &str| {
      context
        .vendors
        .iter()
        .find(|v| v.name == name)
        .map(|v| v.reliability)
    };
    assert_eq!(reliability("FreshFarm Co"), Some(100));
    assert_eq!(reliability("Sunrise Beverages"), Some(50));
    assert_eq!(reliability("CrunchTime Foods"), Some(33));
    assert_eq!(reliability("BrightHome Supply"), Some(100));

    let stockouts: Vec<&str> = context
      .predictions
      .stockouts
      .iter()
      .map(|p| p.product_name.as_str())
      .collect();
    assert_eq!(stockouts, vec!["Avocados", "Orange Juice 1L", "Cold Brew Coffee"]);

    let spikes: Vec<&str> = context
      .predictions
      .demand_spikes
      .iter()
      .map(|s| s.category.as_str())
      .collect();
    assert_eq!(spikes, vec!["Beverages", "Produce"]);
  }

  #[tokio::test]
  async fn test_ttl_scenario_hit_then_rebuild() {
    let (clock, _store, builder) = stub_builder(StubStore::default());

    let first = builder.fetch().await;
    assert_eq!(first.source, CacheSource::Built);

    clock.advance(Duration::minutes(4));
    let second = builder.fetch().await;
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert!(Arc::ptr_eq(&first.data, &second.data));

    clock.advance(Duration::minutes(2));
    let third = builder.fetch().await;
    assert_eq!(third.source, CacheSource::Built);
    assert!(!Arc::ptr_eq(&first.data, &third.data));
    assert_eq!(third.data.generated_at, clock.now());
  }

  #[tokio::test]
  async fn test_invalidate_forces_rebuild() {
    let (_clock, store, builder) = stub_builder(StubStore::default());

    builder.build().await;
    assert!(builder.invalidate());
    builder.build().await;

    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_optional_failures_degrade() {
    let (_clock, _store, builder) = stub_builder(StubStore {
      fail_optional: true,
      ..Default::default()
    });

    let context = builder.build().await;

    assert!(context.degraded);
    assert_eq!(
      context.failed_sections,
      vec![Section::Movements, Section::Orders, Section::Forecasts]
    );
    assert_eq!(context.overview.total_products, 4);
    assert!(context.is_available(Section::Totals));
  }

  #[tokio::test]
  async fn test_critical_failures_still_return_context() {
    let (_clock, _store, builder) = stub_builder(StubStore {
      fail_critical: true,
      ..Default::default()
    });

    let context = builder.build().await;

    assert!(context.degraded);
    assert_eq!(
      context.failed_sections,
      vec![Section::Totals, Section::Categories]
    );
    assert_eq!(context.overview, Overview::default());
    assert!(context.categories.is_empty());
  }
}
