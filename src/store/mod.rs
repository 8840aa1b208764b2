//! Read access to the authoritative inventory records.
//!
//! Every query is independently fallible so a context build can keep going
//! when one of them fails.

mod sqlite;
pub mod types;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::config::InventoryConfig;
use crate::error::FetchError;
use types::{
  ActivityRow, CategoryRow, ExpiringProductRow, ForecastRow, InsightRow, InventoryTotals,
  MovementRow, OrderRow, StockAlertRow, SystemHealth, VendorRow,
};

pub use sqlite::{MovementKind, SqliteStore};

/// Inputs shared by the queries of one build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryParams {
  pub now: DateTime<Utc>,
  pub low_stock_threshold: i64,
  pub critical_stock_threshold: i64,
  pub expiry_window_days: i64,
  pub recent_limit: usize,
}

impl QueryParams {
  pub fn new(now: DateTime<Utc>, config: &InventoryConfig) -> Self {
    Self {
      now,
      low_stock_threshold: config.low_stock_threshold,
      critical_stock_threshold: config.critical_stock_threshold,
      expiry_window_days: config.expiry_window_days,
      recent_limit: config.recent_limit,
    }
  }

  pub fn days_ago(&self, days: i64) -> DateTime<Utc> {
    self.now - Duration::days(days)
  }

  pub fn today(&self) -> NaiveDate {
    self.now.date_naive()
  }
}

/// Read queries the context builders depend on.
pub trait InventoryStore: Send + Sync + 'static {
  async fn totals(&self, params: &QueryParams) -> Result<InventoryTotals, FetchError>;

  /// Products at or below the low-stock threshold, lowest quantity first.
  async fn stock_alerts(&self, params: &QueryParams) -> Result<Vec<StockAlertRow>, FetchError>;

  /// Products expiring between today and the end of the expiry window.
  async fn expiring_products(
    &self,
    params: &QueryParams,
  ) -> Result<Vec<ExpiringProductRow>, FetchError>;

  async fn categories(&self, params: &QueryParams) -> Result<Vec<CategoryRow>, FetchError>;

  async fn vendors(&self, params: &QueryParams) -> Result<Vec<VendorRow>, FetchError>;

  async fn recent_movements(&self, params: &QueryParams) -> Result<Vec<MovementRow>, FetchError>;

  async fn recent_orders(&self, params: &QueryParams) -> Result<Vec<OrderRow>, FetchError>;

  async fn recent_insights(&self, params: &QueryParams) -> Result<Vec<InsightRow>, FetchError>;

  async fn recent_activity(&self, params: &QueryParams) -> Result<Vec<ActivityRow>, FetchError>;

  /// Forecasts dated today or later, soonest first.
  async fn upcoming_forecasts(&self, params: &QueryParams) -> Result<Vec<ForecastRow>, FetchError>;

  async fn system_health(&self, now: DateTime<Utc>) -> Result<SystemHealth, FetchError>;

  async fn user_activity(
    &self,
    user_id: &str,
    params: &QueryParams,
  ) -> Result<Vec<ActivityRow>, FetchError>;
}
