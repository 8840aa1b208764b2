//! Context snapshots handed to the prompt assembler.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::cache::{CacheKind, Cacheable};
use crate::store::types::{
  ActivityRow, ExpiringProductRow, InsightRow, MovementRow, OrderRow, SystemHealth,
};

/// One independently fetched part of the inventory context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
  Totals,
  StockAlerts,
  Expiring,
  Categories,
  Vendors,
  Movements,
  Orders,
  Insights,
  Activity,
  Forecasts,
}

impl Section {
  /// Whether the overview is misleading without this section.
  pub fn is_critical(self) -> bool {
    matches!(
      self,
      Section::Totals
        | Section::StockAlerts
        | Section::Expiring
        | Section::Categories
        | Section::Vendors
    )
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Section::Totals => "totals",
      Section::StockAlerts => "stock alerts",
      Section::Expiring => "expiring products",
      Section::Categories => "categories",
      Section::Vendors => "vendors",
      Section::Movements => "recent movements",
      Section::Orders => "recent orders",
      Section::Insights => "recent insights",
      Section::Activity => "activity log",
      Section::Forecasts => "forecasts",
    }
  }
}

/// Coarse stock health of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockHealth {
  Healthy,
  Attention,
  Critical,
}

impl StockHealth {
  pub fn as_str(self) -> &'static str {
    match self {
      StockHealth::Healthy => "HEALTHY",
      StockHealth::Attention => "ATTENTION",
      StockHealth::Critical => "CRITICAL",
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overview {
  pub total_products: i64,
  pub total_quantity: i64,
  pub low_stock_count: i64,
  pub critical_stock_count: i64,
  pub out_of_stock_count: i64,
  pub category_count: i64,
  pub vendor_count: i64,
  pub movements_last_30_days: i64,
  /// Sum of price x quantity across categories
  pub total_inventory_value: f64,
  /// Value of sales in the last 30 days
  pub monthly_usage_value: f64,
  /// 0-100
  pub health_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockAlert {
  pub product_name: String,
  pub sku: String,
  pub quantity: i64,
  pub category: Option<String>,
  pub vendor: Option<String>,
  pub usage_last_30_days: i64,
  pub daily_usage: f64,
  /// None when the product has no recent usage
  pub days_of_cover: Option<f64>,
  /// At or below the critical threshold
  pub critical: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryPerformance {
  pub name: String,
  pub product_count: i64,
  pub total_value: f64,
  pub average_price: f64,
  /// Movements in the last 30 days
  pub recent_activity: i64,
  pub low_stock_count: i64,
  pub stock_health: StockHealth,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorPerformance {
  pub name: String,
  pub product_count: i64,
  pub total_orders: usize,
  pub on_time_orders: usize,
  /// Percentage of orders delivered by their expected date
  pub reliability: u8,
  pub average_lead_time_days: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockoutPrediction {
  pub product_name: String,
  pub current_quantity: i64,
  pub predicted_demand: f64,
  pub confidence: f64,
  pub stockout_date: NaiveDate,
  pub days_until_stockout: i64,
  pub recommended_action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandSpike {
  pub category: String,
  pub recent_movements: i64,
  pub previous_movements: i64,
  pub growth_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Predictions {
  pub stockouts: Vec<StockoutPrediction>,
  pub demand_spikes: Vec<DemandSpike>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecentActivity {
  pub movements: Vec<MovementRow>,
  pub orders: Vec<OrderRow>,
  pub insights: Vec<InsightRow>,
  pub activity: Vec<ActivityRow>,
}

/// Derived, read-only snapshot of the inventory.
///
/// Always returned, possibly partial: `failed_sections` lists the queries that
/// failed and were replaced by empty values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryContext {
  pub generated_at: DateTime<Utc>,
  pub overview: Overview,
  pub stock_alerts: Vec<StockAlert>,
  pub expiring_soon: Vec<ExpiringProductRow>,
  pub categories: Vec<CategoryPerformance>,
  pub vendors: Vec<VendorPerformance>,
  pub recent: RecentActivity,
  pub predictions: Predictions,
  pub degraded: bool,
  pub failed_sections: Vec<Section>,
}

impl InventoryContext {
  pub fn is_available(&self, section: Section) -> bool {
    !self.failed_sections.contains(&section)
  }

  pub fn critical_alerts(&self) -> impl Iterator<Item = &StockAlert> {
    self.stock_alerts.iter().filter(|a| a.critical)
  }
}

impl Cacheable for InventoryContext {
  fn cache_kind() -> CacheKind {
    CacheKind::Inventory
  }
}

/// Field of the external context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalField {
  Weather,
  Economic,
  SystemHealth,
}

impl ExternalField {
  pub fn as_str(self) -> &'static str {
    match self {
      ExternalField::Weather => "weather",
      ExternalField::Economic => "economic",
      ExternalField::SystemHealth => "system health",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSnapshot {
  pub location: String,
  pub temperature_c: f64,
  pub conditions: String,
  pub humidity: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EconomicSnapshot {
  pub base_currency: String,
  pub rates: BTreeMap<String, f64>,
  pub updated_at: Option<String>,
}

/// Third-party feeds and local system health. Each field is best-effort.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalContext {
  pub generated_at: DateTime<Utc>,
  pub weather: Option<WeatherSnapshot>,
  pub economic: Option<EconomicSnapshot>,
  pub system_health: Option<SystemHealth>,
  pub unavailable: Vec<ExternalField>,
}

impl Cacheable for ExternalContext {
  fn cache_kind() -> CacheKind {
    CacheKind::External
  }
}

/// Recent actions of one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserContext {
  pub user_id: String,
  pub recent_actions: Vec<ActivityRow>,
  pub available: bool,
}

impl Cacheable for UserContext {
  fn cache_kind() -> CacheKind {
    CacheKind::UserSpecific
  }
}
