//! Rows returned by inventory store queries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Store-wide counts and sums.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventoryTotals {
  pub total_products: i64,
  pub total_quantity: i64,
  pub low_stock_count: i64,
  pub critical_stock_count: i64,
  pub out_of_stock_count: i64,
  pub category_count: i64,
  pub vendor_count: i64,
  pub movements_last_30_days: i64,
  /// Value of sale movements in the last 30 days
  pub monthly_usage_value: f64,
}

/// Product at or below the low-stock threshold, with its recent usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockAlertRow {
  pub product_id: i64,
  pub name: String,
  pub sku: String,
  pub quantity: i64,
  pub price: f64,
  pub category: Option<String>,
  pub vendor: Option<String>,
  /// Units sold or shipped out in the last 30 days
  pub usage_last_30_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpiringProductRow {
  pub product_id: i64,
  pub name: String,
  pub sku: String,
  pub quantity: i64,
  pub expiry_date: NaiveDate,
}

/// Category with aggregates over its products and their movements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRow {
  pub id: i64,
  pub name: String,
  pub product_count: i64,
  pub total_quantity: i64,
  /// Sum of price x quantity
  pub total_value: f64,
  pub price_sum: f64,
  pub low_stock_count: i64,
  pub movements_last_30_days: i64,
  /// Movements 30 to 60 days ago
  pub movements_prev_30_days: i64,
}

/// Delivery timing of one purchase order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderTiming {
  pub status: String,
  pub ordered_at: DateTime<Utc>,
  pub expected_date: Option<NaiveDate>,
  pub delivered_at: Option<DateTime<Utc>>,
}

/// Vendor with its product count and non-cancelled orders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorRow {
  pub id: i64,
  pub name: String,
  pub product_count: i64,
  pub orders: Vec<OrderTiming>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementRow {
  pub product_name: String,
  pub movement_type: String,
  pub quantity: i64,
  pub unit_price: f64,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRow {
  pub order_number: String,
  pub vendor_name: String,
  pub status: String,
  pub total_amount: f64,
  pub ordered_at: DateTime<Utc>,
  pub expected_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightRow {
  pub kind: String,
  pub title: String,
  pub summary: String,
  pub priority: String,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRow {
  pub user_id: String,
  pub action: String,
  pub entity_type: String,
  pub details: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
  pub product_id: i64,
  pub product_name: String,
  pub current_quantity: i64,
  pub forecast_date: NaiveDate,
  /// Units expected to be consumed between now and `forecast_date`
  pub predicted_demand: f64,
  pub confidence: f64,
}

/// Local health signals read from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemHealth {
  pub product_count: i64,
  pub pending_orders: i64,
  pub activity_last_24h: i64,
  pub last_activity_at: Option<DateTime<Utc>>,
}
