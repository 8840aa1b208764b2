//! Derived statistics over store rows.
//!
//! Everything here is heuristic reporting, not modeled forecasting.

use chrono::{Duration, NaiveDate};

use super::types::{
  CategoryPerformance, DemandSpike, StockAlert, StockHealth, StockoutPrediction, VendorPerformance,
};
use crate::store::types::{CategoryRow, ForecastRow, InventoryTotals, StockAlertRow, VendorRow};

/// Forecasts at or below this confidence are ignored.
pub const MIN_FORECAST_CONFIDENCE: f64 = 0.7;

/// Share of low-stock products at which a category becomes critical.
pub const CRITICAL_LOW_STOCK_RATIO: f64 = 0.3;

/// Month-over-month movement growth that counts as a demand spike.
pub const SPIKE_GROWTH_PERCENT: f64 = 50.0;

const CATEGORY_SCORE_PER_CATEGORY: f64 = 10.0;
const VENDOR_SCORE_PER_VENDOR: f64 = 20.0;
const ACTIVITY_SCORE_PER_MOVEMENT: f64 = 2.0;

/// Overall 0-100 health: the mean of four sub-scores, each clamped to 0-100.
///
/// - stock: share of products above the low-stock threshold
/// - categories: 10 points per category
/// - vendors: 20 points per vendor
/// - activity: 2 points per movement in the last 30 days
pub fn health_score(totals: &InventoryTotals) -> u8 {
  let stock = if totals.total_products > 0 {
    100.0 * (totals.total_products - totals.low_stock_count) as f64 / totals.total_products as f64
  } else {
    0.0
  };
  let categories = totals.category_count as f64 * CATEGORY_SCORE_PER_CATEGORY;
  let vendors = totals.vendor_count as f64 * VENDOR_SCORE_PER_VENDOR;
  let activity = totals.movements_last_30_days as f64 * ACTIVITY_SCORE_PER_MOVEMENT;

  let mean = [stock, categories, vendors, activity]
    .iter()
    .map(|score| score.clamp(0.0, 100.0))
    .sum::<f64>()
    / 4.0;

  mean.round().clamp(0.0, 100.0) as u8
}

pub fn stock_health(product_count: i64, low_stock_count: i64) -> StockHealth {
  if low_stock_count <= 0 || product_count <= 0 {
    return StockHealth::Healthy;
  }
  let ratio = low_stock_count as f64 / product_count as f64;
  if ratio >= CRITICAL_LOW_STOCK_RATIO {
    StockHealth::Critical
  } else {
    StockHealth::Attention
  }
}

/// Percentage of on-time orders; a vendor without orders is fully reliable.
pub fn vendor_reliability(total_orders: usize, on_time_orders: usize) -> u8 {
  if total_orders == 0 {
    return 100;
  }
  let percent = on_time_orders as f64 / total_orders as f64 * 100.0;
  percent.round().clamp(0.0, 100.0) as u8
}

pub fn category_performance(row: &CategoryRow) -> CategoryPerformance {
  let average_price = if row.product_count > 0 {
    row.price_sum / row.product_count as f64
  } else {
    0.0
  };

  CategoryPerformance {
    name: row.name.clone(),
    product_count: row.product_count,
    total_value: row.total_value,
    average_price,
    recent_activity: row.movements_last_30_days,
    low_stock_count: row.low_stock_count,
    stock_health: stock_health(row.product_count, row.low_stock_count),
  }
}

pub fn vendor_performance(row: &VendorRow) -> VendorPerformance {
  let on_time_orders = row
    .orders
    .iter()
    .filter(|order| match (order.delivered_at, order.expected_date) {
      (Some(delivered), Some(expected)) => delivered.date_naive() <= expected,
      (Some(_), None) => true,
      (None, _) => false,
    })
    .count();

  let lead_times: Vec<f64> = row
    .orders
    .iter()
    .filter_map(|order| {
      order
        .delivered_at
        .map(|delivered| (delivered - order.ordered_at).num_hours() as f64 / 24.0)
    })
    .collect();
  let average_lead_time_days = if lead_times.is_empty() {
    None
  } else {
    Some(lead_times.iter().sum::<f64>() / lead_times.len() as f64)
  };

  VendorPerformance {
    name: row.name.clone(),
    product_count: row.product_count,
    total_orders: row.orders.len(),
    on_time_orders,
    reliability: vendor_reliability(row.orders.len(), on_time_orders),
    average_lead_time_days,
  }
}

pub fn stock_alert(row: &StockAlertRow, critical_threshold: i64) -> StockAlert {
  let daily_usage = row.usage_last_30_days as f64 / 30.0;
  let days_of_cover = if daily_usage > 0.0 {
    Some(row.quantity.max(0) as f64 / daily_usage)
  } else {
    None
  };

  StockAlert {
    product_name: row.name.clone(),
    sku: row.sku.clone(),
    quantity: row.quantity,
    category: row.category.clone(),
    vendor: row.vendor.clone(),
    usage_last_30_days: row.usage_last_30_days,
    daily_usage,
    days_of_cover,
    critical: row.quantity <= critical_threshold,
  }
}

pub fn total_inventory_value(categories: &[CategoryRow]) -> f64 {
  categories.iter().map(|c| c.total_value).sum()
}

/// Stockout predictions for confident forecasts whose demand meets or
/// exceeds current stock, soonest first.
pub fn stockout_predictions(
  forecasts: &[ForecastRow],
  today: NaiveDate,
) -> Vec<StockoutPrediction> {
  let mut predictions: Vec<StockoutPrediction> = forecasts
    .iter()
    .filter(|f| f.confidence > MIN_FORECAST_CONFIDENCE)
    .filter_map(|f| stockout_prediction(f, today))
    .collect();

  predictions.sort_by(|a, b| {
    a.stockout_date
      .cmp(&b.stockout_date)
      .then_with(|| a.product_name.cmp(&b.product_name))
  });
  predictions
}

fn stockout_prediction(forecast: &ForecastRow, today: NaiveDate) -> Option<StockoutPrediction> {
  let current = forecast.current_quantity.max(0) as f64;
  if forecast.predicted_demand <= 0.0 || forecast.predicted_demand < current {
    return None;
  }

  let horizon_days = (forecast.forecast_date - today).num_days().max(1) as f64;
  let daily_demand = forecast.predicted_demand / horizon_days;
  let days_until_stockout = (current / daily_demand).floor() as i64;
  let stockout_date = today + Duration::days(days_until_stockout);
  let shortfall = (forecast.predicted_demand - current).ceil().max(1.0) as i64;

  Some(StockoutPrediction {
    product_name: forecast.product_name.clone(),
    current_quantity: forecast.current_quantity,
    predicted_demand: forecast.predicted_demand,
    confidence: forecast.confidence,
    stockout_date,
    days_until_stockout,
    recommended_action: recommended_action(current, days_until_stockout, shortfall, stockout_date),
  })
}

fn recommended_action(current: f64, days_left: i64, shortfall: i64, stockout: NaiveDate) -> String {
  if current <= 0.0 {
    format!("Out of stock: place an emergency order for {} units", shortfall)
  } else if days_left <= 3 {
    format!("Expedite a reorder of at least {} units", shortfall)
  } else if days_left <= 7 {
    format!("Reorder {} units this week", shortfall)
  } else {
    format!(
      "Schedule a reorder of {} units before {}",
      shortfall,
      stockout.format("%Y-%m-%d")
    )
  }
}

/// Categories whose movement count grew by at least [`SPIKE_GROWTH_PERCENT`]
/// over the previous 30 days, largest growth first.
pub fn demand_spikes(categories: &[CategoryRow]) -> Vec<DemandSpike> {
  let mut spikes: Vec<DemandSpike> = categories
    .iter()
    .filter(|c| c.movements_prev_30_days >= 1)
    .filter_map(|c| {
      let previous = c.movements_prev_30_days as f64;
      let growth_percent = (c.movements_last_30_days as f64 - previous) / previous * 100.0;
      (growth_percent >= SPIKE_GROWTH_PERCENT).then(|| DemandSpike {
        category: c.name.clone(),
        recent_movements: c.movements_last_30_days,
        previous_movements: c.movements_prev_30_days,
        growth_percent,
      })
    })
    .collect();

  spikes.sort_by(|a, b| b.growth_percent.total_cmp(&a.growth_percent));
  spikes
}
