//! Section renderers for the assembled prompt.
//!
//! Every renderer appends to the output buffer. A section whose data failed
//! to load renders [`UNAVAILABLE`] instead of looking empty.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;

use super::role::Role;
use crate::context::types::{ExternalContext, InventoryContext, Section, UserContext};

pub const UNAVAILABLE: &str = "Data unavailable.";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M UTC";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn heading(out: &mut String, title: &str) {
  let _ = write!(out, "\n=== {} ===\n", title);
}

fn unavailable(out: &mut String) {
  out.push_str(UNAVAILABLE);
  out.push('\n');
}

fn time(at: &DateTime<Utc>) -> String {
  at.format(TIME_FORMAT).to_string()
}

/// `now` is the time of the request; `data_as_of` when the inventory
/// snapshot was built, which lags behind it on a cache hit.
pub fn preamble(out: &mut String, role: Role, now: &DateTime<Utc>, data_as_of: &DateTime<Utc>) {
  out.push_str(
    "You are StockSight, an inventory assistant for a retail business. \
     Answer using only the data below and say so when data is missing.\n",
  );
  let _ = writeln!(out, "Current time: {}", time(now));
  let _ = writeln!(out, "Inventory data as of: {}", time(data_as_of));
  let _ = writeln!(out, "Speaking with: {}", role.title());
}

pub fn focus(out: &mut String, hints: &[String]) {
  if hints.is_empty() {
    return;
  }
  heading(out, "FOCUS");
  for hint in hints {
    out.push_str(hint);
  }
}

pub fn overview(out: &mut String, inventory: &InventoryContext) {
  heading(out, "INVENTORY OVERVIEW");
  if !inventory.is_available(Section::Totals) {
    return unavailable(out);
  }
  let o = &inventory.overview;
  let _ = writeln!(out, "Health score: {}/100", o.health_score);
  let _ = writeln!(out, "Products: {} ({} units on hand)", o.total_products, o.total_quantity);
  let _ = writeln!(
    out,
    "Low stock: {} | Critical: {} | Out of stock: {}",
    o.low_stock_count, o.critical_stock_count, o.out_of_stock_count
  );
  let _ = writeln!(out, "Categories: {} | Vendors: {}", o.category_count, o.vendor_count);
  let _ = writeln!(out, "Movements in the last 30 days: {}", o.movements_last_30_days);
  if inventory.is_available(Section::Categories) {
    let _ = writeln!(out, "Estimated inventory value: ${:.2}", o.total_inventory_value);
  }
  let _ = writeln!(out, "Sales value in the last 30 days: ${:.2}", o.monthly_usage_value);
}

pub fn stock_alerts(out: &mut String, inventory: &InventoryContext) {
  heading(out, "STOCK ALERTS");
  if !inventory.is_available(Section::StockAlerts) {
    return unavailable(out);
  }
  if inventory.stock_alerts.is_empty() {
    out.push_str("All products are above the low-stock threshold.\n");
    return;
  }
  for alert in &inventory.stock_alerts {
    let level = if alert.critical { "CRITICAL" } else { "LOW" };
    let cover = alert
      .days_of_cover
      .map(|d| format!(", ~{:.1} days of cover", d))
      .unwrap_or_default();
    let _ = writeln!(
      out,
      "[{}] {} ({}): {} units, {} used in 30 days{}; vendor: {}",
      level,
      alert.product_name,
      alert.sku,
      alert.quantity,
      alert.usage_last_30_days,
      cover,
      alert.vendor.as_deref().unwrap_or("none")
    );
  }
}

pub fn expiring(out: &mut String, inventory: &InventoryContext) {
  heading(out, "EXPIRING SOON");
  if !inventory.is_available(Section::Expiring) {
    return unavailable(out);
  }
  if inventory.expiring_soon.is_empty() {
    out.push_str("No products expire within the window.\n");
  }
  for product in &inventory.expiring_soon {
    let _ = writeln!(
      out,
      "{} ({}): {} units, expires {}",
      product.name,
      product.sku,
      product.quantity,
      product.expiry_date.format(DATE_FORMAT)
    );
  }
}

pub fn categories(out: &mut String, inventory: &InventoryContext) {
  heading(out, "CATEGORY PERFORMANCE");
  if !inventory.is_available(Section::Categories) {
    return unavailable(out);
  }
  for category in &inventory.categories {
    let _ = writeln!(
      out,
      "{} [{}]: {} products, value ${:.2}, avg price ${:.2}, {} movements in 30 days, {} low",
      category.name,
      category.stock_health.as_str(),
      category.product_count,
      category.total_value,
      category.average_price,
      category.recent_activity,
      category.low_stock_count
    );
  }
}

pub fn vendors(out: &mut String, inventory: &InventoryContext) {
  heading(out, "VENDOR PERFORMANCE");
  if !inventory.is_available(Section::Vendors) {
    return unavailable(out);
  }
  for vendor in &inventory.vendors {
    let lead_time = vendor
      .average_lead_time_days
      .map(|d| format!("{:.1} days", d))
      .unwrap_or_else(|| "n/a".to_string());
    let _ = writeln!(
      out,
      "{}: {} products, {}% reliability ({}/{} on time), avg lead time {}",
      vendor.name,
      vendor.product_count,
      vendor.reliability,
      vendor.on_time_orders,
      vendor.total_orders,
      lead_time
    );
  }
}

pub fn predictions(out: &mut String, inventory: &InventoryContext) {
  heading(out, "PREDICTIONS");
  let predictions = &inventory.predictions;

  if !inventory.is_available(Section::Forecasts) {
    out.push_str("Stockouts: ");
    unavailable(out);
  } else if predictions.stockouts.is_empty() {
    out.push_str("No stockouts predicted.\n");
  }
  for p in &predictions.stockouts {
    let _ = writeln!(
      out,
      "{}: stock out by {} ({} days, demand {:.0}, {:.0}% confidence). {}",
      p.product_name,
      p.stockout_date.format(DATE_FORMAT),
      p.days_until_stockout,
      p.predicted_demand,
      p.confidence * 100.0,
      p.recommended_action
    );
  }

  if !inventory.is_available(Section::Categories) {
    out.push_str("Demand spikes: ");
    unavailable(out);
  }
  for spike in &predictions.demand_spikes {
    let _ = writeln!(
      out,
      "Demand spike in {}: {} movements vs {} the month before (+{:.0}%)",
      spike.category, spike.recent_movements, spike.previous_movements, spike.growth_percent
    );
  }
}

pub fn recent(out: &mut String, inventory: &InventoryContext) {
  heading(out, "RECENT ACTIVITY");
  let recent = &inventory.recent;

  out.push_str("Movements:\n");
  if !inventory.is_available(Section::Movements) {
    unavailable(out);
  }
  for m in &recent.movements {
    let _ = writeln!(
      out,
      "- {} {} x{} @ ${:.2} ({})",
      m.movement_type,
      m.product_name,
      m.quantity,
      m.unit_price,
      time(&m.created_at)
    );
  }

  out.push_str("Purchase orders:\n");
  if !inventory.is_available(Section::Orders) {
    unavailable(out);
  }
  for o in &recent.orders {
    let expected = o
      .expected_date
      .map(|d| format!(", expected {}", d.format(DATE_FORMAT)))
      .unwrap_or_default();
    let _ = writeln!(
      out,
      "- {} from {}: {} ${:.2}{}",
      o.order_number, o.vendor_name, o.status, o.total_amount, expected
    );
  }

  out.push_str("Insights:\n");
  if !inventory.is_available(Section::Insights) {
    unavailable(out);
  }
  for i in &recent.insights {
    let _ = writeln!(out, "- [{}] {}: {}", i.priority, i.title, i.summary);
  }

  out.push_str("Activity log:\n");
  if !inventory.is_available(Section::Activity) {
    unavailable(out);
  }
  for a in &recent.activity {
    let _ = writeln!(
      out,
      "- {} {} {}: {}",
      a.user_id,
      a.action,
      a.entity_type,
      a.details.as_deref().unwrap_or("")
    );
  }
}

pub fn external(out: &mut String, external: &ExternalContext) {
  heading(out, "EXTERNAL CONDITIONS");

  match &external.weather {
    Some(w) => {
      let humidity = w.humidity.map(|h| format!(", {}% humidity", h)).unwrap_or_default();
      let _ = writeln!(
        out,
        "Weather in {}: {}, {:.1}°C{}",
        w.location, w.conditions, w.temperature_c, humidity
      );
    }
    None => {
      out.push_str("Weather: ");
      unavailable(out);
    }
  }

  match &external.economic {
    Some(e) => {
      let rates: Vec<String> = e.rates.iter().map(|(c, r)| format!("{}={:.4}", c, r)).collect();
      let _ = writeln!(out, "Exchange rates (base {}): {}", e.base_currency, rates.join(", "));
    }
    None => {
      out.push_str("Exchange rates: ");
      unavailable(out);
    }
  }

  match &external.system_health {
    Some(h) => {
      let last = h
        .last_activity_at
        .as_ref()
        .map(time)
        .unwrap_or_else(|| "never".to_string());
      let _ = writeln!(
        out,
        "System: database online, {} products, {} pending orders, \
         {} actions in 24h, last activity {}",
        h.product_count, h.pending_orders, h.activity_last_24h, last
      );
    }
    None => {
      out.push_str("System health: ");
      unavailable(out);
    }
  }
}

pub fn user(out: &mut String, user: &UserContext) {
  heading(out, "YOUR RECENT ACTIVITY");
  let _ = writeln!(out, "User: {}", user.user_id);
  if !user.available {
    return unavailable(out);
  }
  if user.recent_actions.is_empty() {
    out.push_str("No recorded activity.\n");
  }
  for a in &user.recent_actions {
    let _ = writeln!(
      out,
      "- {} {} {}: {}",
      time(&a.created_at),
      a.action,
      a.entity_type,
      a.details.as_deref().unwrap_or("")
    );
  }
}

/// Lists failed sources so the model can qualify its answer.
pub fn data_quality(out: &mut String, inventory: &InventoryContext, external: &ExternalContext) {
  if !inventory.degraded && external.unavailable.is_empty() {
    return;
  }
  heading(out, "DATA QUALITY");
  let missing: Vec<&str> = inventory
    .failed_sections
    .iter()
    .map(|s| s.as_str())
    .chain(external.unavailable.iter().map(|f| f.as_str()))
    .collect();
  let _ = writeln!(
    out,
    "Some data could not be loaded: {}. Mention this if it affects the answer.",
    missing.join(", ")
  );
}

pub fn role(out: &mut String, role: Role) {
  heading(out, "YOUR ROLE");
  out.push_str(role.capabilities());
  out.push('\n');
}

pub fn question(out: &mut String, query: &str) {
  heading(out, "QUESTION");
  out.push_str(query.trim());
  out.push('\n');
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::types::{ExternalField, Overview, Predictions, RecentActivity};
  use chrono::TimeZone;

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
  }

  fn empty_inventory(failed: Vec<Section>) -> InventoryContext {
    InventoryContext {
      generated_at: now(),
      overview: Overview::default(),
      stock_alerts: Vec::new(),
      expiring_soon: Vec::new(),
      categories: Vec::new(),
      vendors: Vec::new(),
      recent: RecentActivity::default(),
      predictions: Predictions::default(),
      degraded: !failed.is_empty(),
      failed_sections: failed,
    }
  }

  fn empty_external() -> ExternalContext {
    ExternalContext {
      generated_at: now(),
      weather: None,
      economic: None,
      system_health: None,
      unavailable: vec![
        ExternalField::Weather,
        ExternalField::Economic,
        ExternalField::SystemHealth,
      ],
    }
  }

  #[test]
  fn test_failed_section_renders_placeholder() {
    let mut out = String::new();
    overview(&mut out, &empty_inventory(vec![Section::Totals]));

    assert!(out.contains("=== INVENTORY OVERVIEW ==="));
    assert!(out.contains(UNAVAILABLE));
    assert!(!out.contains("Health score"));
  }

  #[test]
  fn test_missing_external_fields_render_placeholders() {
    let mut out = String::new();
    external(&mut out, &empty_external());

    assert_eq!(out.matches(UNAVAILABLE).count(), 3);
  }

  #[test]
  fn test_data_quality_lists_failures() {
    let mut out = String::new();
    data_quality(
      &mut out,
      &empty_inventory(vec![Section::Orders]),
      &empty_external(),
    );

    assert!(out.contains("recent orders, weather, economic, system health"));
  }

  #[test]
  fn test_data_quality_silent_when_complete() {
    let mut out = String::new();
    let external = ExternalContext {
      unavailable: Vec::new(),
      ..empty_external()
    };
    data_quality(&mut out, &empty_inventory(Vec::new()), &external);

    assert!(out.is_empty());
  }

  #[test]
  fn test_focus_skipped_without_hints() {
    let mut out = String::new();
    focus(&mut out, &[]);
    assert!(out.is_empty());
  }
}
