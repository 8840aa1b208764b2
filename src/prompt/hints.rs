//! Keyword-triggered focus hints.
//!
//! Each rule pairs a keyword list with a renderer. Rules are evaluated in
//! table order; a rule fires when any of its keywords occurs in the
//! lowercased query.

use std::fmt::Write as _;
use tracing::debug;

use crate::context::types::{ExternalContext, InventoryContext};

type Renderer = fn(&InventoryContext, &ExternalContext) -> String;

pub struct HintRule {
  pub name: &'static str,
  pub keywords: &'static [&'static str],
  pub render: Renderer,
}

impl HintRule {
  fn matches(&self, query: &str) -> bool {
    self.keywords.iter().any(|k| query.contains(k))
  }
}

pub static HINT_RULES: &[HintRule] = &[
  HintRule {
    name: "critical",
    keywords: &["critical", "urgent", "out of stock"],
    render: critical_stock,
  },
  HintRule {
    name: "reorder",
    keywords: &["reorder", "low stock", "restock"],
    render: reorder,
  },
  HintRule {
    name: "vendor",
    keywords: &["vendor", "supplier"],
    render: vendor_reliability,
  },
  HintRule {
    name: "expiry",
    keywords: &["expir"],
    render: expiry,
  },
  HintRule {
    name: "forecast",
    keywords: &["forecast", "predict", "demand"],
    render: forecast,
  },
  HintRule {
    name: "valuation",
    keywords: &["value", "worth", "cost"],
    render: valuation,
  },
  HintRule {
    name: "external",
    keywords: &["weather", "currency", "exchange"],
    render: external_conditions,
  },
];

/// Rules triggered by `query`, in table order.
pub fn matching_rules(query: &str) -> Vec<&'static HintRule> {
  let query = query.to_lowercase();
  HINT_RULES.iter().filter(|r| r.matches(&query)).collect()
}

/// Rendered hint blocks for `query`; empty when nothing matches.
pub fn render_hints(
  query: &str,
  inventory: &InventoryContext,
  external: &ExternalContext,
) -> Vec<String> {
  matching_rules(query)
    .into_iter()
    .map(|rule| {
      debug!(rule = rule.name, "hint rule matched");
      (rule.render)(inventory, external)
    })
    .collect()
}

fn critical_stock(inventory: &InventoryContext, _: &ExternalContext) -> String {
  let mut out = String::from("CRITICAL STOCK: the user is asking about urgent stock problems.\n");
  let mut any = false;
  for alert in inventory.critical_alerts() {
    any = true;
    let _ = writeln!(
      out,
      "- {} ({}): {} units left",
      alert.product_name, alert.sku, alert.quantity
    );
  }
  if !any {
    out.push_str("- No products are at or below the critical threshold.\n");
  }
  out
}

fn reorder(inventory: &InventoryContext, _: &ExternalContext) -> String {
  let mut out = String::from("REORDER: prioritise products with the least cover.\n");
  if inventory.stock_alerts.is_empty() {
    out.push_str("- No products are below the low-stock threshold.\n");
  }
  for alert in &inventory.stock_alerts {
    let cover = match alert.days_of_cover {
      Some(days) => format!("{:.1} days of cover", days),
      None => "no recent usage".to_string(),
    };
    let _ = writeln!(out, "- {}: {} units, {}", alert.product_name, alert.quantity, cover);
  }
  out
}

fn vendor_reliability(inventory: &InventoryContext, _: &ExternalContext) -> String {
  let mut out =
    String::from("VENDOR RELIABILITY: compare on-time delivery before recommending suppliers.\n");
  let mut vendors: Vec<_> = inventory.vendors.iter().collect();
  vendors.sort_by_key(|v| v.reliability);
  for vendor in vendors {
    let _ = writeln!(
      out,
      "- {}: {}% on time ({}/{} orders)",
      vendor.name, vendor.reliability, vendor.on_time_orders, vendor.total_orders
    );
  }
  out
}

fn expiry(inventory: &InventoryContext, _: &ExternalContext) -> String {
  let mut out = String::from("EXPIRY: suggest markdowns or transfers for stock expiring soon.\n");
  if inventory.expiring_soon.is_empty() {
    out.push_str("- Nothing expires within the window.\n");
  }
  for product in &inventory.expiring_soon {
    let _ = writeln!(
      out,
      "- {}: {} units expire {}",
      product.name,
      product.quantity,
      product.expiry_date.format("%Y-%m-%d")
    );
  }
  out
}

fn forecast(inventory: &InventoryContext, _: &ExternalContext) -> String {
  let mut out = String::from("FORECAST: base demand answers on the predictions below.\n");
  for prediction in &inventory.predictions.stockouts {
    let _ = writeln!(
      out,
      "- {} runs out around {} ({:.0}% confidence)",
      prediction.product_name,
      prediction.stockout_date.format("%Y-%m-%d"),
      prediction.confidence * 100.0
    );
  }
  for spike in &inventory.predictions.demand_spikes {
    let _ = writeln!(out, "- {} demand up {:.0}%", spike.category, spike.growth_percent);
  }
  if inventory.predictions.stockouts.is_empty() && inventory.predictions.demand_spikes.is_empty() {
    out.push_str("- No stockouts or demand spikes predicted.\n");
  }
  out
}

fn valuation(inventory: &InventoryContext, _: &ExternalContext) -> String {
  let overview = &inventory.overview;
  let mut out = String::from("VALUATION: answer with figures from the inventory value.\n");
  let _ = writeln!(out, "- Total inventory value: ${:.2}", overview.total_inventory_value);
  let _ = writeln!(out, "- Sales in the last 30 days: ${:.2}", overview.monthly_usage_value);
  if let Some(top) = inventory
    .categories
    .iter()
    .max_by(|a, b| a.total_value.total_cmp(&b.total_value))
  {
    let _ = writeln!(out, "- Highest-value category: {} (${:.2})", top.name, top.total_value);
  }
  out
}

fn external_conditions(_: &InventoryContext, external: &ExternalContext) -> String {
  let mut out =
    String::from("EXTERNAL CONDITIONS: relate weather and exchange rates to stock decisions.\n");
  match &external.weather {
    Some(w) => {
      let _ = writeln!(
        out,
        "- Weather in {}: {}, {:.1}°C",
        w.location, w.conditions, w.temperature_c
      );
    }
    None => out.push_str("- Weather data unavailable.\n"),
  }
  match &external.economic {
    Some(e) if !e.rates.is_empty() => {
      let rates: Vec<String> = e.rates.iter().map(|(c, r)| format!("{} {:.4}", c, r)).collect();
      let _ = writeln!(out, "- Rates per {}: {}", e.base_currency, rates.join(", "));
    }
    _ => out.push_str("- Exchange rates unavailable.\n"),
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn names(query: &str) -> Vec<&'static str> {
    matching_rules(query).iter().map(|r| r.name).collect()
  }

  #[test]
  fn test_critical_query() {
    assert_eq!(names("what is critical"), vec!["critical"]);
  }

  #[test]
  fn test_vendor_query() {
    assert_eq!(names("vendor reliability"), vec!["vendor"]);
  }

  #[test]
  fn test_unrelated_query_has_no_hints() {
    assert!(names("tell me a joke").is_empty());
  }

  #[test]
  fn test_match_is_case_insensitive_and_ordered() {
    assert_eq!(
      names("URGENT: what will the Weather do to demand?"),
      vec!["critical", "forecast", "external"]
    );
  }

  #[test]
  fn test_rule_names_are_unique() {
    let mut names: Vec<_> = HINT_RULES.iter().map(|r| r.name).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), HINT_RULES.len());
  }
}
