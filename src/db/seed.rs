//! Demo data set for trying the pipeline against a fresh database.

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use tracing::info;

use super::{format_date, format_timestamp};

/// Row counts written by [`seed_demo_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
  pub categories: usize,
  pub vendors: usize,
  pub products: usize,
  pub movements: usize,
  pub orders: usize,
  pub activity: usize,
  pub insights: usize,
  pub forecasts: usize,
}

const CATEGORIES: &[(i64, &str, &str)] = &[
  (1, "Beverages", "Drinks, juices and coffee"),
  (2, "Snacks", "Packaged snacks"),
  (3, "Dairy", "Milk, yogurt and cheese"),
  (4, "Cleaning", "Household cleaning supplies"),
  (5, "Produce", "Fresh fruit and vegetables"),
  (6, "Bakery", "Bread and pastries"),
];

const VENDORS: &[(i64, &str, &str)] = &[
  (1, "FreshFarm Co", "orders@freshfarm.example"),
  (2, "Sunrise Beverages", "sales@sunrise.example"),
  (3, "CrunchTime Foods", "supply@crunchtime.example"),
  (4, "BrightHome Supply", "hello@brighthome.example"),
];

// id, name, sku, category, vendor, price, quantity, expires in (days)
const PRODUCTS: &[(i64, &str, &str, i64, i64, f64, i64, Option<i64>)] = &[
  (1, "Sparkling Water 12pk", "BEV-001", 1, 2, 6.50, 48, None),
  (2, "Cold Brew Coffee", "BEV-002", 1, 2, 4.25, 8, Some(120)),
  (3, "Orange Juice 1L", "BEV-003", 1, 1, 3.80, 2, Some(6)),
  (4, "Sea Salt Chips", "SNK-001", 2, 3, 2.99, 35, Some(90)),
  (5, "Trail Mix", "SNK-002", 2, 3, 5.49, 0, Some(150)),
  (6, "Granola Bars", "SNK-003", 2, 3, 3.99, 22, Some(200)),
  (7, "Whole Milk 1gal", "DAI-001", 3, 1, 3.49, 12, Some(5)),
  (8, "Greek Yogurt", "DAI-002", 3, 1, 1.29, 6, Some(12)),
  (9, "Cheddar Block", "DAI-003", 3, 1, 5.99, 30, Some(45)),
  (10, "Salted Butter", "DAI-004", 3, 1, 4.29, 25, Some(60)),
  (11, "All-Purpose Cleaner", "CLN-001", 4, 4, 4.79, 40, None),
  (12, "Dish Soap", "CLN-002", 4, 4, 2.59, 55, None),
  (13, "Paper Towels 6pk", "CLN-003", 4, 4, 8.99, 9, None),
  (14, "Sponges 3pk", "CLN-004", 4, 4, 1.99, 60, None),
  (15, "Bananas (lb)", "PRD-001", 5, 1, 0.59, 120, Some(4)),
  (16, "Avocados", "PRD-002", 5, 1, 1.49, 3, Some(3)),
  (17, "Sourdough Loaf", "BAK-001", 6, 3, 4.99, 18, Some(40)),
  (18, "Butter Croissants", "BAK-002", 6, 3, 3.49, 24, Some(35)),
];

// product, type, quantity, unit price, days ago
const MOVEMENTS: &[(i64, &str, i64, f64, i64)] = &[
  (1, "SALE", 12, 6.50, 2),
  (2, "SALE", 10, 4.25, 3),
  (3, "SALE", 6, 3.80, 1),
  (1, "SALE", 8, 6.50, 9),
  (2, "SALE", 5, 4.25, 12),
  (3, "SALE", 4, 3.80, 15),
  (1, "IN", 24, 5.00, 20),
  (4, "SALE", 5, 2.99, 4),
  (5, "SALE", 10, 5.49, 6),
  (7, "SALE", 6, 3.49, 1),
  (8, "SALE", 8, 1.29, 2),
  (9, "IN", 20, 4.50, 10),
  (13, "SALE", 3, 8.99, 5),
  (15, "SALE", 30, 0.59, 1),
  (16, "SALE", 7, 1.49, 3),
  (17, "SALE", 6, 4.99, 2),
  (1, "SALE", 6, 6.50, 40),
  (2, "SALE", 4, 4.25, 45),
  (4, "SALE", 6, 2.99, 35),
  (5, "SALE", 6, 5.49, 38),
  (6, "SALE", 4, 3.99, 50),
  (7, "SALE", 5, 3.49, 33),
  (8, "SALE", 6, 1.29, 40),
  (9, "SALE", 3, 5.99, 42),
  (11, "SALE", 4, 4.79, 36),
  (12, "SALE", 6, 2.59, 44),
  (15, "SALE", 25, 0.59, 31),
];

// number, vendor, status, total, ordered (days ago), expected (days ago), delivered (days ago)
const ORDERS: &[(&str, i64, &str, f64, i64, i64, Option<i64>)] = &[
  ("PO-1001", 1, "DELIVERED", 420.00, 40, 33, Some(34)),
  ("PO-1002", 1, "DELIVERED", 310.00, 25, 18, Some(19)),
  ("PO-1003", 2, "DELIVERED", 560.00, 30, 25, Some(25)),
  ("PO-1004", 2, "ORDERED", 275.00, 3, -4, None),
  ("PO-1005", 3, "DELIVERED", 190.00, 20, 14, Some(15)),
  ("PO-1006", 3, "PENDING", 240.00, 1, -7, None),
  ("PO-1007", 3, "DELIVERED", 205.00, 50, 44, Some(41)),
];

// user, action, entity type, details, hours ago
const ACTIVITY: &[(&str, &str, &str, &str, i64)] = &[
  ("alice", "UPDATE", "product", "Adjusted Trail Mix quantity to 0", 2),
  ("alice", "CREATE", "movement", "Recorded sale of 30 Bananas (lb)", 5),
  ("carol", "APPROVE", "purchase_order", "Approved PO-1004", 20),
  ("bob", "CREATE", "purchase_order", "Created PO-1006 for CrunchTime Foods", 30),
  ("alice", "UPDATE", "vendor", "Updated BrightHome Supply contact", 50),
  ("carol", "LOGIN", "session", "Signed in", 72),
];

// kind, title, summary, priority, days ago
const INSIGHTS: &[(&str, &str, &str, &str, i64)] = &[
  (
    "STOCK_ALERT",
    "Produce shrinkage rising",
    "Avocado and banana write-offs doubled over the last two weeks.",
    "HIGH",
    1,
  ),
  (
    "TREND",
    "Beverage demand up",
    "Beverage sales are running well ahead of last month.",
    "MEDIUM",
    3,
  ),
  (
    "COST",
    "Dairy vendor consolidation",
    "Most dairy volume already flows through FreshFarm Co.",
    "LOW",
    8,
  ),
];

// product, forecast date (days ahead), predicted demand, confidence
const FORECASTS: &[(i64, i64, f64, f64)] = &[
  (3, 7, 12.0, 0.85),
  (16, 5, 9.0, 0.90),
  (2, 14, 20.0, 0.75),
  (1, 14, 30.0, 0.65),
  (11, 30, 15.0, 0.80),
  (5, -3, 10.0, 0.90),
];

/// Load the demo data set, with all times relative to `now`.
///
/// Refuses to run against a database that already has products.
pub fn seed_demo_data(conn: &Connection, now: DateTime<Utc>) -> Result<SeedSummary> {
  let existing: i64 = conn
    .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
    .map_err(|e| eyre!("Failed to inspect products table: {}", e))?;
  if existing > 0 {
    return Err(eyre!(
      "Database already contains {} products; refusing to seed",
      existing
    ));
  }

  let created = format_timestamp(now - Duration::days(90));
  let today = now.date_naive();

  let tx = conn
    .unchecked_transaction()
    .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

  for (id, name, description) in CATEGORIES {
    tx.execute(
      "INSERT INTO categories (id, name, description, created_at) VALUES (?, ?, ?, ?)",
      params![id, name, description, created],
    )?;
  }

  for (id, name, email) in VENDORS {
    tx.execute(
      "INSERT INTO vendors (id, name, contact_email, created_at) VALUES (?, ?, ?, ?)",
      params![id, name, email, created],
    )?;
  }

  for (id, name, sku, category, vendor, price, quantity, expires_in) in PRODUCTS {
    let expiry = expires_in.map(|days| format_date(today + Duration::days(days)));
    tx.execute(
      "INSERT INTO products
         (id, name, sku, category_id, vendor_id, price, quantity, expiry_date,
          created_at, updated_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
      params![id, name, sku, category, vendor, price, quantity, expiry, created, created],
    )?;
  }

  for (product, kind, quantity, unit_price, days_ago) in MOVEMENTS {
    tx.execute(
      "INSERT INTO inventory_movements (product_id, movement_type, quantity, unit_price, created_at)
       VALUES (?, ?, ?, ?, ?)",
      params![
        product,
        kind,
        quantity,
        unit_price,
        format_timestamp(now - Duration::days(*days_ago))
      ],
    )?;
  }

  for (number, vendor, status, total, ordered, expected, delivered) in ORDERS {
    tx.execute(
      "INSERT INTO purchase_orders
         (order_number, vendor_id, status, total_amount, ordered_at, expected_date, delivered_at)
       VALUES (?, ?, ?, ?, ?, ?, ?)",
      params![
        number,
        vendor,
        status,
        total,
        format_timestamp(now - Duration::days(*ordered)),
        format_date(today - Duration::days(*expected)),
        delivered.map(|days| format_timestamp(now - Duration::days(days))),
      ],
    )?;
  }

  for (user, action, entity_type, details, hours_ago) in ACTIVITY {
    tx.execute(
      "INSERT INTO activity_logs (user_id, action, entity_type, details, created_at)
       VALUES (?, ?, ?, ?, ?)",
      params![
        user,
        action,
        entity_type,
        details,
        format_timestamp(now - Duration::hours(*hours_ago))
      ],
    )?;
  }

  for (kind, title, summary, priority, days_ago) in INSIGHTS {
    tx.execute(
      "INSERT INTO ai_insights (kind, title, summary, priority, created_at) VALUES (?, ?, ?, ?, ?)",
      params![
        kind,
        title,
        summary,
        priority,
        format_timestamp(now - Duration::days(*days_ago))
      ],
    )?;
  }

  for (product, days_ahead, demand, confidence) in FORECASTS {
    tx.execute(
      "INSERT INTO product_forecasts
         (product_id, forecast_date, predicted_demand, confidence, created_at)
       VALUES (?, ?, ?, ?, ?)",
      params![
        product,
        format_date(today + Duration::days(*days_ahead)),
        demand,
        confidence,
        format_timestamp(now)
      ],
    )?;
  }

  tx.commit()
    .map_err(|e| eyre!("Failed to commit seed data: {}", e))?;

  let summary = SeedSummary {
    categories: CATEGORIES.len(),
    vendors: VENDORS.len(),
    products: PRODUCTS.len(),
    movements: MOVEMENTS.len(),
    orders: ORDERS.len(),
    activity: ACTIVITY.len(),
    insights: INSIGHTS.len(),
    forecasts: FORECASTS.len(),
  };
  info!(?summary, "seeded demo data");

  Ok(summary)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::Database;
  use chrono::TimeZone;

  #[test]
  fn test_seed_writes_all_tables() {
    let db = Database::open_in_memory().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let summary = seed_demo_data(db.conn(), now).unwrap();

    let count = |table: &str| -> usize {
      db.conn()
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
          row.get::<_, i64>(0)
        })
        .unwrap() as usize
    };
    assert_eq!(count("products"), summary.products);
    assert_eq!(count("inventory_movements"), summary.movements);
    assert_eq!(count("purchase_orders"), summary.orders);
    assert_eq!(count("product_forecasts"), summary.forecasts);
  }

  #[test]
  fn test_seed_refuses_populated_database() {
    let db = Database::open_in_memory().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    seed_demo_data(db.conn(), now).unwrap();
    assert!(seed_demo_data(db.conn(), now).is_err());
  }
}
