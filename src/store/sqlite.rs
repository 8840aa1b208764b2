//! SQLite implementation of the inventory store.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

use super::types::{
  ActivityRow, CategoryRow, ExpiringProductRow, ForecastRow, InsightRow, InventoryTotals,
  MovementRow, OrderRow, OrderTiming, StockAlertRow, SystemHealth, VendorRow,
};
use super::{InventoryStore, QueryParams};
use crate::db::seed::{self, SeedSummary};
use crate::db::{format_date, format_timestamp, parse_date, parse_timestamp, Database};
use crate::error::FetchError;

/// Kind of stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MovementKind {
  In,
  Out,
  Sale,
  Adjustment,
  Return,
}

impl MovementKind {
  pub fn as_str(self) -> &'static str {
    match self {
      MovementKind::In => "IN",
      MovementKind::Out => "OUT",
      MovementKind::Sale => "SALE",
      MovementKind::Adjustment => "ADJUSTMENT",
      MovementKind::Return => "RETURN",
    }
  }

  /// Signed change in on-hand quantity, `None` if it does not fit in an `i64`.
  fn delta(self, quantity: i64) -> Option<i64> {
    match self {
      MovementKind::In | MovementKind::Return | MovementKind::Adjustment => Some(quantity),
      MovementKind::Out | MovementKind::Sale => quantity.checked_neg(),
    }
  }
}

/// Outcome of a recorded movement.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementReceipt {
  pub product_name: String,
  pub previous_quantity: i64,
  pub new_quantity: i64,
}

/// Inventory store over a single SQLite connection.
///
/// Queries run on the blocking pool; the connection mutex serializes them.
#[derive(Clone)]
pub struct SqliteStore {
  conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
  pub fn new(db: Database) -> Self {
    Self {
      conn: Arc::new(Mutex::new(db.into_conn())),
    }
  }

  async fn run<T, F>(&self, query: F) -> Result<T, FetchError>
  where
    T: Send + 'static,
    F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
  {
    let conn = Arc::clone(&self.conn);
    tokio::task::spawn_blocking(move || {
      let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
      query(&conn).map_err(FetchError::from)
    })
    .await?
  }

  /// Record a stock movement for the product with `sku` and adjust its quantity.
  ///
  /// Also writes an activity log entry for `user_id`. Sales and outbound
  /// movements may not take the quantity below zero.
  pub async fn record_movement(
    &self,
    sku: &str,
    kind: MovementKind,
    quantity: i64,
    unit_price: Option<f64>,
    user_id: &str,
    at: DateTime<Utc>,
  ) -> Result<MovementReceipt, FetchError> {
    if quantity == 0 || (quantity < 0 && kind != MovementKind::Adjustment) {
      return Err(FetchError::Rejected(format!(
        "{} quantity must be positive",
        kind.as_str()
      )));
    }

    let conn = Arc::clone(&self.conn);
    let sku = sku.to_string();
    let user_id = user_id.to_string();

    tokio::task::spawn_blocking(move || {
      let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
      let tx = conn.unchecked_transaction()?;

      let product: Option<(i64, String, f64, i64)> = tx
        .query_row(
          "SELECT id, name, price, quantity FROM products WHERE sku = ?",
          params![sku],
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;
      let (product_id, name, price, previous_quantity) =
        product.ok_or_else(|| FetchError::NotFound(format!("product {}", sku)))?;

      let new_quantity = kind
        .delta(quantity)
        .and_then(|delta| previous_quantity.checked_add(delta))
        .ok_or_else(|| {
          FetchError::Rejected(format!(
            "{} of {} would overflow the quantity of {} (on hand: {})",
            kind.as_str(),
            quantity,
            name,
            previous_quantity
          ))
        })?;
      if new_quantity < 0 {
        return Err(FetchError::Rejected(format!(
          "{} would take {} below zero (on hand: {})",
          kind.as_str(),
          name,
          previous_quantity
        )));
      }

      let stamp = format_timestamp(at);
      tx.execute(
        "INSERT INTO inventory_movements
           (product_id, movement_type, quantity, unit_price, created_at)
         VALUES (?, ?, ?, ?, ?)",
        params![
          product_id,
          kind.as_str(),
          quantity,
          unit_price.unwrap_or(price),
          stamp
        ],
      )?;
      tx.execute(
        "UPDATE products SET quantity = ?, updated_at = ? WHERE id = ?",
        params![new_quantity, stamp, product_id],
      )?;
      tx.execute(
        "INSERT INTO activity_logs (user_id, action, entity_type, details, created_at)
         VALUES (?, 'CREATE', 'movement', ?, ?)",
        params![
          user_id,
          format!("Recorded {} of {} {}", kind.as_str(), quantity, name),
          stamp
        ],
      )?;
      tx.commit()?;

      info!(sku = %sku, kind = kind.as_str(), quantity, new_quantity, "recorded movement");
      Ok(MovementReceipt {
        product_name: name,
        previous_quantity,
        new_quantity,
      })
    })
    .await?
  }

  /// Load the demo data set; see [`seed_demo_data`](crate::db::seed::seed_demo_data).
  pub async fn seed_demo_data(&self, now: DateTime<Utc>) -> color_eyre::Result<SeedSummary> {
    let conn = Arc::clone(&self.conn);
    tokio::task::spawn_blocking(move || {
      let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
      seed::seed_demo_data(&conn, now)
    })
    .await
    .map_err(|e| color_eyre::eyre::eyre!("Seeding task failed: {}", e))?
  }
}

fn conversion_error(idx: usize, what: &str, text: &str) -> rusqlite::Error {
  rusqlite::Error::FromSqlConversionFailure(
    idx,
    Type::Text,
    format!("invalid {} '{}'", what, text).into(),
  )
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
  let text: String = row.get(idx)?;
  parse_timestamp(&text).ok_or_else(|| conversion_error(idx, "timestamp", &text))
}

fn optional_timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
  let text: Option<String> = row.get(idx)?;
  text
    .map(|t| parse_timestamp(&t).ok_or_else(|| conversion_error(idx, "timestamp", &t)))
    .transpose()
}

fn optional_date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
  let text: Option<String> = row.get(idx)?;
  text
    .map(|t| parse_date(&t).ok_or_else(|| conversion_error(idx, "date", &t)))
    .transpose()
}

fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
  let text: String = row.get(idx)?;
  parse_date(&text).ok_or_else(|| conversion_error(idx, "date", &text))
}

fn limit(n: usize) -> i64 {
  i64::try_from(n).unwrap_or(i64::MAX)
}

fn activity_row(row: &Row<'_>) -> rusqlite::Result<ActivityRow> {
  Ok(ActivityRow {
    user_id: row.get(0)?,
    action: row.get(1)?,
    entity_type: row.get(2)?,
    details: row.get(3)?,
    created_at: timestamp_at(row, 4)?,
  })
}

impl InventoryStore for SqliteStore {
  async fn totals(&self, params: &QueryParams) -> Result<InventoryTotals, FetchError> {
    let low = params.low_stock_threshold;
    let critical = params.critical_stock_threshold;
    let since = format_timestamp(params.days_ago(30));

    self
      .run(move |conn| {
        conn.query_row(
          "SELECT
             (SELECT COUNT(*) FROM products),
             (SELECT COALESCE(SUM(quantity), 0) FROM products),
             (SELECT COUNT(*) FROM products WHERE quantity <= ?1),
             (SELECT COUNT(*) FROM products WHERE quantity <= ?2),
             (SELECT COUNT(*) FROM products WHERE quantity <= 0),
             (SELECT COUNT(*) FROM categories),
             (SELECT COUNT(*) FROM vendors),
             (SELECT COUNT(*) FROM inventory_movements WHERE created_at >= ?3),
             (SELECT COALESCE(SUM(quantity * unit_price), 0.0) FROM inventory_movements
               WHERE movement_type = 'SALE' AND created_at >= ?3)",
          params![low, critical, since],
          |row| {
            Ok(InventoryTotals {
              total_products: row.get(0)?,
              total_quantity: row.get(1)?,
              low_stock_count: row.get(2)?,
              critical_stock_count: row.get(3)?,
              out_of_stock_count: row.get(4)?,
              category_count: row.get(5)?,
              vendor_count: row.get(6)?,
              movements_last_30_days: row.get(7)?,
              monthly_usage_value: row.get(8)?,
            })
          },
        )
      })
      .await
  }

  async fn stock_alerts(&self, params: &QueryParams) -> Result<Vec<StockAlertRow>, FetchError> {
    let low = params.low_stock_threshold;
    let since = format_timestamp(params.days_ago(30));

    self
      .run(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT p.id, p.name, p.sku, p.quantity, p.price, c.name, v.name,
             (SELECT COALESCE(SUM(m.quantity), 0) FROM inventory_movements m
               WHERE m.product_id = p.id
                 AND m.movement_type IN ('SALE', 'OUT')
                 AND m.created_at >= ?2)
           FROM products p
           LEFT JOIN categories c ON c.id = p.category_id
           LEFT JOIN vendors v ON v.id = p.vendor_id
           WHERE p.quantity <= ?1
           ORDER BY p.quantity ASC, p.name ASC",
        )?;
        let rows = stmt.query_map(params![low, since], |row| {
          Ok(StockAlertRow {
            product_id: row.get(0)?,
            name: row.get(1)?,
            sku: row.get(2)?,
            quantity: row.get(3)?,
            price: row.get(4)?,
            category: row.get(5)?,
            vendor: row.get(6)?,
            usage_last_30_days: row.get(7)?,
          })
        })?;
        rows.collect()
      })
      .await
  }

  async fn expiring_products(
    &self,
    params: &QueryParams,
  ) -> Result<Vec<ExpiringProductRow>, FetchError> {
    let today = params.today();
    let from = format_date(today);
    let until = format_date(today + Duration::days(params.expiry_window_days));

    self
      .run(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, name, sku, quantity, expiry_date FROM products
           WHERE expiry_date IS NOT NULL AND expiry_date >= ?1 AND expiry_date <= ?2
           ORDER BY expiry_date ASC, name ASC",
        )?;
        let rows = stmt.query_map(params![from, until], |row| {
          Ok(ExpiringProductRow {
            product_id: row.get(0)?,
            name: row.get(1)?,
            sku: row.get(2)?,
            quantity: row.get(3)?,
            expiry_date: date_at(row, 4)?,
          })
        })?;
        rows.collect()
      })
      .await
  }

  async fn categories(&self, params: &QueryParams) -> Result<Vec<CategoryRow>, FetchError> {
    let low = params.low_stock_threshold;
    let since = format_timestamp(params.days_ago(30));
    let prev_since = format_timestamp(params.days_ago(60));

    self
      .run(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT c.id, c.name,
             COUNT(p.id),
             COALESCE(SUM(p.quantity), 0),
             COALESCE(SUM(p.price * p.quantity), 0.0),
             COALESCE(SUM(p.price), 0.0),
             COALESCE(SUM(CASE WHEN p.quantity <= ?1 THEN 1 ELSE 0 END), 0),
             (SELECT COUNT(*) FROM inventory_movements m
               JOIN products mp ON mp.id = m.product_id
               WHERE mp.category_id = c.id AND m.created_at >= ?2),
             (SELECT COUNT(*) FROM inventory_movements m
               JOIN products mp ON mp.id = m.product_id
               WHERE mp.category_id = c.id AND m.created_at >= ?3 AND m.created_at < ?2)
           FROM categories c
           LEFT JOIN products p ON p.category_id = c.id
           GROUP BY c.id, c.name
           ORDER BY c.name ASC",
        )?;
        let rows = stmt.query_map(params![low, since, prev_since], |row| {
          Ok(CategoryRow {
            id: row.get(0)?,
            name: row.get(1)?,
            product_count: row.get(2)?,
            total_quantity: row.get(3)?,
            total_value: row.get(4)?,
            price_sum: row.get(5)?,
            low_stock_count: row.get(6)?,
            movements_last_30_days: row.get(7)?,
            movements_prev_30_days: row.get(8)?,
          })
        })?;
        rows.collect()
      })
      .await
  }

  async fn vendors(&self, _params: &QueryParams) -> Result<Vec<VendorRow>, FetchError> {
    self
      .run(|conn| {
        let mut orders: HashMap<i64, Vec<OrderTiming>> = HashMap::new();
        let mut stmt = conn.prepare(
          "SELECT vendor_id, status, ordered_at, expected_date, delivered_at
           FROM purchase_orders
           WHERE status != 'CANCELLED'
           ORDER BY ordered_at ASC",
        )?;
        let timings = stmt.query_map([], |row| {
          Ok((
            row.get::<_, i64>(0)?,
            OrderTiming {
              status: row.get(1)?,
              ordered_at: timestamp_at(row, 2)?,
              expected_date: optional_date_at(row, 3)?,
              delivered_at: optional_timestamp_at(row, 4)?,
            },
          ))
        })?;
        for timing in timings {
          let (vendor_id, timing) = timing?;
          orders.entry(vendor_id).or_default().push(timing);
        }

        let mut stmt = conn.prepare(
          "SELECT v.id, v.name, COUNT(p.id)
           FROM vendors v
           LEFT JOIN products p ON p.vendor_id = v.id
           GROUP BY v.id, v.name
           ORDER BY v.name ASC",
        )?;
        let rows = stmt.query_map([], |row| {
          let id: i64 = row.get(0)?;
          Ok(VendorRow {
            id,
            name: row.get(1)?,
            product_count: row.get(2)?,
            orders: orders.remove(&id).unwrap_or_default(),
          })
        })?;
        rows.collect()
      })
      .await
  }

  async fn recent_movements(&self, params: &QueryParams) -> Result<Vec<MovementRow>, FetchError> {
    let limit = limit(params.recent_limit);

    self
      .run(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT p.name, m.movement_type, m.quantity, m.unit_price, m.created_at
           FROM inventory_movements m
           JOIN products p ON p.id = m.product_id
           ORDER BY m.created_at DESC, m.id DESC
           LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
          Ok(MovementRow {
            product_name: row.get(0)?,
            movement_type: row.get(1)?,
            quantity: row.get(2)?,
            unit_price: row.get(3)?,
            created_at: timestamp_at(row, 4)?,
          })
        })?;
        rows.collect()
      })
      .await
  }

  async fn recent_orders(&self, params: &QueryParams) -> Result<Vec<OrderRow>, FetchError> {
    let limit = limit(params.recent_limit);

    self
      .run(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT o.order_number, v.name, o.status, o.total_amount, o.ordered_at, o.expected_date
           FROM purchase_orders o
           JOIN vendors v ON v.id = o.vendor_id
           ORDER BY o.ordered_at DESC
           LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
          Ok(OrderRow {
            order_number: row.get(0)?,
            vendor_name: row.get(1)?,
            status: row.get(2)?,
            total_amount: row.get(3)?,
            ordered_at: timestamp_at(row, 4)?,
            expected_date: optional_date_at(row, 5)?,
          })
        })?;
        rows.collect()
      })
      .await
  }

  async fn recent_insights(&self, params: &QueryParams) -> Result<Vec<InsightRow>, FetchError> {
    let limit = limit(params.recent_limit);

    self
      .run(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT kind, title, summary, priority, created_at
           FROM ai_insights
           ORDER BY created_at DESC
           LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
          Ok(InsightRow {
            kind: row.get(0)?,
            title: row.get(1)?,
            summary: row.get(2)?,
            priority: row.get(3)?,
            created_at: timestamp_at(row, 4)?,
          })
        })?;
        rows.collect()
      })
      .await
  }

  async fn recent_activity(&self, params: &QueryParams) -> Result<Vec<ActivityRow>, FetchError> {
    let limit = limit(params.recent_limit);

    self
      .run(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT user_id, action, entity_type, details, created_at
           FROM activity_logs
           ORDER BY created_at DESC, id DESC
           LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], activity_row)?;
        rows.collect()
      })
      .await
  }

  async fn upcoming_forecasts(&self, params: &QueryParams) -> Result<Vec<ForecastRow>, FetchError> {
    let today = format_date(params.today());
    let limit = limit(params.recent_limit.saturating_mul(5));

    self
      .run(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT f.product_id, p.name, p.quantity,
             f.forecast_date, f.predicted_demand, f.confidence
           FROM product_forecasts f
           JOIN products p ON p.id = f.product_id
           WHERE f.forecast_date >= ?1
           ORDER BY f.forecast_date ASC, p.name ASC
           LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![today, limit], |row| {
          Ok(ForecastRow {
            product_id: row.get(0)?,
            product_name: row.get(1)?,
            current_quantity: row.get(2)?,
            forecast_date: date_at(row, 3)?,
            predicted_demand: row.get(4)?,
            confidence: row.get(5)?,
          })
        })?;
        rows.collect()
      })
      .await
  }

  async fn system_health(&self, now: DateTime<Utc>) -> Result<SystemHealth, FetchError> {
    let since = format_timestamp(now - Duration::hours(24));

    self
      .run(move |conn| {
        conn.query_row(
          "SELECT
             (SELECT COUNT(*) FROM products),
             (SELECT COUNT(*) FROM purchase_orders
               WHERE status IN ('PENDING', 'APPROVED', 'ORDERED')),
             (SELECT COUNT(*) FROM activity_logs WHERE created_at >= ?1),
             (SELECT MAX(created_at) FROM activity_logs)",
          params![since],
          |row| {
            Ok(SystemHealth {
              product_count: row.get(0)?,
              pending_orders: row.get(1)?,
              activity_last_24h: row.get(2)?,
              last_activity_at: optional_timestamp_at(row, 3)?,
            })
          },
        )
      })
      .await
  }

  async fn user_activity(
    &self,
    user_id: &str,
    params: &QueryParams,
  ) -> Result<Vec<ActivityRow>, FetchError> {
    let user_id = user_id.to_string();
    let limit = limit(params.recent_limit);

    self
      .run(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT user_id, action, entity_type, details, created_at
           FROM activity_logs
           WHERE user_id = ?1
           ORDER BY created_at DESC, id DESC
           LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit], activity_row)?;
        rows.collect()
      })
      .await
  }
}
