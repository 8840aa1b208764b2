pub mod schema;
pub mod seed;

use chrono::{DateTime, NaiveDate, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::Connection;
use std::path::Path;

/// Text format of stored timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
/// Text format of stored calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Database connection wrapper for the inventory store
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create the database at `path`
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    Self::init(conn)
  }

  /// Open a private in-memory database
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::init(conn)
  }

  fn init(conn: Connection) -> Result<Self> {
    conn
      .pragma_update(None, "foreign_keys", "ON")
      .map_err(|e| eyre!("Failed to enable foreign keys: {}", e))?;

    let db = Self { conn };
    db.run_migrations()?;

    Ok(db)
  }

  /// Run database migrations
  fn run_migrations(&self) -> Result<()> {
    self
      .conn
      .execute_batch(schema::SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;
    Ok(())
  }

  /// Get a reference to the connection
  #[cfg(test)]
  pub fn conn(&self) -> &Connection {
    &self.conn
  }

  pub fn into_conn(self) -> Connection {
    self.conn
  }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
  at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_date(date: NaiveDate) -> String {
  date.format(DATE_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .ok()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_migrations_are_idempotent() {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().unwrap();
    let tables: i64 = db
      .conn()
      .query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
        [],
        |row| row.get(0),
      )
      .unwrap();
    assert_eq!(tables, 8);
  }

  #[test]
  fn test_timestamp_round_trip_sorts_as_text() {
    let earlier = Utc.with_ymd_and_hms(2024, 1, 9, 23, 0, 0).unwrap();
    let later = Utc.with_ymd_and_hms(2024, 1, 10, 1, 0, 0).unwrap();

    assert!(format_timestamp(earlier) < format_timestamp(later));
    assert_eq!(parse_timestamp(&format_timestamp(later)), Some(later));
  }

  #[test]
  fn test_parse_date() {
    assert_eq!(
      parse_date("2024-02-29"),
      NaiveDate::from_ymd_opt(2024, 2, 29)
    );
    assert_eq!(parse_date("not a date"), None);
  }
}
