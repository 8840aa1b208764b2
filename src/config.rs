use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use crate::cache::CacheTtls;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub database: DatabaseConfig,
  pub inventory: InventoryConfig,
  pub cache: CacheConfig,
  pub external: ExternalConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
  /// SQLite file (default: $XDG_DATA_HOME/stocksight/inventory.db)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
  /// Products at or below this quantity count as low stock
  pub low_stock_threshold: i64,
  /// Products at or below this quantity count as critical
  pub critical_stock_threshold: i64,
  /// How far ahead to look for expiring products
  pub expiry_window_days: i64,
  /// Row limit for the "recent ..." lists
  pub recent_limit: usize,
}

impl Default for InventoryConfig {
  fn default() -> Self {
    Self {
      low_stock_threshold: 10,
      critical_stock_threshold: 3,
      expiry_window_days: 30,
      recent_limit: 10,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub inventory_ttl_secs: i64,
  pub external_ttl_secs: i64,
  pub user_ttl_secs: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      inventory_ttl_secs: 300,
      external_ttl_secs: 900,
      user_ttl_secs: 120,
    }
  }
}

impl CacheConfig {
  pub fn ttls(&self) -> CacheTtls {
    CacheTtls {
      inventory: Duration::seconds(self.inventory_ttl_secs),
      external: Duration::seconds(self.external_ttl_secs),
      user_specific: Duration::seconds(self.user_ttl_secs),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
  /// OpenWeatherMap-compatible current weather endpoint
  pub weather_url: String,
  pub weather_location: String,
  /// ExchangeRate-API-compatible base URL (key and currency are appended)
  pub economic_url: String,
  pub base_currency: String,
  /// Currency codes to keep from the rates response
  pub currencies: Vec<String>,
  pub http_timeout_secs: u64,
}

impl Default for ExternalConfig {
  fn default() -> Self {
    Self {
      weather_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
      weather_location: "London".to_string(),
      economic_url: "https://v6.exchangerate-api.com/v6".to_string(),
      base_currency: "USD".to_string(),
      currencies: ["EUR", "GBP", "JPY", "CNY"]
        .into_iter()
        .map(String::from)
        .collect(),
      http_timeout_secs: 5,
    }
  }
}

impl ExternalConfig {
  pub fn http_timeout(&self) -> StdDuration {
    StdDuration::from_secs(self.http_timeout_secs)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./stocksight.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/stocksight/config.yaml
  ///
  /// Without any config file the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };
    config.validate()?;

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("stocksight.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("stocksight").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    let inventory = &self.inventory;
    if inventory.critical_stock_threshold > inventory.low_stock_threshold {
      return Err(eyre!(
        "critical_stock_threshold ({}) must not exceed low_stock_threshold ({})",
        inventory.critical_stock_threshold,
        inventory.low_stock_threshold
      ));
    }

    let cache = &self.cache;
    if cache.inventory_ttl_secs < 0 || cache.external_ttl_secs < 0 || cache.user_ttl_secs < 0 {
      return Err(eyre!("Cache TTLs must not be negative"));
    }

    for (name, value) in [
      ("weather_url", &self.external.weather_url),
      ("economic_url", &self.external.economic_url),
    ] {
      url::Url::parse(value).map_err(|e| eyre!("Invalid {} '{}': {}", name, value, e))?;
    }

    Ok(())
  }

  /// Path of the inventory database, falling back to the data directory.
  pub fn database_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.database.path {
      return Ok(path.clone());
    }
    Ok(data_dir()?.join("inventory.db"))
  }

  /// Get the weather API key from the environment, if set.
  pub fn weather_api_key() -> Option<String> {
    non_empty_env("STOCKSIGHT_WEATHER_API_KEY")
  }

  /// Get the exchange-rate API key from the environment, if set.
  pub fn economic_api_key() -> Option<String> {
    non_empty_env("STOCKSIGHT_ECONOMIC_API_KEY")
  }
}

fn non_empty_env(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Application data directory ($XDG_DATA_HOME/stocksight).
pub fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("stocksight"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
  }

  #[test]
  fn test_partial_config_fills_defaults() {
    let file = write_config(
      "inventory:\n  low_stock_threshold: 20\nexternal:\n  weather_location: Oslo\n",
    );

    let config = Config::load(Some(file.path())).unwrap();

    assert_eq!(config.inventory.low_stock_threshold, 20);
    assert_eq!(config.inventory.critical_stock_threshold, 3);
    assert_eq!(config.external.weather_location, "Oslo");
    assert_eq!(config.external.base_currency, "USD");
    assert_eq!(config.cache.ttls(), CacheTtls::default());
  }

  #[test]
  fn test_cache_ttls_from_seconds() {
    let file = write_config("cache:\n  inventory_ttl_secs: 60\n");
    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.cache.ttls().inventory, Duration::seconds(60));
    assert_eq!(config.cache.ttls().external, Duration::minutes(15));
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/stocksight.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_critical_above_low_is_rejected() {
    let file = write_config(
      "inventory:\n  low_stock_threshold: 2\n  critical_stock_threshold: 5\n",
    );
    assert!(Config::load(Some(file.path())).is_err());
  }

  #[test]
  fn test_invalid_url_is_rejected() {
    let file = write_config("external:\n  weather_url: not a url\n");
    assert!(Config::load(Some(file.path())).is_err());
  }

  #[test]
  fn test_explicit_database_path_wins() {
    let file = write_config("database:\n  path: /tmp/stock.db\n");
    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/stock.db"));
  }
}
