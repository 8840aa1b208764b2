//! Serde-deserializable types matching the weather and exchange-rate APIs.
//!
//! Kept apart from the snapshot types so the prompt side never sees
//! provider-specific field names.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

use super::types::{EconomicSnapshot, WeatherSnapshot};

// ============================================================================
// OpenWeatherMap current weather
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiWeatherResponse {
  #[serde(default)]
  pub name: String,
  pub main: ApiWeatherMain,
  #[serde(default)]
  pub weather: Vec<ApiWeatherCondition>,
}

#[derive(Debug, Deserialize)]
pub struct ApiWeatherMain {
  pub temp: f64,
  pub humidity: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct ApiWeatherCondition {
  pub main: String,
  #[serde(default)]
  pub description: String,
}

impl ApiWeatherResponse {
  /// `fallback_location` is used when the response carries no city name.
  pub fn into_snapshot(self, fallback_location: &str) -> WeatherSnapshot {
    let conditions = self
      .weather
      .into_iter()
      .next()
      .map(|w| {
        if w.description.is_empty() {
          w.main
        } else {
          w.description
        }
      })
      .unwrap_or_else(|| "unknown".to_string());

    WeatherSnapshot {
      location: if self.name.is_empty() {
        fallback_location.to_string()
      } else {
        self.name
      },
      temperature_c: self.main.temp,
      conditions,
      humidity: self.main.humidity,
    }
  }
}

// ============================================================================
// ExchangeRate-API latest rates
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiRatesResponse {
  pub result: String,
  pub base_code: Option<String>,
  pub time_last_update_utc: Option<String>,
  #[serde(default)]
  pub conversion_rates: HashMap<String, f64>,
  #[serde(rename = "error-type")]
  pub error_type: Option<String>,
}

impl ApiRatesResponse {
  /// Convert to a snapshot holding only `currencies`.
  ///
  /// Returns the provider's error type when the response reports failure.
  pub fn into_snapshot(
    self,
    base: &str,
    currencies: &[String],
  ) -> Result<EconomicSnapshot, String> {
    if self.result != "success" {
      return Err(self.error_type.unwrap_or(self.result));
    }

    let rates: BTreeMap<String, f64> = self
      .conversion_rates
      .into_iter()
      .filter(|(code, _)| currencies.iter().any(|c| c.eq_ignore_ascii_case(code)))
      .collect();

    Ok(EconomicSnapshot {
      base_currency: self.base_code.unwrap_or_else(|| base.to_string()),
      rates,
      updated_at: self.time_last_update_utc,
    })
  }
}
