//! Third-party data feeds: weather and exchange rates.

use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::api_types::{ApiRatesResponse, ApiWeatherResponse};
use super::types::{EconomicSnapshot, WeatherSnapshot};
use crate::config::{Config, ExternalConfig};
use crate::error::FetchError;

const WEATHER: &str = "weather API";
const ECONOMIC: &str = "exchange-rate API";

/// Source of external snapshots.
pub trait ExternalFeeds: Send + Sync + 'static {
  async fn weather(&self) -> Result<WeatherSnapshot, FetchError>;

  async fn economic(&self) -> Result<EconomicSnapshot, FetchError>;
}

/// Feeds backed by the public HTTP APIs.
#[derive(Clone)]
pub struct HttpFeeds {
  client: reqwest::Client,
  weather_url: Url,
  economic_url: Url,
  location: String,
  base_currency: String,
  currencies: Vec<String>,
  weather_key: Option<String>,
  economic_key: Option<String>,
}

impl HttpFeeds {
  pub fn new(
    config: &ExternalConfig,
    weather_key: Option<String>,
    economic_key: Option<String>,
  ) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(config.http_timeout())
      .user_agent(concat!("stocksight/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let weather_url = Url::parse(&config.weather_url)
      .map_err(|e| eyre!("Invalid weather_url '{}': {}", config.weather_url, e))?;
    let economic_url = Url::parse(&config.economic_url)
      .map_err(|e| eyre!("Invalid economic_url '{}': {}", config.economic_url, e))?;
    if economic_url.cannot_be_a_base() {
      return Err(eyre!("economic_url '{}' cannot take path segments", economic_url));
    }

    Ok(Self {
      client,
      weather_url,
      economic_url,
      location: config.weather_location.clone(),
      base_currency: config.base_currency.clone(),
      currencies: config.currencies.clone(),
      weather_key,
      economic_key,
    })
  }

  /// Build feeds with API keys taken from the environment.
  pub fn from_env(config: &Config) -> Result<Self> {
    Self::new(
      &config.external,
      Config::weather_api_key(),
      Config::economic_api_key(),
    )
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    service: &'static str,
    url: Url,
  ) -> Result<T, FetchError> {
    debug!(service, host = url.host_str().unwrap_or_default(), "fetching external feed");

    let response = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|e| FetchError::from_http(service, e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        service,
        status: status.as_u16(),
      });
    }

    let body = response
      .bytes()
      .await
      .map_err(|e| FetchError::from_http(service, e))?;

    serde_json::from_slice(&body).map_err(|e| FetchError::Decode {
      what: service,
      message: e.to_string(),
    })
  }
}

impl ExternalFeeds for HttpFeeds {
  async fn weather(&self) -> Result<WeatherSnapshot, FetchError> {
    let key = self
      .weather_key
      .as_deref()
      .ok_or(FetchError::MissingApiKey(WEATHER))?;

    let mut url = self.weather_url.clone();
    url
      .query_pairs_mut()
      .append_pair("q", &self.location)
      .append_pair("appid", key)
      .append_pair("units", "metric");

    let response: ApiWeatherResponse = self.get_json(WEATHER, url).await?;
    Ok(response.into_snapshot(&self.location))
  }

  async fn economic(&self) -> Result<EconomicSnapshot, FetchError> {
    let key = self
      .economic_key
      .as_deref()
      .ok_or(FetchError::MissingApiKey(ECONOMIC))?;

    let mut url = self.economic_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| FetchError::Decode {
        what: ECONOMIC,
        message: "base URL cannot take path segments".to_string(),
      })?
      .pop_if_empty()
      .extend([key, "latest", self.base_currency.as_str()]);

    let response: ApiRatesResponse = self.get_json(ECONOMIC, url).await?;
    response
      .into_snapshot(&self.base_currency, &self.currencies)
      .map_err(|message| FetchError::Decode {
        what: ECONOMIC,
        message,
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn offline_config() -> ExternalConfig {
    // Unroutable endpoints: a request would fail, not hang, if one were made.
    ExternalConfig {
      weather_url: "http://127.0.0.1:9/weather".to_string(),
      economic_url: "http://127.0.0.1:9/v6".to_string(),
      ..ExternalConfig::default()
    }
  }

  #[tokio::test]
  async fn test_missing_keys_fail_without_requests() {
    let feeds = HttpFeeds::new(&offline_config(), None, None).unwrap();

    let weather = feeds.weather().await;
    let economic = feeds.economic().await;

    assert!(matches!(weather, Err(FetchError::MissingApiKey(WEATHER))));
    assert!(matches!(economic, Err(FetchError::MissingApiKey(ECONOMIC))));
  }

  #[tokio::test]
  async fn test_unreachable_host_is_http_error() {
    let feeds = HttpFeeds::new(&offline_config(), Some("key".to_string()), None).unwrap();

    let result = feeds.weather().await;

    assert!(matches!(
      result,
      Err(FetchError::Http { service: WEATHER, .. }) | Err(FetchError::Timeout(WEATHER))
    ));
  }

  #[test]
  fn test_rejects_non_base_economic_url() {
    let config = ExternalConfig {
      economic_url: "mailto:rates@example.com".to_string(),
      ..offline_config()
    };

    assert!(HttpFeeds::new(&config, None, None).is_err());
  }
}
