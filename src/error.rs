//! Failure type for individual data fetches.
//!
//! A `FetchError` never aborts a context build. Builders record the failed
//! section and carry on with an empty value in its place.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("database query failed: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("{service} request failed: {source}")]
  Http {
    service: &'static str,
    #[source]
    source: reqwest::Error,
  },

  #[error("{service} responded with status {status}")]
  Status { service: &'static str, status: u16 },

  #[error("failed to decode {what}: {message}")]
  Decode { what: &'static str, message: String },

  #[error("no API key configured for {0}")]
  MissingApiKey(&'static str),

  #[error("{0} timed out")]
  Timeout(&'static str),

  #[error("store task failed: {0}")]
  TaskJoin(String),

  #[error("{0} not found")]
  NotFound(String),

  #[error("write rejected: {0}")]
  Rejected(String),
}

impl FetchError {
  /// Classify a reqwest failure, separating timeouts from other transport errors.
  pub fn from_http(service: &'static str, err: reqwest::Error) -> Self {
    if err.is_timeout() {
      Self::Timeout(service)
    } else {
      Self::Http {
        service,
        source: err,
      }
    }
  }
}

impl From<tokio::task::JoinError> for FetchError {
  fn from(err: tokio::task::JoinError) -> Self {
    Self::TaskJoin(err.to_string())
  }
}
