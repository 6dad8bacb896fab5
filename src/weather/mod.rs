//! Forecast acquisition: the provider seam, the cache store, and the
//! cache-first aggregator that sits on top of both.

pub mod cache;
pub mod provider;
pub mod store;

use async_trait::async_trait;
use std::sync::Arc;

use crate::models::WeatherDay;

pub use cache::ForecastCache;
pub use provider::WeatherApiProvider;
pub use store::{CacheStore, SqliteCacheStore};

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
  /// Provider 5xx, timeout, network failure or malformed payload
  #[error("Forecast unavailable: {0}")]
  Unavailable(String),

  #[error("Forecast location not found: {0}")]
  LocationNotFound(String),

  /// Key missing, invalid or disabled; retrying will not help
  #[error("Forecast provider rejected credentials: {0}")]
  Unauthorized(String),

  #[error("Forecast provider rate limited")]
  RateLimited { retry_after_secs: Option<u64> },

  #[error("Invalid forecast request: {0}")]
  InvalidRequest(String),

  #[error("Forecast cache error: {0}")]
  Store(String),
}

impl ForecastError {
  /// Transient failures are worth retrying; input errors are not
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Unavailable(_) | Self::RateLimited { .. } | Self::Store(_) => true,
      Self::LocationNotFound(_) | Self::Unauthorized(_) | Self::InvalidRequest(_) => false,
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Self::Unavailable(_) => "forecast_unavailable",
      Self::LocationNotFound(_) => "forecast_location_not_found",
      Self::Unauthorized(_) => "forecast_unauthorized",
      Self::RateLimited { .. } => "forecast_rate_limited",
      Self::InvalidRequest(_) => "invalid_request",
      Self::Store(_) => "forecast_cache",
    }
  }
}

impl From<sqlx::Error> for ForecastError {
  fn from(e: sqlx::Error) -> Self {
    ForecastError::Store(e.to_string())
  }
}

impl From<reqwest::Error> for ForecastError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      ForecastError::Unavailable("request timed out".into())
    } else {
      ForecastError::Unavailable(e.to_string())
    }
  }
}

/// ---------------------------------------------------------------------------
/// Provider Seam
/// ---------------------------------------------------------------------------

/// Source of raw daily forecasts.
///
/// Implementations may return fewer or more days than asked for, in any
/// order; callers filter to the dates they need.
#[async_trait]
pub trait ForecastProvider: Send + Sync {
  async fn fetch(&self, location: &str, days: u32) -> Result<Vec<WeatherDay>, ForecastError>;
}

#[async_trait]
impl<T: ForecastProvider + ?Sized> ForecastProvider for Arc<T> {
  async fn fetch(&self, location: &str, days: u32) -> Result<Vec<WeatherDay>, ForecastError> {
    (**self).fetch(location, days).await
  }
}
