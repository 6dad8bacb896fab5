//! HTTP forecast provider for a weatherapi.com-style daily forecast API

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{ForecastError, ForecastProvider};
use crate::models::{WeatherCondition, WeatherDay};

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

pub const DEFAULT_API_BASE: &str = "https://api.weatherapi.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Provider error codes (returned in the JSON error body)
const ERROR_CODE_NO_LOCATION: i64 = 1006;
const ERROR_CODE_MISSING_QUERY: i64 = 1003;
const ERROR_CODE_QUOTA_EXCEEDED: i64 = 2007;
const ERROR_CODE_KEY_MISSING: i64 = 1002;
const ERROR_CODE_KEY_INVALID: i64 = 2006;
const ERROR_CODE_KEY_DISABLED: i64 = 2008;

/// Hour used for feels-like and wind direction when hourly data is present
const REPRESENTATIVE_HOUR: usize = 12;

/// ---------------------------------------------------------------------------
/// API Response Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ForecastResponse {
  forecast: ForecastBody,
}

#[derive(Debug, Deserialize)]
struct ForecastBody {
  #[serde(default)]
  forecastday: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
struct ForecastDay {
  date: String,
  day: DaySummary,
  #[serde(default)]
  hour: Vec<HourSummary>,
}

#[derive(Debug, Deserialize)]
struct DaySummary {
  avgtemp_c: f64,
  maxwind_kph: f64,
  #[serde(default)]
  avghumidity: f64,
  #[serde(default)]
  daily_chance_of_rain: f64,
  #[serde(default)]
  daily_chance_of_snow: f64,
  condition: ConditionText,
}

#[derive(Debug, Deserialize)]
struct ConditionText {
  text: String,
}

#[derive(Debug, Deserialize)]
struct HourSummary {
  feelslike_c: Option<f64>,
  wind_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
  error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
  code: i64,
  message: String,
}

/// ---------------------------------------------------------------------------
/// Client
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
  client: Client,
  api_key: String,
  endpoint: Url,
}

impl WeatherApiProvider {
  /// Build a provider whose every request is bounded by `timeout`
  pub fn new(api_key: &str, api_base: &str, timeout: StdDuration) -> Result<Self, ForecastError> {
    let endpoint = Url::parse(&format!("{}/forecast.json", api_base.trim_end_matches('/')))
      .map_err(|e| ForecastError::InvalidRequest(format!("Bad weather API base URL: {}", e)))?;

    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| ForecastError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

    Ok(Self {
      client,
      api_key: api_key.to_string(),
      endpoint,
    })
  }

  fn request_url(&self, location: &str, days: u32) -> Url {
    let mut url = self.endpoint.clone();
    url
      .query_pairs_mut()
      .append_pair("key", &self.api_key)
      .append_pair("q", location)
      .append_pair("days", &days.to_string())
      .append_pair("aqi", "no")
      .append_pair("alerts", "no");
    url
  }
}

#[async_trait]
impl ForecastProvider for WeatherApiProvider {
  async fn fetch(&self, location: &str, days: u32) -> Result<Vec<WeatherDay>, ForecastError> {
    debug!(location, days, "Fetching forecast from provider");

    let response = self.client.get(self.request_url(location, days)).send().await?;
    let status = response.status();

    if !status.is_success() {
      let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
      let body = response.text().await.unwrap_or_default();
      return Err(classify_failure(status, &body, retry_after, location));
    }

    let body = response.text().await?;
    let parsed: ForecastResponse = serde_json::from_str(&body).map_err(|e| {
      warn!(
        error = %e,
        body = %body.chars().take(500).collect::<String>(),
        "Failed to parse forecast response"
      );
      ForecastError::Unavailable(format!("Malformed forecast response: {}", e))
    })?;

    Ok(
      parsed
        .forecast
        .forecastday
        .into_iter()
        .filter_map(|day| to_weather_day(location, day))
        .collect(),
    )
  }
}

/// Map a non-2xx response onto the error taxonomy
fn classify_failure(
  status: StatusCode,
  body: &str,
  retry_after_secs: Option<u64>,
  location: &str,
) -> ForecastError {
  let detail = serde_json::from_str::<ErrorResponse>(body).ok().map(|r| r.error);
  let message = detail
    .as_ref()
    .map(|d| d.message.clone())
    .unwrap_or_else(|| body.chars().take(200).collect());

  match (status, detail.as_ref().map(|d| d.code)) {
    (StatusCode::TOO_MANY_REQUESTS, _) | (_, Some(ERROR_CODE_QUOTA_EXCEEDED)) => {
      ForecastError::RateLimited { retry_after_secs }
    }
    (_, Some(ERROR_CODE_KEY_MISSING | ERROR_CODE_KEY_INVALID | ERROR_CODE_KEY_DISABLED))
    | (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => ForecastError::Unauthorized(message),
    (_, Some(ERROR_CODE_NO_LOCATION)) | (_, Some(ERROR_CODE_MISSING_QUERY)) => {
      ForecastError::LocationNotFound(location.to_string())
    }
    (StatusCode::NOT_FOUND, _) => ForecastError::LocationNotFound(location.to_string()),
    (StatusCode::BAD_REQUEST, _) => ForecastError::InvalidRequest(message),
    (s, _) => ForecastError::Unavailable(format!("Provider returned {}: {}", s.as_u16(), message)),
  }
}

fn to_weather_day(location: &str, raw: ForecastDay) -> Option<WeatherDay> {
  let date = match NaiveDate::parse_from_str(&raw.date, "%Y-%m-%d") {
    Ok(d) => d,
    Err(e) => {
      warn!(date = %raw.date, error = %e, "Skipping forecast day with unparseable date");
      return None;
    }
  };

  let representative = raw.hour.get(REPRESENTATIVE_HOUR);
  let feels_like = representative
    .and_then(|h| h.feelslike_c)
    .unwrap_or(raw.day.avgtemp_c);
  let wind_direction = representative
    .and_then(|h| h.wind_dir.clone())
    .unwrap_or_default();

  Some(WeatherDay {
    location: location.to_string(),
    date,
    condition: WeatherCondition::classify(&raw.day.condition.text),
    temperature: raw.day.avgtemp_c,
    feels_like,
    precipitation: raw.day.daily_chance_of_rain.max(raw.day.daily_chance_of_snow),
    humidity: raw.day.avghumidity,
    wind_speed: raw.day.maxwind_kph,
    wind_direction,
  })
}
