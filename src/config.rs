//! Application configuration, read from the environment (and `.env` via dotenvy)

use std::env;
use std::fs;
use std::str::FromStr;

use crate::suggestions::EngineConfig;
use crate::weather::cache::MAX_FORECAST_DAYS;
use crate::weather::provider::{DEFAULT_API_BASE, DEFAULT_TIMEOUT_SECS};

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

pub const DEFAULT_DATABASE_URL: &str = "sqlite://run-planner.db?mode=rwc";
pub const DEFAULT_FORECAST_DAYS: u32 = 7;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Missing configuration: {0}")]
  Missing(String),

  #[error("Invalid value for {var}: {message}")]
  Invalid { var: String, message: String },

  #[error("Failed to load engine config from {path}: {message}")]
  EngineConfig { path: String, message: String },
}

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherApiConfig {
  pub api_key: String,
  pub api_base: String,
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
  pub database_url: String,
  pub weather: WeatherApiConfig,
  /// Default location when none is given on the command line
  pub location: Option<String>,
  pub forecast_days: u32,
  pub engine: EngineConfig,
}

impl AppConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    let api_key = env::var("WEATHER_API_KEY")
      .ok()
      .filter(|v| !v.trim().is_empty())
      .ok_or_else(|| ConfigError::Missing("WEATHER_API_KEY".into()))?;

    let forecast_days = parse_var("PLANNER_FORECAST_DAYS", DEFAULT_FORECAST_DAYS)?;
    if forecast_days == 0 || forecast_days > MAX_FORECAST_DAYS {
      return Err(ConfigError::Invalid {
        var: "PLANNER_FORECAST_DAYS".into(),
        message: format!("must be between 1 and {}", MAX_FORECAST_DAYS),
      });
    }

    let engine = match env::var("PLANNER_ENGINE_CONFIG") {
      Ok(path) if !path.trim().is_empty() => load_engine_config(&path)?,
      _ => EngineConfig::default(),
    };

    Ok(Self {
      database_url: env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
      weather: WeatherApiConfig {
        api_key,
        api_base: env::var("WEATHER_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
        timeout_secs: parse_var("WEATHER_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
      },
      location: env::var("PLANNER_LOCATION")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()),
      forecast_days,
      engine,
    })
  }
}

fn parse_var<T>(var: &str, default: T) -> Result<T, ConfigError>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match env::var(var) {
    Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
      var: var.to_string(),
      message: format!("{:?}: {}", raw, e),
    }),
    Err(_) => Ok(default),
  }
}

/// Partial JSON overrides are fine; unspecified fields keep their defaults
pub fn load_engine_config(path: &str) -> Result<EngineConfig, ConfigError> {
  let json = fs::read_to_string(path).map_err(|e| ConfigError::EngineConfig {
    path: path.to_string(),
    message: e.to_string(),
  })?;

  EngineConfig::from_json(&json).map_err(|message| ConfigError::EngineConfig {
    path: path.to_string(),
    message,
  })
}
