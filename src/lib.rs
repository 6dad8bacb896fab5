pub mod clock;
pub mod commands;
pub mod config;
pub mod db;
pub mod ledger;
pub mod models;
pub mod preferences;
pub mod suggestions;
pub mod training_plan;
pub mod weather;

#[cfg(test)]
pub mod test_utils;

use config::{AppConfig, ConfigError};
use db::AppState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Install the tracing subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing() {
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new("run_planner_lib=info,run_planner=info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

/// One-shot: suggestions for `location` (or the configured one), printed as JSON.
/// Planner failures are printed as a JSON error object and reported as `Err`.
pub async fn run(location: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();
  init_tracing();

  let config = AppConfig::from_env()?;
  let location = location
    .or_else(|| config.location.clone())
    .ok_or_else(|| ConfigError::Missing("PLANNER_LOCATION".into()))?;

  let pool = db::initialize_db(&config.database_url).await?;
  let state = AppState::from_config(pool, &config)?;
  info!(location = %location, days = config.forecast_days, "Planning runs");

  match commands::suggestions::get_run_suggestions(&state, &location, config.forecast_days).await {
    Ok(suggestions) => {
      println!("{}", serde_json::to_string_pretty(&suggestions)?);
      Ok(())
    }
    Err(e) => {
      error!(error = %e, "Failed to generate suggestions");
      println!("{}", serde_json::to_string_pretty(&e)?);
      Err(e.into())
    }
  }
}
