use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::suggestions::SuggestionEngine;
use crate::weather::{ForecastCache, ForecastError, ForecastProvider, SqliteCacheStore, WeatherApiProvider};

pub type DbPool = SqlitePool;

/// Application state shared by every command
pub struct AppState {
  pub db: DbPool,
  pub forecast: ForecastCache,
  pub engine: SuggestionEngine,
  pub clock: Arc<dyn Clock>,
}

impl AppState {
  /// Wire the cache and engine around an existing pool
  pub fn new(
    db: DbPool,
    provider: Arc<dyn ForecastProvider>,
    engine: SuggestionEngine,
    clock: Arc<dyn Clock>,
  ) -> Self {
    let store = Arc::new(SqliteCacheStore::new(db.clone()));
    let forecast = ForecastCache::new(provider, store, clock.clone());
    Self {
      db,
      forecast,
      engine,
      clock,
    }
  }

  /// Production wiring: weatherapi.com provider and the wall clock
  pub fn from_config(db: DbPool, config: &AppConfig) -> Result<Self, ForecastError> {
    let provider = WeatherApiProvider::new(
      &config.weather.api_key,
      &config.weather.api_base,
      StdDuration::from_secs(config.weather.timeout_secs),
    )?;

    Ok(Self::new(
      db,
      Arc::new(provider),
      SuggestionEngine::new(config.engine.clone()),
      Arc::new(SystemClock),
    ))
  }
}

/// Initialize the database connection pool and run migrations
pub async fn initialize_db(database_url: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
  info!(database_url, "Initializing database");

  let pool = SqlitePoolOptions::new()
    .max_connections(5)
    .connect(database_url)
    .await?;

  sqlx::migrate!("./migrations").run(&pool).await?;

  info!("Database initialized successfully");

  Ok(pool)
}
