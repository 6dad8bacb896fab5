//! Test utilities and helpers for integration and unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Mock data factories
//! - A scripted forecast provider
//! - Helper assertions

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use sqlx::SqlitePool;

use crate::clock::FixedClock;
use crate::db::AppState;
use crate::models::{
  AcceptedRun, RunType, RunTypePreference, TrainingWeek, WeatherCondition, WeatherDay,
};
use crate::suggestions::SuggestionEngine;
use crate::weather::{ForecastError, ForecastProvider};

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

pub async fn count_cache_rows(pool: &SqlitePool) -> i64 {
  sqlx::query_scalar("SELECT COUNT(*) FROM weather_cache")
    .fetch_one(pool)
    .await
    .expect("Failed to count cache rows")
}

/// Seed a training week; returns its row id
pub async fn seed_training_week(pool: &SqlitePool, week: &TrainingWeek) -> i64 {
  sqlx::query(
    r#"
    INSERT INTO training_weeks (
      week_number, phase, week_start, week_end,
      weekly_mileage_target, long_run_target, race_date, race_distance
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    "#,
  )
  .bind(week.week_number)
  .bind(&week.phase)
  .bind(week.week_start)
  .bind(week.week_end)
  .bind(week.weekly_mileage_target)
  .bind(week.long_run_target)
  .bind(week.race_date)
  .bind(week.race_distance)
  .execute(pool)
  .await
  .expect("Failed to seed training week")
  .last_insert_rowid()
}

/// Seed a scheduled run `days_from_today` days from [`test_today`]
pub async fn seed_scheduled_run(
  pool: &SqlitePool,
  days_from_today: i64,
  run_type: RunType,
  distance: f64,
  completed: bool,
) -> i64 {
  sqlx::query(
    "INSERT INTO scheduled_runs (date, run_type, distance, completed) VALUES (?1, ?2, ?3, ?4)",
  )
  .bind(test_today() + Duration::days(days_from_today))
  .bind(run_type.as_str())
  .bind(distance)
  .bind(completed)
  .execute(pool)
  .await
  .expect("Failed to seed scheduled run")
  .last_insert_rowid()
}

/// ---------------------------------------------------------------------------
/// Time Helpers
/// ---------------------------------------------------------------------------

/// The date every fixture is anchored to
pub fn test_today() -> NaiveDate {
  NaiveDate::from_ymd_opt(2025, 6, 2).expect("valid fixture date")
}

/// Frozen at 06:00 UTC on [`test_today`]
pub fn test_clock() -> FixedClock {
  FixedClock::new(
    Utc
      .with_ymd_and_hms(2025, 6, 2, 6, 0, 0)
      .single()
      .expect("valid fixture time"),
  )
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// A forecast day for "Testville", `days_from_today` after [`test_today`]
pub fn mock_weather_day(
  days_from_today: i64,
  condition: WeatherCondition,
  temperature: f64,
  precipitation: f64,
  wind_speed: f64,
) -> WeatherDay {
  WeatherDay {
    location: "Testville".to_string(),
    date: test_today() + Duration::days(days_from_today),
    condition,
    temperature,
    feels_like: temperature - 1.0,
    precipitation,
    humidity: 55.0,
    wind_speed,
    wind_direction: "NW".to_string(),
  }
}

/// Seven clear days: 15°C, 0% precipitation, 10 km/h wind
pub fn mock_week_forecast() -> Vec<WeatherDay> {
  (0..7)
    .map(|i| mock_weather_day(i, WeatherCondition::Clear, 15.0, 0.0, 10.0))
    .collect()
}

/// Build-phase week starting on [`test_today`]
pub fn mock_training_week(weekly_mileage_target: f64, long_run_target: f64) -> TrainingWeek {
  TrainingWeek {
    week_number: 3,
    phase: "build".to_string(),
    week_start: test_today(),
    week_end: test_today() + Duration::days(6),
    weekly_mileage_target,
    long_run_target,
    race_date: None,
    race_distance: None,
  }
}

pub fn mock_accepted_run(
  id: i64,
  days_from_today: i64,
  run_type: RunType,
  distance: f64,
  completed: bool,
) -> AcceptedRun {
  AcceptedRun {
    id,
    date: test_today() + Duration::days(days_from_today),
    run_type,
    distance,
    completed,
  }
}

/// The built-in tolerance for every run type
pub fn default_preferences() -> Vec<RunTypePreference> {
  RunType::ALL
    .into_iter()
    .map(RunTypePreference::default_for)
    .collect()
}

/// ---------------------------------------------------------------------------
/// Scripted Forecast Provider
/// ---------------------------------------------------------------------------

type ErrorFactory = Box<dyn Fn() -> ForecastError + Send + Sync>;

/// Returns canned days (or a canned error) and counts calls
pub struct StubProvider {
  days: Vec<WeatherDay>,
  error: Option<ErrorFactory>,
  delay: Option<StdDuration>,
  calls: AtomicUsize,
}

impl StubProvider {
  pub fn returning(days: Vec<WeatherDay>) -> Self {
    Self {
      days,
      error: None,
      delay: None,
      calls: AtomicUsize::new(0),
    }
  }

  pub fn failing(make_error: impl Fn() -> ForecastError + Send + Sync + 'static) -> Self {
    Self {
      days: Vec::new(),
      error: Some(Box::new(make_error)),
      delay: None,
      calls: AtomicUsize::new(0),
    }
  }

  pub fn with_delay(mut self, delay: StdDuration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn call_count(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ForecastProvider for StubProvider {
  async fn fetch(&self, _location: &str, _days: u32) -> Result<Vec<WeatherDay>, ForecastError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    match &self.error {
      Some(make_error) => Err(make_error()),
      None => Ok(self.days.clone()),
    }
  }
}

/// App state over `pool`, `provider` and [`test_clock`], default engine
pub fn test_state(pool: &SqlitePool, provider: impl ForecastProvider + 'static) -> AppState {
  AppState::new(
    pool.clone(),
    Arc::new(provider),
    SuggestionEngine::default(),
    Arc::new(test_clock()),
  )
}

/// ---------------------------------------------------------------------------
/// Test Macros
/// ---------------------------------------------------------------------------

/// Assert two floats are approximately equal within a tolerance
#[macro_export]
macro_rules! assert_approx_eq {
  ($left:expr, $right:expr, $tolerance:expr) => {
    let diff = ($left - $right).abs();
    assert!(
      diff < $tolerance,
      "Values not approximately equal: {} vs {} (diff: {}, tolerance: {})",
      $left,
      $right,
      diff,
      $tolerance
    );
  };
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('weather_cache', 'training_weeks', 'run_type_preferences', 'scheduled_runs')"
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 4, "Expected 4 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_migration_seeds_every_run_type() {
    let pool = setup_test_db().await;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM run_type_preferences")
      .fetch_one(&pool)
      .await
      .expect("Failed to count preferences");
    assert_eq!(count, RunType::ALL.len() as i64);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_stub_provider_counts_calls() {
    let provider = StubProvider::returning(mock_week_forecast());
    assert_eq!(provider.call_count(), 0);

    let days = provider.fetch("Testville", 7).await.expect("stub fetch");
    assert_eq!(days.len(), 7);
    assert_eq!(provider.call_count(), 1);
  }

  #[test]
  fn test_mock_factories_create_valid_data() {
    let forecast = mock_week_forecast();
    assert_eq!(forecast.len(), 7);
    assert_eq!(forecast[0].date, test_today());
    assert_approx_eq!(forecast[0].temperature, 15.0, 1e-9);

    let week = mock_training_week(30.0, 14.0);
    assert!(week.contains(test_today()));
    assert!(!week.contains(test_today() + Duration::days(7)));

    assert_eq!(default_preferences().len(), 6);
  }
}
