pub mod suggestions;

use crate::db::AppState;
use crate::ledger::{self, LedgerError};
use crate::models::{RunType, RunTypePreference};
use crate::preferences;
use crate::weather::ForecastError;
use serde::ser::SerializeStruct;
use serde::Serialize;
use tracing::info;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
  #[error(transparent)]
  Forecast(#[from] ForecastError),

  #[error(transparent)]
  Ledger(#[from] LedgerError),

  #[error("Invalid request: {0}")]
  InvalidRequest(String),

  #[error("Database error: {0}")]
  Database(String),
}

impl PlannerError {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Forecast(e) => e.kind(),
      Self::Ledger(LedgerError::DateTaken(_)) => "date_taken",
      Self::Ledger(LedgerError::NotFound(_)) => "not_found",
      Self::Ledger(LedgerError::Database(_)) | Self::Database(_) => "database",
      Self::InvalidRequest(_) => "invalid_request",
    }
  }

  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Forecast(e) => e.is_retryable(),
      Self::Ledger(LedgerError::Database(_)) | Self::Database(_) => true,
      Self::Ledger(_) | Self::InvalidRequest(_) => false,
    }
  }
}

impl Serialize for PlannerError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    let mut out = serializer.serialize_struct("PlannerError", 3)?;
    out.serialize_field("kind", self.kind())?;
    out.serialize_field("message", &self.to_string())?;
    out.serialize_field("retryable", &self.is_retryable())?;
    out.end()
  }
}

/// ---------------------------------------------------------------------------
/// Preferences
/// ---------------------------------------------------------------------------

pub async fn get_run_type_preferences(state: &AppState) -> Result<Vec<RunTypePreference>, PlannerError> {
  preferences::load_preferences(&state.db)
    .await
    .map_err(PlannerError::Database)
}

pub async fn update_run_type_preference(
  state: &AppState,
  preference: RunTypePreference,
) -> Result<RunTypePreference, PlannerError> {
  // Races are scheduled regardless of weather
  let unrestricted = RunTypePreference::unrestricted(RunType::Race);
  if preference.run_type == RunType::Race && preference != unrestricted {
    return Err(PlannerError::InvalidRequest(
      "RACE preferences cannot carry weather limits".into(),
    ));
  }

  if let (Some(min), Some(max)) = (preference.min_temperature, preference.max_temperature) {
    if min > max {
      return Err(PlannerError::InvalidRequest(format!(
        "min_temperature {} is above max_temperature {}",
        min, max
      )));
    }
  }

  preferences::save_preference(&state.db, &preference)
    .await
    .map_err(PlannerError::Database)?;

  info!(run_type = %preference.run_type, "Updated run type preference");
  Ok(preference)
}

/// ---------------------------------------------------------------------------
/// Calendar & Cache Maintenance
/// ---------------------------------------------------------------------------

pub async fn complete_run(state: &AppState, run_id: i64) -> Result<(), PlannerError> {
  ledger::mark_run_completed(&state.db, run_id).await?;
  info!(run_id, "Marked run completed");
  Ok(())
}

/// Returns how many expired forecast rows were removed
pub async fn purge_forecast_cache(state: &AppState) -> Result<u64, PlannerError> {
  Ok(state.forecast.purge_expired().await?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{RunType, WeatherCondition};
  use crate::test_utils::*;
  use serde_json::json;

  #[test]
  fn test_planner_error_serializes_kind_and_retryable() {
    let err = PlannerError::from(ForecastError::RateLimited {
      retry_after_secs: Some(30),
    });
    let value = serde_json::to_value(&err).unwrap();
    assert_eq!(value["kind"], json!("forecast_rate_limited"));
    assert_eq!(value["retryable"], json!(true));
    assert!(value["message"].as_str().unwrap().contains("rate limited"));

    let taken = PlannerError::from(LedgerError::DateTaken(test_today()));
    let value = serde_json::to_value(&taken).unwrap();
    assert_eq!(value["kind"], json!("date_taken"));
    assert_eq!(value["retryable"], json!(false));
    assert_eq!(value["message"], json!("A run is already scheduled on 2025-06-02"));
  }

  #[tokio::test]
  async fn test_update_preference_roundtrips_through_db() {
    let pool = setup_test_db().await;
    let state = test_state(&pool, StubProvider::returning(Vec::new()));

    let mut long = RunTypePreference::default_for(RunType::LongRun);
    long.max_precipitation = Some(20.0);
    long.avoid_conditions.insert(WeatherCondition::Fog);

    update_run_type_preference(&state, long.clone()).await.expect("update");
    let stored = get_run_type_preferences(&state).await.expect("load");
    assert!(stored.contains(&long));

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_update_preference_rejects_inverted_temperatures() {
    let pool = setup_test_db().await;
    let state = test_state(&pool, StubProvider::returning(Vec::new()));

    let mut easy = RunTypePreference::default_for(RunType::EasyRun);
    easy.min_temperature = Some(20.0);
    easy.max_temperature = Some(5.0);

    let result = update_run_type_preference(&state, easy).await;
    assert!(matches!(result, Err(PlannerError::InvalidRequest(_))));

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_update_preference_rejects_race_limits() {
    let pool = setup_test_db().await;
    let state = test_state(&pool, StubProvider::returning(Vec::new()));

    let mut wet = RunTypePreference::default_for(RunType::Race);
    wet.max_precipitation = Some(30.0);
    let mut foggy = RunTypePreference::default_for(RunType::Race);
    foggy.avoid_conditions.insert(WeatherCondition::Fog);

    for race in [wet, foggy] {
      let result = update_run_type_preference(&state, race).await;
      assert!(matches!(result, Err(PlannerError::InvalidRequest(_))));
    }

    let stored = get_run_type_preferences(&state).await.expect("load preferences");
    let race = stored
      .iter()
      .find(|p| p.run_type == RunType::Race)
      .expect("race row");
    assert_eq!(*race, RunTypePreference::default_for(RunType::Race));

    update_run_type_preference(&state, RunTypePreference::default_for(RunType::Race))
      .await
      .expect("unrestricted race preference is accepted");

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_complete_unknown_run() {
    let pool = setup_test_db().await;
    let state = test_state(&pool, StubProvider::returning(Vec::new()));

    let result = complete_run(&state, 42).await;
    assert_eq!(result.unwrap_err().kind(), "not_found");

    teardown_test_db(pool).await;
  }
}
