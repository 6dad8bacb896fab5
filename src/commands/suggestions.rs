use crate::commands::PlannerError;
use crate::db::AppState;
use crate::ledger;
use crate::models::{AcceptedRun, Suggestion, WeatherDay};
use crate::preferences;
use crate::training_plan;
use tracing::{debug, info};

/// ---------------------------------------------------------------------------
/// Forecast
/// ---------------------------------------------------------------------------

/// Cache-first forecast for today and the following `days - 1` days
pub async fn get_forecast(
  state: &AppState,
  location: &str,
  days: u32,
) -> Result<Vec<WeatherDay>, PlannerError> {
  Ok(state.forecast.resolve(location, days).await?)
}

/// ---------------------------------------------------------------------------
/// Suggestions
/// ---------------------------------------------------------------------------

/// Gathers forecast, plan, preferences and calendar, then runs the engine.
/// Only the forecast step can fail on provider trouble; everything after it
/// is local.
pub async fn get_run_suggestions(
  state: &AppState,
  location: &str,
  days: u32,
) -> Result<Vec<Suggestion>, PlannerError> {
  let forecast = state.forecast.resolve(location, days).await?;
  let today = state.clock.today();

  let week = training_plan::current_training_week(&state.db, today)
    .await
    .map_err(PlannerError::Database)?;
  let preferences = preferences::load_preferences(&state.db)
    .await
    .map_err(PlannerError::Database)?;
  let accepted = ledger::accepted_runs(&state.db).await?;
  let progression = ledger::progression_stats(&state.db).await?;

  debug!(
    location,
    forecast_days = forecast.len(),
    accepted = accepted.len(),
    longest_km = progression.longest_completed_distance,
    "Planner inputs loaded"
  );

  let suggestions = state
    .engine
    .generate(&forecast, week.as_ref(), &preferences, &accepted, &progression);

  info!(
    location,
    days,
    week = ?week.as_ref().map(|w| w.week_number),
    count = suggestions.len(),
    "Generated run suggestions"
  );

  Ok(suggestions)
}

/// ---------------------------------------------------------------------------
/// Accept
/// ---------------------------------------------------------------------------

/// Put a suggestion on the calendar. Later suggestion requests skip its date.
pub async fn accept_suggestion(
  state: &AppState,
  suggestion: &Suggestion,
) -> Result<AcceptedRun, PlannerError> {
  if !suggestion.distance.is_finite() || suggestion.distance <= 0.0 {
    return Err(PlannerError::InvalidRequest(format!(
      "Distance must be positive, got {}",
      suggestion.distance
    )));
  }

  let today = state.clock.today();
  if suggestion.date < today {
    return Err(PlannerError::InvalidRequest(format!(
      "Cannot schedule a run in the past ({})",
      suggestion.date
    )));
  }

  let run = ledger::insert_accepted_run(
    &state.db,
    suggestion.date,
    suggestion.run_type,
    suggestion.distance,
  )
  .await?;

  info!(
    id = run.id,
    date = %run.date,
    run_type = %run.run_type,
    distance = run.distance,
    "Accepted run suggestion"
  );

  Ok(run)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
