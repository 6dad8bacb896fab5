//! Per-run-type weather tolerances
//!
//! Avoid conditions are stored as a JSON array of condition names. Names that no
//! longer match a [`WeatherCondition`] are dropped with a warning rather than
//! failing the whole load.

use std::collections::BTreeSet;

use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::models::{RunType, RunTypePreference, WeatherCondition};

/// Parse a stored avoid list. Matching is case-insensitive.
pub fn parse_avoid_conditions(run_type: RunType, json: &str) -> BTreeSet<WeatherCondition> {
  let names: Vec<String> = match serde_json::from_str(json) {
    Ok(names) => names,
    Err(e) => {
      warn!(%run_type, error = %e, "Malformed avoid_conditions_json, ignoring");
      return BTreeSet::new();
    }
  };

  names
    .iter()
    .filter_map(|name| match name.parse::<WeatherCondition>() {
      Ok(condition) => Some(condition),
      Err(_) => {
        warn!(%run_type, condition = %name, "Dropping unknown avoid condition");
        None
      }
    })
    .collect()
}

/// Every stored preference row. Run types without a row are absent here;
/// the engine falls back to [`RunTypePreference::default_for`] for those.
pub async fn load_preferences(pool: &SqlitePool) -> Result<Vec<RunTypePreference>, String> {
  let rows = sqlx::query(
    r#"
    SELECT run_type, max_precipitation, max_wind_speed, min_temperature,
           max_temperature, avoid_conditions_json
    FROM run_type_preferences
    ORDER BY run_type
    "#,
  )
  .fetch_all(pool)
  .await
  .map_err(|e| format!("Failed to load run type preferences: {}", e))?;

  let mut preferences = Vec::with_capacity(rows.len());
  for row in rows {
    let run_type_str: String = row.get("run_type");
    let run_type = match run_type_str.parse::<RunType>() {
      Ok(run_type) => run_type,
      Err(e) => {
        warn!(error = %e, "Skipping preference row");
        continue;
      }
    };
    let avoid_json: String = row.get("avoid_conditions_json");

    preferences.push(RunTypePreference {
      run_type,
      max_precipitation: row.get("max_precipitation"),
      max_wind_speed: row.get("max_wind_speed"),
      min_temperature: row.get("min_temperature"),
      max_temperature: row.get("max_temperature"),
      avoid_conditions: parse_avoid_conditions(run_type, &avoid_json),
    });
  }

  Ok(preferences)
}

/// Insert or replace the row for `pref.run_type`
pub async fn save_preference(pool: &SqlitePool, pref: &RunTypePreference) -> Result<(), String> {
  let avoid: Vec<&str> = pref.avoid_conditions.iter().map(|c| c.as_str()).collect();
  let avoid_json =
    serde_json::to_string(&avoid).map_err(|e| format!("Failed to encode avoid conditions: {}", e))?;

  sqlx::query(
    r#"
    INSERT INTO run_type_preferences (
      run_type, max_precipitation, max_wind_speed, min_temperature,
      max_temperature, avoid_conditions_json, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, CURRENT_TIMESTAMP)
    ON CONFLICT(run_type) DO UPDATE SET
      max_precipitation = excluded.max_precipitation,
      max_wind_speed = excluded.max_wind_speed,
      min_temperature = excluded.min_temperature,
      max_temperature = excluded.max_temperature,
      avoid_conditions_json = excluded.avoid_conditions_json,
      updated_at = CURRENT_TIMESTAMP
    "#,
  )
  .bind(pref.run_type.as_str())
  .bind(pref.max_precipitation)
  .bind(pref.max_wind_speed)
  .bind(pref.min_temperature)
  .bind(pref.max_temperature)
  .bind(avoid_json)
  .execute(pool)
  .await
  .map_err(|e| format!("Failed to save preference for {}: {}", pref.run_type, e))?;

  Ok(())
}
