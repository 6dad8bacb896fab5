//! Training plan lookup

use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};

use crate::models::TrainingWeek;

/// The week whose [week_start, week_end] covers `today`.
/// Overlapping weeks resolve to the one that started last.
pub async fn current_training_week(
  pool: &SqlitePool,
  today: NaiveDate,
) -> Result<Option<TrainingWeek>, String> {
  let row = sqlx::query(
    r#"
    SELECT week_number, phase, week_start, week_end, weekly_mileage_target,
           long_run_target, race_date, race_distance
    FROM training_weeks
    WHERE week_start <= ?1 AND week_end >= ?1
    ORDER BY week_start DESC, id DESC
    LIMIT 1
    "#,
  )
  .bind(today)
  .fetch_optional(pool)
  .await
  .map_err(|e| format!("Failed to load training week: {}", e))?;

  let Some(row) = row else {
    return Ok(None);
  };

  let week = TrainingWeek {
    week_number: row.try_get("week_number").map_err(|e| e.to_string())?,
    phase: row.try_get("phase").map_err(|e| e.to_string())?,
    week_start: row.try_get("week_start").map_err(|e| e.to_string())?,
    week_end: row.try_get("week_end").map_err(|e| e.to_string())?,
    weekly_mileage_target: row.try_get("weekly_mileage_target").map_err(|e| e.to_string())?,
    long_run_target: row.try_get("long_run_target").map_err(|e| e.to_string())?,
    race_date: row.try_get("race_date").map_err(|e| e.to_string())?,
    race_distance: row.try_get("race_distance").map_err(|e| e.to_string())?,
  };

  Ok(Some(week))
}
