use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One week of the training plan. Distances in km.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingWeek {
  pub week_number: i64,
  /// Named plan segment, e.g. "base", "build", "taper"
  pub phase: String,
  pub week_start: NaiveDate,
  pub week_end: NaiveDate,
  pub weekly_mileage_target: f64,
  pub long_run_target: f64,
  /// The one date RACE may be suggested on
  #[serde(default)]
  pub race_date: Option<NaiveDate>,
  #[serde(default)]
  pub race_distance: Option<f64>,
}

impl TrainingWeek {
  pub fn contains(&self, date: NaiveDate) -> bool {
    self.week_start <= date && date <= self.week_end
  }
}
