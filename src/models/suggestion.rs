use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::run::RunType;

/// A proposed run for one forecast day. Not persisted until accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
  pub date: NaiveDate,
  pub run_type: RunType,
  /// km
  pub distance: f64,
  /// 0-100, ranking only
  pub weather_score: f64,
  /// Which rules passed, failed or fired for this day, in evaluation order
  pub rationale: Vec<String>,
}
