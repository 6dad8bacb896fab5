use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::weather::{WeatherCondition, WeatherDay};

// ---------------------------------------------------------------------------
/// Run Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunType {
  LongRun,
  EasyRun,
  TempoRun,
  IntervalRun,
  RecoveryRun,
  Race,
}

impl RunType {
  pub const ALL: [RunType; 6] = [
    Self::LongRun,
    Self::EasyRun,
    Self::TempoRun,
    Self::IntervalRun,
    Self::RecoveryRun,
    Self::Race,
  ];

  /// Tie-break order for selection. RACE is handled separately.
  pub const PRIORITY: [RunType; 5] = [
    Self::LongRun,
    Self::TempoRun,
    Self::IntervalRun,
    Self::EasyRun,
    Self::RecoveryRun,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::LongRun => "LONG_RUN",
      Self::EasyRun => "EASY_RUN",
      Self::TempoRun => "TEMPO_RUN",
      Self::IntervalRun => "INTERVAL_RUN",
      Self::RecoveryRun => "RECOVERY_RUN",
      Self::Race => "RACE",
    }
  }

  /// Sessions that need a rest interval before and after
  pub fn is_demanding(&self) -> bool {
    matches!(self, Self::LongRun | Self::TempoRun | Self::IntervalRun | Self::Race)
  }
}

impl std::fmt::Display for RunType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for RunType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let normalized = s.trim().to_uppercase();
    Self::ALL
      .into_iter()
      .find(|t| t.as_str() == normalized)
      .ok_or_else(|| format!("Unknown run type: {}", s))
  }
}

// ---------------------------------------------------------------------------
/// Weather Tolerances
// ---------------------------------------------------------------------------

/// Weather limits for one run type. `None` means "no limit".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTypePreference {
  pub run_type: RunType,
  pub max_precipitation: Option<f64>,
  pub max_wind_speed: Option<f64>,
  pub min_temperature: Option<f64>,
  pub max_temperature: Option<f64>,
  #[serde(default)]
  pub avoid_conditions: BTreeSet<WeatherCondition>,
}

/// Which limit a forecast day broke
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherViolation {
  Precipitation { value: f64, max: f64 },
  Wind { value: f64, max: f64 },
  TooCold { value: f64, min: f64 },
  TooHot { value: f64, max: f64 },
  AvoidedCondition(WeatherCondition),
}

impl std::fmt::Display for WeatherViolation {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Precipitation { value, max } => write!(f, "precipitation {:.0}% > {:.0}%", value, max),
      Self::Wind { value, max } => write!(f, "wind {:.0} km/h > {:.0} km/h", value, max),
      Self::TooCold { value, min } => write!(f, "temperature {:.1}°C < {:.1}°C", value, min),
      Self::TooHot { value, max } => write!(f, "temperature {:.1}°C > {:.1}°C", value, max),
      Self::AvoidedCondition(c) => write!(f, "condition {} is avoided", c),
    }
  }
}

impl RunTypePreference {
  /// No limits at all; what RACE uses
  pub fn unrestricted(run_type: RunType) -> Self {
    Self {
      run_type,
      max_precipitation: None,
      max_wind_speed: None,
      min_temperature: None,
      max_temperature: None,
      avoid_conditions: BTreeSet::new(),
    }
  }

  /// Built-in tolerances, matching the rows seeded by the initial migration
  pub fn default_for(run_type: RunType) -> Self {
    use WeatherCondition::*;

    let (precip, wind, min_t, max_t, avoid): (f64, f64, f64, f64, &[WeatherCondition]) =
      match run_type {
        RunType::LongRun => (40.0, 30.0, -5.0, 25.0, &[Thunderstorm, HeavyRain, Snow, Sleet]),
        RunType::EasyRun => (60.0, 40.0, -10.0, 30.0, &[Thunderstorm, Sleet]),
        RunType::TempoRun => (30.0, 25.0, 0.0, 24.0, &[Thunderstorm, HeavyRain, Snow, Sleet, Fog]),
        RunType::IntervalRun => (30.0, 25.0, 0.0, 24.0, &[Thunderstorm, HeavyRain, Snow, Sleet]),
        RunType::RecoveryRun => (70.0, 45.0, -10.0, 30.0, &[Thunderstorm]),
        RunType::Race => return Self::unrestricted(RunType::Race),
      };

    Self {
      run_type,
      max_precipitation: Some(precip),
      max_wind_speed: Some(wind),
      min_temperature: Some(min_t),
      max_temperature: Some(max_t),
      avoid_conditions: avoid.iter().copied().collect(),
    }
  }

  /// Whether the day's condition is in the avoid set
  pub fn avoids(&self, condition: WeatherCondition) -> bool {
    self.avoid_conditions.contains(&condition)
  }

  /// Every limit the day breaks; empty means weather-eligible
  pub fn violations(&self, day: &WeatherDay) -> Vec<WeatherViolation> {
    let mut out = Vec::new();

    if let Some(max) = self.max_precipitation {
      if day.precipitation > max {
        out.push(WeatherViolation::Precipitation { value: day.precipitation, max });
      }
    }
    if let Some(max) = self.max_wind_speed {
      if day.wind_speed > max {
        out.push(WeatherViolation::Wind { value: day.wind_speed, max });
      }
    }
    if let Some(min) = self.min_temperature {
      if day.temperature < min {
        out.push(WeatherViolation::TooCold { value: day.temperature, min });
      }
    }
    if let Some(max) = self.max_temperature {
      if day.temperature > max {
        out.push(WeatherViolation::TooHot { value: day.temperature, max });
      }
    }
    if self.avoids(day.condition) {
      out.push(WeatherViolation::AvoidedCondition(day.condition));
    }

    out
  }

  pub fn is_eligible(&self, day: &WeatherDay) -> bool {
    self.violations(day).is_empty()
  }
}

// ---------------------------------------------------------------------------
/// Calendar & History
// ---------------------------------------------------------------------------

/// A run already placed on the calendar (planned or done). Distance in km.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedRun {
  pub id: i64,
  pub date: NaiveDate,
  pub run_type: RunType,
  pub distance: f64,
  pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LastCompletedRun {
  pub date: NaiveDate,
  pub distance: f64,
}

/// History aggregates the progression guard works from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressionStats {
  pub longest_completed_distance: f64,
  pub last_completed_run: Option<LastCompletedRun>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::mock_weather_day;

  #[test]
  fn test_run_type_parse_and_display() {
    for run_type in RunType::ALL {
      assert_eq!(run_type.to_string().parse::<RunType>(), Ok(run_type));
    }
    assert_eq!("long_run".parse::<RunType>(), Ok(RunType::LongRun));
    assert!("JOG".parse::<RunType>().is_err());
  }

  #[test]
  fn test_priority_order() {
    assert_eq!(
      RunType::PRIORITY,
      [
        RunType::LongRun,
        RunType::TempoRun,
        RunType::IntervalRun,
        RunType::EasyRun,
        RunType::RecoveryRun,
      ]
    );
    assert!(!RunType::PRIORITY.contains(&RunType::Race));
  }

  #[test]
  fn test_clear_day_is_eligible_for_every_default() {
    let day = mock_weather_day(0, WeatherCondition::Clear, 15.0, 0.0, 10.0);
    for run_type in RunType::ALL {
      assert!(RunTypePreference::default_for(run_type).is_eligible(&day), "{}", run_type);
    }
  }

  #[test]
  fn test_violations_report_each_broken_limit() {
    let pref = RunTypePreference::default_for(RunType::TempoRun);
    let day = mock_weather_day(0, WeatherCondition::Fog, 30.0, 50.0, 35.0);

    let violations = pref.violations(&day);
    assert_eq!(violations.len(), 4);
    assert!(violations.contains(&WeatherViolation::AvoidedCondition(WeatherCondition::Fog)));
    assert!(violations
      .iter()
      .any(|v| matches!(v, WeatherViolation::TooHot { .. })));
  }

  #[test]
  fn test_limits_are_inclusive() {
    let pref = RunTypePreference::default_for(RunType::LongRun);
    let day = mock_weather_day(0, WeatherCondition::Cloudy, 25.0, 40.0, 30.0);
    assert!(pref.is_eligible(&day));
  }

  #[test]
  fn test_race_is_always_eligible() {
    let race = RunTypePreference::default_for(RunType::Race);
    let storm = mock_weather_day(0, WeatherCondition::Thunderstorm, 40.0, 100.0, 90.0);
    assert!(race.is_eligible(&storm));
  }
}
