//! Weather-Aware Run Suggestion Engine
//!
//! Pure rule evaluation over a forecast window. Inputs are plain data (forecast,
//! current training week, per-run-type weather tolerances, calendar, history);
//! the output is an ordered list of suggestions, each carrying the rules that
//! fired for it.
//!
//! Evaluation per forecast day:
//! 1. Days with a run already on the calendar are skipped outright
//! 2. Each run type is checked against its weather limits
//! 3. Surviving types are scored 0-100 for weather comfort
//! 4. Weekly budget, per-week quotas and the long-run target shape distances
//! 5. Progression guard caps the long run; rest guard blocks demanding runs
//! 6. Types scoring within a tolerance of the best are tied; priority order picks
//!
//! Infeasibility is never an error, it just means fewer suggestions.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{
  AcceptedRun, ProgressionStats, RunType, RunTypePreference, Suggestion, TrainingWeek, WeatherDay,
};

// ---------------------------------------------------------------------------
/// Engine Configuration
// ---------------------------------------------------------------------------

/// Relative weight of each weather factor in the comfort score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
  pub precipitation: f64,
  pub wind: f64,
  pub temperature: f64,
}

impl Default for ScoreWeights {
  fn default() -> Self {
    Self {
      precipitation: 0.4,
      wind: 0.25,
      temperature: 0.35,
    }
  }
}

/// Planned distance per run type when nothing else bounds it (km)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseDistances {
  pub easy: f64,
  pub tempo: f64,
  pub interval: f64,
  pub recovery: f64,
}

impl Default for BaseDistances {
  fn default() -> Self {
    Self {
      easy: 6.0,
      tempo: 8.0,
      interval: 7.0,
      recovery: 4.0,
    }
  }
}

/// Tunable constants. Every field has a default, so a partial JSON override works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Longest completed run + this = longest suggestable long run (km)
  pub long_run_increment_km: f64,
  /// A long run shorter than this is not worth suggesting (km)
  pub min_long_run_km: f64,
  /// Any other run shorter than this is dropped (km)
  pub min_run_km: f64,
  /// One rest day per this many km of the previous run
  pub rest_km_per_day: f64,
  pub max_rest_days: i64,
  /// Used when no training week covers today (km)
  pub default_weekly_target_km: f64,
  pub default_long_run_km: f64,
  pub base_distances: BaseDistances,
  /// Candidates this close to the best score count as tied; priority decides
  pub score_tie_tolerance: f64,
  /// Comfort centre when a preference only sets one temperature bound (°C)
  pub ideal_temperature: f64,
  /// Distance from the ideal at which temperature comfort reaches zero (°C)
  pub temperature_comfort_band: f64,
  pub weights: ScoreWeights,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      long_run_increment_km: 1.0,
      min_long_run_km: 8.0,
      min_run_km: 3.0,
      rest_km_per_day: 10.0,
      max_rest_days: 3,
      default_weekly_target_km: 25.0,
      default_long_run_km: 10.0,
      base_distances: BaseDistances::default(),
      score_tie_tolerance: 10.0,
      ideal_temperature: 12.0,
      temperature_comfort_band: 15.0,
      weights: ScoreWeights::default(),
    }
  }
}

impl EngineConfig {
  pub fn from_json(json: &str) -> Result<Self, String> {
    serde_json::from_str(json).map_err(|e| format!("Failed to parse engine config: {}", e))
  }

  fn base_distance(&self, run_type: RunType) -> f64 {
    match run_type {
      RunType::EasyRun => self.base_distances.easy,
      RunType::TempoRun => self.base_distances.tempo,
      RunType::IntervalRun => self.base_distances.interval,
      RunType::RecoveryRun => self.base_distances.recovery,
      RunType::LongRun => self.default_long_run_km,
      RunType::Race => self.default_long_run_km,
    }
  }

  /// Whether `score` is close enough to `best` to let priority decide
  fn is_tied(&self, score: f64, best: f64) -> bool {
    best - score <= self.score_tie_tolerance.max(0.0) + 1e-9
  }
}

// ---------------------------------------------------------------------------
/// Scoring & Guards
// ---------------------------------------------------------------------------

/// 1.0 at zero, 0.0 at (or past) the limit
fn headroom(value: f64, limit: Option<f64>) -> f64 {
  match limit {
    None => 1.0,
    Some(max) if max > 0.0 => (1.0 - value / max).clamp(0.0, 1.0),
    Some(_) => {
      if value <= 0.0 {
        1.0
      } else {
        0.0
      }
    }
  }
}

fn temperature_comfort(temp: f64, pref: &RunTypePreference, config: &EngineConfig) -> f64 {
  let (centre, half_width) = match (pref.min_temperature, pref.max_temperature) {
    (None, None) => return 1.0,
    (Some(lo), Some(hi)) if hi > lo => ((lo + hi) / 2.0, (hi - lo) / 2.0),
    (Some(lo), Some(_)) => (lo, config.temperature_comfort_band),
    (Some(lo), None) => (config.ideal_temperature.max(lo), config.temperature_comfort_band),
    (None, Some(hi)) => (config.ideal_temperature.min(hi), config.temperature_comfort_band),
  };
  if half_width <= 0.0 {
    return if temp == centre { 1.0 } else { 0.0 };
  }
  (1.0 - (temp - centre).abs() / half_width).clamp(0.0, 1.0)
}

/// Weather comfort for one run type on one day, 0-100.
///
/// Ranks otherwise-eligible options; it never disqualifies anything.
pub fn weather_score(pref: &RunTypePreference, day: &WeatherDay, config: &EngineConfig) -> f64 {
  let w = &config.weights;
  let total_weight = w.precipitation + w.wind + w.temperature;
  if total_weight <= 0.0 {
    return 100.0;
  }

  let weighted = w.precipitation * headroom(day.precipitation, pref.max_precipitation)
    + w.wind * headroom(day.wind_speed, pref.max_wind_speed)
    + w.temperature * temperature_comfort(day.temperature, pref, config);

  (weighted / total_weight * 1000.0).round() / 10.0
}

/// Full days that must pass after a run of `distance` km before another
/// demanding session
pub fn required_rest_days(distance: f64, config: &EngineConfig) -> i64 {
  if distance <= 0.0 || config.rest_km_per_day <= 0.0 {
    return 0;
  }
  ((distance / config.rest_km_per_day).ceil() as i64).clamp(1, config.max_rest_days.max(1))
}

/// Round down to 100 m so caps are never exceeded by rounding
fn floor_tenth(km: f64) -> f64 {
  ((km + 1e-9) * 10.0).floor() / 10.0
}

/// Sessions a week gets at most one of
fn has_weekly_quota(run_type: RunType) -> bool {
  matches!(
    run_type,
    RunType::LongRun | RunType::TempoRun | RunType::IntervalRun | RunType::Race
  )
}

// ---------------------------------------------------------------------------
/// Evaluation State
// ---------------------------------------------------------------------------

/// Weekly bounds in effect, from the plan or the defaults
#[derive(Debug, Clone)]
struct PlanLimits {
  weekly_target: f64,
  long_run_target: f64,
  note: String,
}

#[derive(Debug, Clone, Copy)]
struct RestEvent {
  date: NaiveDate,
  distance: f64,
}

/// What the suggestion set has consumed so far
#[derive(Debug, Clone)]
struct PlanState {
  remaining_km: f64,
  quotas_used: BTreeSet<RunType>,
  rest_events: Vec<RestEvent>,
  long_run_cap: f64,
}

impl PlanState {
  fn rest_block(&self, date: NaiveDate, config: &EngineConfig) -> Option<String> {
    self.rest_events.iter().find_map(|event| {
      let gap = (date - event.date).num_days().abs();
      let needed = required_rest_days(event.distance, config);
      (gap <= needed).then(|| {
        format!(
          "rest guard, {} day(s) from {:.1} km on {} (needs {} rest day(s))",
          gap, event.distance, event.date, needed
        )
      })
    })
  }

  fn record(&mut self, suggestion: &Suggestion) {
    self.remaining_km = (self.remaining_km - suggestion.distance).max(0.0);
    if has_weekly_quota(suggestion.run_type) {
      self.quotas_used.insert(suggestion.run_type);
    }
    if suggestion.run_type.is_demanding() {
      self.rest_events.push(RestEvent {
        date: suggestion.date,
        distance: suggestion.distance,
      });
    }
  }
}

/// One viable run type for one day
#[derive(Debug, Clone)]
struct Candidate {
  run_type: RunType,
  distance: f64,
  score: f64,
  notes: Vec<String>,
}

/// Preferences by run type, built-in defaults for anything missing
struct PreferenceTable {
  by_type: BTreeMap<RunType, RunTypePreference>,
}

impl PreferenceTable {
  fn new(preferences: &[RunTypePreference]) -> Self {
    let mut by_type: BTreeMap<RunType, RunTypePreference> = RunType::ALL
      .into_iter()
      .map(|t| (t, RunTypePreference::default_for(t)))
      .collect();
    for pref in preferences {
      by_type.insert(pref.run_type, pref.clone());
    }
    Self { by_type }
  }

  fn get(&self, run_type: RunType) -> &RunTypePreference {
    // Every type was seeded in new()
    &self.by_type[&run_type]
  }
}

// ---------------------------------------------------------------------------
/// Suggestion Engine
// ---------------------------------------------------------------------------

/// Stateless apart from its configuration; safe to share across requests.
#[derive(Debug, Clone, Default)]
pub struct SuggestionEngine {
  config: EngineConfig,
}

impl SuggestionEngine {
  pub fn new(config: EngineConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Ordered suggestions for the forecast window. At most one per day, never
  /// on a day that already has a run, possibly none.
  pub fn generate(
    &self,
    forecast: &[WeatherDay],
    training_week: Option<&TrainingWeek>,
    preferences: &[RunTypePreference],
    accepted_runs: &[AcceptedRun],
    progression: &ProgressionStats,
  ) -> Vec<Suggestion> {
    let mut days: Vec<&WeatherDay> = forecast.iter().collect();
    days.sort_by_key(|d| d.date);
    days.dedup_by_key(|d| d.date);

    let (Some(first), Some(last)) = (days.first(), days.last()) else {
      return Vec::new();
    };
    // Quota and budget window: the training week, else the forecast span
    let (span_start, span_end) = (first.date, last.date);
    let in_window = |date: NaiveDate| match training_week {
      Some(week) => week.contains(date),
      None => span_start <= date && date <= span_end,
    };

    let prefs = PreferenceTable::new(preferences);
    let limits = self.plan_limits(training_week);
    let booked: BTreeSet<NaiveDate> = accepted_runs.iter().map(|r| r.date).collect();
    let mut state = self.initial_state(&limits, accepted_runs, progression, in_window);
    let race_date = training_week.and_then(|w| w.race_date);

    let mut suggestions = Vec::new();
    for day in days {
      if booked.contains(&day.date) {
        continue;
      }

      let suggestion = if race_date == Some(day.date) && !state.quotas_used.contains(&RunType::Race) {
        Some(self.race_suggestion(day, training_week, &prefs, &limits, &state))
      } else if state.remaining_km < self.config.min_run_km {
        // Weekly target met; only a race day can still produce something
        None
      } else {
        self.plan_day(day, &prefs, &limits, &state)
      };

      if let Some(suggestion) = suggestion {
        state.record(&suggestion);
        suggestions.push(suggestion);
      }
    }

    suggestions
  }

  fn plan_limits(&self, training_week: Option<&TrainingWeek>) -> PlanLimits {
    match training_week {
      Some(week) => PlanLimits {
        weekly_target: week.weekly_mileage_target.max(0.0),
        long_run_target: week.long_run_target.max(0.0),
        note: format!(
          "plan: week {} ({}), {:.1} km weekly target, {:.1} km long run target",
          week.week_number, week.phase, week.weekly_mileage_target, week.long_run_target
        ),
      },
      None => PlanLimits {
        weekly_target: self.config.default_weekly_target_km,
        long_run_target: self.config.default_long_run_km,
        note: format!(
          "plan: no training week, defaults of {:.1} km weekly and {:.1} km long run",
          self.config.default_weekly_target_km, self.config.default_long_run_km
        ),
      },
    }
  }

  fn initial_state(
    &self,
    limits: &PlanLimits,
    accepted_runs: &[AcceptedRun],
    progression: &ProgressionStats,
    in_window: impl Fn(NaiveDate) -> bool,
  ) -> PlanState {
    let window_runs: Vec<&AcceptedRun> = accepted_runs
      .iter()
      .filter(|r| in_window(r.date))
      .collect();

    let booked_km: f64 = window_runs.iter().map(|r| r.distance.max(0.0)).sum();
    let quotas_used = window_runs
      .iter()
      .map(|r| r.run_type)
      .filter(|t| has_weekly_quota(*t))
      .collect();

    let mut rest_events: Vec<RestEvent> = accepted_runs
      .iter()
      .filter(|r| r.run_type.is_demanding())
      .map(|r| RestEvent {
        date: r.date,
        distance: r.distance,
      })
      .collect();
    if let Some(last) = progression.last_completed_run {
      rest_events.push(RestEvent {
        date: last.date,
        distance: last.distance,
      });
    }

    PlanState {
      remaining_km: (limits.weekly_target - booked_km).max(0.0),
      quotas_used,
      rest_events,
      long_run_cap: progression.longest_completed_distance.max(0.0) + self.config.long_run_increment_km,
    }
  }

  fn race_suggestion(
    &self,
    day: &WeatherDay,
    training_week: Option<&TrainingWeek>,
    prefs: &PreferenceTable,
    limits: &PlanLimits,
    state: &PlanState,
  ) -> Suggestion {
    let distance = training_week
      .and_then(|w| w.race_distance)
      .filter(|d| *d > 0.0)
      .unwrap_or(limits.long_run_target);
    let score = weather_score(prefs.get(RunType::Race), day, &self.config);

    Suggestion {
      date: day.date,
      run_type: RunType::Race,
      distance: floor_tenth(distance),
      weather_score: score,
      rationale: vec![
        limits.note.clone(),
        format!("{:.1} km of weekly budget left", state.remaining_km),
        "RACE scheduled for this date in the training plan".to_string(),
        format!(
          "weather {} {:.0}°C, {:.0}% precipitation, {:.0} km/h wind (score {:.1}); race limits do not apply",
          day.condition, day.temperature, day.precipitation, day.wind_speed, score
        ),
      ],
    }
  }

  fn plan_day(
    &self,
    day: &WeatherDay,
    prefs: &PreferenceTable,
    limits: &PlanLimits,
    state: &PlanState,
  ) -> Option<Suggestion> {
    let mut skipped = Vec::new();
    let mut candidates = Vec::new();

    for run_type in RunType::PRIORITY {
      match self.evaluate(run_type, day, prefs.get(run_type), limits, state) {
        Ok(candidate) => candidates.push(candidate),
        Err(reason) => skipped.push(format!("{} skipped: {}", run_type, reason)),
      }
    }

    let best_score = candidates.iter().map(|c| c.score).reduce(f64::max)?;
    // Candidates are already in priority order
    let chosen = candidates
      .iter()
      .find(|c| self.config.is_tied(c.score, best_score))?
      .clone();

    let mut rationale = vec![
      limits.note.clone(),
      format!("{:.1} km of weekly budget left", state.remaining_km),
    ];
    rationale.extend(skipped);
    rationale.extend(chosen.notes.iter().cloned());
    if chosen.score < best_score {
      let higher: Vec<String> = candidates
        .iter()
        .filter(|c| c.score > chosen.score)
        .map(|c| format!("{} ({:.1})", c.run_type, c.score))
        .collect();
      if !higher.is_empty() {
        rationale.push(format!(
          "{} chosen by priority over {} (within {:.1} points)",
          chosen.run_type,
          higher.join(", "),
          self.config.score_tie_tolerance
        ));
      }
    }

    Some(Suggestion {
      date: day.date,
      run_type: chosen.run_type,
      distance: chosen.distance,
      weather_score: chosen.score,
      rationale,
    })
  }

  /// Either a viable candidate or the reason the type is out for this day
  fn evaluate(
    &self,
    run_type: RunType,
    day: &WeatherDay,
    pref: &RunTypePreference,
    limits: &PlanLimits,
    state: &PlanState,
  ) -> Result<Candidate, String> {
    let violations = pref.violations(day);
    if !violations.is_empty() {
      let reasons: Vec<String> = violations.iter().map(ToString::to_string).collect();
      return Err(format!("weather, {}", reasons.join("; ")));
    }

    if has_weekly_quota(run_type) && state.quotas_used.contains(&run_type) {
      return Err("already planned this week".to_string());
    }

    if run_type.is_demanding() {
      if let Some(reason) = state.rest_block(day.date, &self.config) {
        return Err(reason);
      }
    }

    let score = weather_score(pref, day, &self.config);
    let mut notes = vec![format!(
      "{} weather ok, {} {:.0}°C, {:.0}% precipitation, {:.0} km/h wind (score {:.1})",
      run_type, day.condition, day.temperature, day.precipitation, day.wind_speed, score
    )];

    let mut distance = match run_type {
      RunType::LongRun => {
        if state.long_run_cap < limits.long_run_target {
          notes.push(format!(
            "progression guard, long run capped at {:.1} km (longest completed + {:.1} km)",
            state.long_run_cap, self.config.long_run_increment_km
          ));
        }
        limits.long_run_target.min(state.long_run_cap)
      }
      other => self.config.base_distance(other),
    };

    if distance > state.remaining_km {
      notes.push(format!(
        "distance trimmed from {:.1} km to the remaining weekly budget",
        distance
      ));
      distance = state.remaining_km;
    }
    let distance = floor_tenth(distance);

    let minimum = match run_type {
      RunType::LongRun => self.config.min_long_run_km,
      _ => self.config.min_run_km,
    };
    if distance < minimum {
      return Err(format!(
        "{:.1} km is below the {:.1} km minimum",
        distance, minimum
      ));
    }

    Ok(Candidate {
      run_type,
      distance,
      score,
      notes,
    })
  }
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------


/// Invariants over arbitrary forecasts, calendars and history
///
/// cargo test suggestions::proptests
#[cfg(test)]
mod proptests {
  use super::*;
  use crate::models::{LastCompletedRun, WeatherCondition};
  use crate::test_utils::{default_preferences, mock_training_week, test_today};
  use chrono::Duration;
  use proptest::prelude::*;

  fn arb_day(offset: i64) -> impl Strategy<Value = WeatherDay> {
    (
      0..WeatherCondition::ALL.len(),
      -20.0f64..42.0,
      0.0f64..=100.0,
      0.0f64..70.0,
    )
      .prop_map(move |(c, temperature, precipitation, wind_speed)| WeatherDay {
        location: "Testville".to_string(),
        date: test_today() + Duration::days(offset),
        condition: WeatherCondition::ALL[c],
        temperature,
        feels_like: temperature,
        precipitation,
        humidity: 50.0,
        wind_speed,
        wind_direction: "N".to_string(),
      })
  }

  fn arb_forecast() -> impl Strategy<Value = Vec<WeatherDay>> {
    (1usize..=14).prop_flat_map(|n| (0..n as i64).map(arb_day).collect::<Vec<_>>())
  }

  fn arb_accepted() -> impl Strategy<Value = Vec<AcceptedRun>> {
    proptest::collection::btree_set(-3i64..14, 0..5).prop_flat_map(|offsets| {
      let offsets: Vec<i64> = offsets.into_iter().collect();
      let n = offsets.len();
      (
        Just(offsets),
        proptest::collection::vec((0..RunType::ALL.len(), 2.0f64..25.0, any::<bool>()), n),
      )
        .prop_map(|(offsets, attrs)| {
          offsets
            .into_iter()
            .zip(attrs)
            .enumerate()
            .map(|(i, (offset, (t, distance, completed)))| AcceptedRun {
              id: i as i64 + 1,
              date: test_today() + Duration::days(offset),
              run_type: RunType::ALL[t],
              distance,
              completed,
            })
            .collect()
        })
    })
  }

  fn arb_progression() -> impl Strategy<Value = ProgressionStats> {
    (0.0f64..40.0, proptest::option::of((1i64..10, 1.0f64..40.0))).prop_map(|(longest, last)| {
      ProgressionStats {
        longest_completed_distance: longest,
        last_completed_run: last.map(|(ago, distance)| LastCompletedRun {
          date: test_today() - Duration::days(ago),
          distance,
        }),
      }
    })
  }

  proptest! {
    #[test]
    fn suggestions_respect_hard_rules(
      forecast in arb_forecast(),
      accepted in arb_accepted(),
      progression in arb_progression(),
      weekly in 0.0f64..80.0,
      long_target in 0.0f64..35.0,
      with_week in any::<bool>(),
    ) {
      let engine = SuggestionEngine::default();
      let config = engine.config().clone();
      let prefs = default_preferences();
      let week = mock_training_week(weekly, long_target);
      let week_ref = with_week.then_some(&week);

      let suggestions = engine.generate(&forecast, week_ref, &prefs, &accepted, &progression);

      prop_assert!(suggestions.len() <= forecast.len());
      for pair in suggestions.windows(2) {
        prop_assert!(pair[0].date < pair[1].date);
      }

      let budget = if with_week { weekly } else { config.default_weekly_target_km };
      prop_assert!(suggestions.iter().map(|s| s.distance).sum::<f64>() <= budget + 1e-6);

      for s in &suggestions {
        prop_assert!(accepted.iter().all(|r| r.date != s.date));
        prop_assert!(s.run_type != RunType::Race, "no race date was set");
        prop_assert!(s.distance > 0.0);

        let day = forecast.iter().find(|d| d.date == s.date).unwrap();
        let pref = prefs.iter().find(|p| p.run_type == s.run_type).unwrap();
        prop_assert!(pref.is_eligible(day), "{} on {:?} violates {:?}", s.run_type, day, pref);

        if s.run_type == RunType::LongRun {
          prop_assert!(
            s.distance <= progression.longest_completed_distance + config.long_run_increment_km + 1e-9
          );
        }
      }
    }

    #[test]
    fn race_date_always_produces_race(
      forecast in arb_forecast(),
      progression in arb_progression(),
      race_offset in 0i64..14,
    ) {
      let mut week = mock_training_week(40.0, 16.0);
      let race_date = test_today() + Duration::days(race_offset);
      week.race_date = Some(race_date);

      let suggestions = SuggestionEngine::default().generate(
        &forecast,
        Some(&week),
        &default_preferences(),
        &[],
        &progression,
      );

      let in_window = forecast.iter().any(|d| d.date == race_date);
      let races: Vec<&Suggestion> = suggestions.iter().filter(|s| s.run_type == RunType::Race).collect();
      prop_assert_eq!(races.len(), usize::from(in_window));
      if let Some(race) = races.first() {
        prop_assert_eq!(race.date, race_date);
      }
    }
  }
}
