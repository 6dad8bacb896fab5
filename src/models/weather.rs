use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// ---------------------------------------------------------------------------
/// Weather Conditions
/// ---------------------------------------------------------------------------

/// Closed set of weather categories the planner reasons about.
///
/// Provider descriptions ("Patchy light drizzle", "Thundery outbreaks possible")
/// are folded into one of these by [`WeatherCondition::classify`]; nothing else
/// in the crate inspects raw description text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
  Clear,
  PartlyCloudy,
  Cloudy,
  Fog,
  Drizzle,
  Rain,
  HeavyRain,
  Thunderstorm,
  Snow,
  Sleet,
  Windy,
  Unknown,
}

impl WeatherCondition {
  pub const ALL: [WeatherCondition; 12] = [
    Self::Clear,
    Self::PartlyCloudy,
    Self::Cloudy,
    Self::Fog,
    Self::Drizzle,
    Self::Rain,
    Self::HeavyRain,
    Self::Thunderstorm,
    Self::Snow,
    Self::Sleet,
    Self::Windy,
    Self::Unknown,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Clear => "clear",
      Self::PartlyCloudy => "partly_cloudy",
      Self::Cloudy => "cloudy",
      Self::Fog => "fog",
      Self::Drizzle => "drizzle",
      Self::Rain => "rain",
      Self::HeavyRain => "heavy_rain",
      Self::Thunderstorm => "thunderstorm",
      Self::Snow => "snow",
      Self::Sleet => "sleet",
      Self::Windy => "windy",
      Self::Unknown => "unknown",
    }
  }

  /// Map a free-text provider description onto a category.
  ///
  /// Order matters: "freezing drizzle" is sleet, "heavy rain" is not plain rain,
  /// "partly cloudy" is not cloudy.
  pub fn classify(description: &str) -> Self {
    let text = description.trim().to_lowercase();
    let has = |needle: &str| text.contains(needle);

    if has("thunder") {
      Self::Thunderstorm
    } else if has("sleet") || has("ice pellets") || has("freezing") {
      Self::Sleet
    } else if has("snow") || has("blizzard") {
      Self::Snow
    } else if has("heavy rain") || has("torrential") {
      Self::HeavyRain
    } else if has("drizzle") {
      Self::Drizzle
    } else if has("rain") || has("shower") {
      Self::Rain
    } else if has("fog") || has("mist") {
      Self::Fog
    } else if has("wind") || has("gale") {
      Self::Windy
    } else if has("partly") {
      Self::PartlyCloudy
    } else if has("cloud") || has("overcast") {
      Self::Cloudy
    } else if has("clear") || has("sunny") {
      Self::Clear
    } else {
      Self::Unknown
    }
  }
}

impl std::fmt::Display for WeatherCondition {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Case-insensitive parse of a canonical name. Spaces and hyphens are
/// accepted in place of underscores ("Heavy Rain", "partly-cloudy").
impl std::str::FromStr for WeatherCondition {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
    Self::ALL
      .into_iter()
      .find(|c| c.as_str() == normalized)
      .ok_or_else(|| format!("Unknown weather condition: {}", s))
  }
}

/// ---------------------------------------------------------------------------
/// Daily Forecast Snapshot
/// ---------------------------------------------------------------------------

/// One day of forecast for one location. Temperatures in °C, wind in km/h,
/// precipitation and humidity in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherDay {
  pub location: String,
  pub date: NaiveDate,
  pub condition: WeatherCondition,
  pub temperature: f64,
  pub feels_like: f64,
  pub precipitation: f64,
  pub humidity: f64,
  pub wind_speed: f64,
  pub wind_direction: String,
}

/// A persisted forecast day with its freshness window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
  pub day: WeatherDay,
  pub cached_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
  pub fn new(day: WeatherDay, cached_at: DateTime<Utc>, ttl: chrono::Duration) -> Self {
    Self {
      day,
      cached_at,
      expires_at: cached_at + ttl,
    }
  }

  pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
    self.expires_at > now
  }
}
