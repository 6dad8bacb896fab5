//! Cache-first forecast resolution
//!
//! Resolves N consecutive days for a location. Fresh cached days are served
//! as-is; any gap triggers exactly one provider call for the whole window,
//! and only the missing days from that response are persisted.
//!
//! - TTL is enforced at read time (`expires_at > now`), nothing runs in the background
//! - Writes are one upsert transaction keyed on (location, date), so overlapping
//!   concurrent resolves converge on one row per key
//! - A provider failure fails the whole call; no partial windows

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use super::{CacheStore, ForecastError, ForecastProvider};
use crate::clock::Clock;
use crate::models::{CacheEntry, WeatherDay};

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

pub const CACHE_TTL_MINUTES: i64 = 60;
pub const MAX_FORECAST_DAYS: u32 = 16;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;

/// ---------------------------------------------------------------------------
/// Forecast Cache
/// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ForecastCache {
  provider: Arc<dyn ForecastProvider>,
  store: Arc<dyn CacheStore>,
  clock: Arc<dyn Clock>,
  fetch_timeout: StdDuration,
}

impl ForecastCache {
  pub fn new(
    provider: Arc<dyn ForecastProvider>,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    Self {
      provider,
      store,
      clock,
      fetch_timeout: StdDuration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
    }
  }

  /// Upper bound on a single provider call
  pub fn with_fetch_timeout(mut self, timeout: StdDuration) -> Self {
    self.fetch_timeout = timeout;
    self
  }

  /// Forecast for today through today + days - 1, ascending, one per day
  pub async fn resolve(&self, location: &str, days: u32) -> Result<Vec<WeatherDay>, ForecastError> {
    let location = location.trim();
    if location.is_empty() {
      return Err(ForecastError::InvalidRequest("Location must not be empty".into()));
    }
    if days == 0 || days > MAX_FORECAST_DAYS {
      return Err(ForecastError::InvalidRequest(format!(
        "Forecast days must be between 1 and {}, got {}",
        MAX_FORECAST_DAYS, days
      )));
    }

    let now = self.clock.now();
    let targets = target_dates(self.clock.today(), days);

    let cached = self.store.find_many(location, &targets, now).await?;
    // Stores are not trusted to filter on expiry
    let mut by_date: HashMap<NaiveDate, WeatherDay> = cached
      .into_iter()
      .filter(|entry| entry.is_fresh(now))
      .map(|entry| (entry.day.date, entry.day))
      .collect();

    let missing: HashSet<NaiveDate> = targets
      .iter()
      .filter(|date| !by_date.contains_key(*date))
      .copied()
      .collect();

    if missing.is_empty() {
      debug!(location, days, "Forecast cache hit");
      return Ok(in_date_order(&targets, by_date));
    }

    info!(
      location,
      days,
      missing = missing.len(),
      "Forecast cache miss, fetching from provider"
    );

    let fetched = tokio::time::timeout(self.fetch_timeout, self.provider.fetch(location, days))
      .await
      .map_err(|_| {
        ForecastError::Unavailable(format!(
          "Provider did not respond within {}s",
          self.fetch_timeout.as_secs_f64()
        ))
      })??;

    // Only fill gaps; days the cache already holds win over re-returned ones
    let mut fresh: HashMap<NaiveDate, WeatherDay> = HashMap::with_capacity(missing.len());
    for mut day in fetched {
      if missing.contains(&day.date) && !fresh.contains_key(&day.date) {
        day.location = location.to_string();
        fresh.insert(day.date, day);
      }
    }

    if fresh.len() < missing.len() {
      let mut absent: Vec<NaiveDate> = missing
        .iter()
        .filter(|date| !fresh.contains_key(*date))
        .copied()
        .collect();
      absent.sort();
      let absent: Vec<String> = absent.iter().map(|d| d.to_string()).collect();
      warn!(location, absent = ?absent, "Provider response is missing requested days");
      return Err(ForecastError::Unavailable(format!(
        "Provider returned no forecast for {}",
        absent.join(", ")
      )));
    }

    let ttl = Duration::minutes(CACHE_TTL_MINUTES);
    let mut entries: Vec<CacheEntry> = fresh
      .values()
      .cloned()
      .map(|day| CacheEntry::new(day, now, ttl))
      .collect();
    entries.sort_by_key(|entry| entry.day.date);

    self.store.upsert_batch(&entries).await?;
    info!(location, persisted = entries.len(), "Cached forecast days");

    by_date.extend(fresh);
    Ok(in_date_order(&targets, by_date))
  }

  /// Drop expired rows. Reads already ignore them; this only reclaims space.
  pub async fn purge_expired(&self) -> Result<u64, ForecastError> {
    let removed = self.store.purge_expired(self.clock.now()).await?;
    if removed > 0 {
      debug!(removed, "Purged expired forecast rows");
    }
    Ok(removed)
  }
}

fn target_dates(today: NaiveDate, days: u32) -> Vec<NaiveDate> {
  (0..days as i64).map(|offset| today + Duration::days(offset)).collect()
}

fn in_date_order(targets: &[NaiveDate], mut by_date: HashMap<NaiveDate, WeatherDay>) -> Vec<WeatherDay> {
  targets.iter().filter_map(|date| by_date.remove(date)).collect()
}
