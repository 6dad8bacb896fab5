//! Time source for everything date-dependent (TTL checks, "today", rest gaps)

use chrono::{DateTime, Local, NaiveDate, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;

  /// Calendar date in the user's local time zone
  fn today(&self) -> NaiveDate;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }

  fn today(&self) -> NaiveDate {
    Local::now().date_naive()
  }
}

/// Frozen clock for tests and replays. `today` is the UTC date of `now`.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
  now: DateTime<Utc>,
}

impl FixedClock {
  pub fn new(now: DateTime<Utc>) -> Self {
    Self { now }
  }

  /// Same clock moved forward (or back) by `delta`
  pub fn advanced(&self, delta: chrono::Duration) -> Self {
    Self { now: self.now + delta }
  }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    self.now
  }

  fn today(&self) -> NaiveDate {
    self.now.date_naive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Duration, TimeZone};

  #[test]
  fn test_fixed_clock_is_frozen() {
    let at = Utc.with_ymd_and_hms(2025, 3, 10, 23, 30, 0).unwrap();
    let clock = FixedClock::new(at);
    assert_eq!(clock.now(), at);
    assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());

    let later = clock.advanced(Duration::hours(1));
    assert_eq!(later.today(), NaiveDate::from_ymd_opt(2025, 3, 11).unwrap());
    assert_eq!(clock.now(), at);
  }
}
