//! Persistence for cached forecast days

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::warn;

use super::ForecastError;
use crate::models::{CacheEntry, WeatherCondition, WeatherDay};

#[async_trait]
pub trait CacheStore: Send + Sync {
  /// Entries for `location` on any of `dates` whose `expires_at` is after `now`
  async fn find_many(
    &self,
    location: &str,
    dates: &[NaiveDate],
    now: DateTime<Utc>,
  ) -> Result<Vec<CacheEntry>, ForecastError>;

  /// Insert or replace on (location, date), all in one transaction
  async fn upsert_batch(&self, entries: &[CacheEntry]) -> Result<(), ForecastError>;

  /// Delete everything expired at `now`; returns rows removed
  async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, ForecastError>;
}

#[derive(Debug, Clone)]
pub struct SqliteCacheStore {
  pool: SqlitePool,
}

impl SqliteCacheStore {
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }
}

fn from_millis(millis: i64, column: &str) -> Result<DateTime<Utc>, ForecastError> {
  DateTime::from_timestamp_millis(millis)
    .ok_or_else(|| ForecastError::Store(format!("Invalid {} timestamp: {}", column, millis)))
}

fn entry_from_row(row: &SqliteRow) -> Result<CacheEntry, ForecastError> {
  let condition_str: String = row.try_get("condition")?;
  let condition = condition_str.parse::<WeatherCondition>().unwrap_or_else(|e| {
    warn!(error = %e, "Unrecognised cached condition, treating as unknown");
    WeatherCondition::Unknown
  });

  Ok(CacheEntry {
    day: WeatherDay {
      location: row.try_get("location")?,
      date: row.try_get("date")?,
      condition,
      temperature: row.try_get("temperature")?,
      feels_like: row.try_get("feels_like")?,
      precipitation: row.try_get("precipitation")?,
      humidity: row.try_get("humidity")?,
      wind_speed: row.try_get("wind_speed")?,
      wind_direction: row.try_get("wind_direction")?,
    },
    cached_at: from_millis(row.try_get("cached_at")?, "cached_at")?,
    expires_at: from_millis(row.try_get("expires_at")?, "expires_at")?,
  })
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
  async fn find_many(
    &self,
    location: &str,
    dates: &[NaiveDate],
    now: DateTime<Utc>,
  ) -> Result<Vec<CacheEntry>, ForecastError> {
    if dates.is_empty() {
      return Ok(Vec::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new(
      r#"
      SELECT location, date, condition, temperature, feels_like, precipitation,
             humidity, wind_speed, wind_direction, cached_at, expires_at
      FROM weather_cache
      WHERE location = "#,
    );
    query.push_bind(location);
    query.push(" AND expires_at > ");
    query.push_bind(now.timestamp_millis());
    query.push(" AND date IN (");
    let mut in_list = query.separated(", ");
    for date in dates {
      in_list.push_bind(*date);
    }
    in_list.push_unseparated(") ORDER BY date");

    let rows = query.build().fetch_all(&self.pool).await?;
    rows.iter().map(entry_from_row).collect()
  }

  async fn upsert_batch(&self, entries: &[CacheEntry]) -> Result<(), ForecastError> {
    if entries.is_empty() {
      return Ok(());
    }

    let mut tx = self.pool.begin().await?;

    for entry in entries {
      let day = &entry.day;
      sqlx::query(
        r#"
        INSERT INTO weather_cache (
          location, date, condition, temperature, feels_like, precipitation,
          humidity, wind_speed, wind_direction, cached_at, expires_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(location, date) DO UPDATE SET
          condition = excluded.condition,
          temperature = excluded.temperature,
          feels_like = excluded.feels_like,
          precipitation = excluded.precipitation,
          humidity = excluded.humidity,
          wind_speed = excluded.wind_speed,
          wind_direction = excluded.wind_direction,
          cached_at = excluded.cached_at,
          expires_at = excluded.expires_at
        "#,
      )
      .bind(&day.location)
      .bind(day.date)
      .bind(day.condition.as_str())
      .bind(day.temperature)
      .bind(day.feels_like)
      .bind(day.precipitation)
      .bind(day.humidity)
      .bind(day.wind_speed)
      .bind(&day.wind_direction)
      .bind(entry.cached_at.timestamp_millis())
      .bind(entry.expires_at.timestamp_millis())
      .execute(&mut *tx)
      .await?;
    }

    tx.commit().await?;
    Ok(())
  }

  async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, ForecastError> {
    let result = sqlx::query("DELETE FROM weather_cache WHERE expires_at <= ?1")
      .bind(now.timestamp_millis())
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected())
  }
}
