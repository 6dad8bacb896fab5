//! Run ledger: runs placed on the calendar and the history derived from them
//!
//! A date holds at most one run. Completed runs feed the progression guard
//! (longest distance, most recent run) used by the suggestion engine.

use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{AcceptedRun, LastCompletedRun, ProgressionStats, RunType};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("A run is already scheduled on {0}")]
    DateTaken(NaiveDate),

    #[error("Run not found: {0}")]
    NotFound(i64),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Database(e.to_string())
    }
}

fn run_from_row(row: &SqliteRow) -> Result<AcceptedRun, LedgerError> {
    let run_type_str: String = row.try_get("run_type")?;
    let run_type = run_type_str
        .parse::<RunType>()
        .map_err(LedgerError::Database)?;

    Ok(AcceptedRun {
        id: row.try_get("id")?,
        date: row.try_get("date")?,
        run_type,
        distance: row.try_get("distance")?,
        completed: row.try_get("completed")?,
    })
}

/// Every run on the calendar, oldest first
pub async fn accepted_runs(pool: &SqlitePool) -> Result<Vec<AcceptedRun>, LedgerError> {
    let rows = sqlx::query(
        r#"
        SELECT id, date, run_type, distance, completed
        FROM scheduled_runs
        ORDER BY date
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(run_from_row).collect()
}

/// 0.0 when nothing has been completed yet
pub async fn longest_completed_distance(pool: &SqlitePool) -> Result<f64, LedgerError> {
    let longest: Option<f64> =
        sqlx::query_scalar("SELECT MAX(distance) FROM scheduled_runs WHERE completed = 1")
            .fetch_one(pool)
            .await?;

    Ok(longest.unwrap_or(0.0))
}

pub async fn last_completed_run(pool: &SqlitePool) -> Result<Option<LastCompletedRun>, LedgerError> {
    let row = sqlx::query(
        r#"
        SELECT date, distance
        FROM scheduled_runs
        WHERE completed = 1
        ORDER BY date DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(LastCompletedRun {
        date: row.try_get("date")?,
        distance: row.try_get("distance")?,
    }))
}

pub async fn progression_stats(pool: &SqlitePool) -> Result<ProgressionStats, LedgerError> {
    Ok(ProgressionStats {
        longest_completed_distance: longest_completed_distance(pool).await?,
        last_completed_run: last_completed_run(pool).await?,
    })
}

/// Place a run on the calendar. Fails with [`LedgerError::DateTaken`] if the
/// date already holds one.
pub async fn insert_accepted_run(
    pool: &SqlitePool,
    date: NaiveDate,
    run_type: RunType,
    distance: f64,
) -> Result<AcceptedRun, LedgerError> {
    let result = sqlx::query(
        "INSERT INTO scheduled_runs (date, run_type, distance, completed) VALUES (?1, ?2, ?3, 0)",
    )
    .bind(date)
    .bind(run_type.as_str())
    .bind(distance)
    .execute(pool)
    .await;

    match result {
        Ok(done) => Ok(AcceptedRun {
            id: done.last_insert_rowid(),
            date,
            run_type,
            distance,
            completed: false,
        }),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(LedgerError::DateTaken(date))
        }
        Err(e) => Err(e.into()),
    }
}

/// Record that a scheduled run was actually done
pub async fn mark_run_completed(pool: &SqlitePool, id: i64) -> Result<(), LedgerError> {
    let result = sqlx::query("UPDATE scheduled_runs SET completed = 1 WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::NotFound(id));
    }
    Ok(())
}
