//! SQLite-backed store, one row per item.

use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::StateStore;
use super::schema::run_migrations;
use crate::domain::ReviewState;
use crate::error::{StoreError, StoreResult};

const SELECT_COLUMNS: &str = r#"
    SELECT item_id, ease_factor, interval_days, repetitions, next_review, last_review,
           total_reviews, correct_streak
    FROM review_states
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the database at `path`, creating it and its parent directory if needed.
    ///
    /// `busy_timeout` bounds how long a write waits on another connection's lock.
    pub fn open(path: &Path, busy_timeout: Duration) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        run_migrations(&conn)?;
        tracing::info!("Opened review state database at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| {
            tracing::error!("Database mutex poisoned - a thread panicked while holding the lock");
            StoreError::Poisoned
        })
    }
}

fn insert_state(conn: &Connection, state: &ReviewState) -> rusqlite::Result<()> {
    conn.execute(
        r#"
    INSERT INTO review_states (item_id, ease_factor, interval_days, repetitions, next_review,
                               last_review, total_reviews, correct_streak)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(item_id) DO UPDATE SET
      ease_factor = excluded.ease_factor,
      interval_days = excluded.interval_days,
      repetitions = excluded.repetitions,
      next_review = excluded.next_review,
      last_review = excluded.last_review,
      total_reviews = excluded.total_reviews,
      correct_streak = excluded.correct_streak
    "#,
        params![
            state.item_id,
            state.ease_factor,
            state.interval,
            state.repetitions,
            state.next_review_at.map(|dt| dt.to_rfc3339()),
            state.last_reviewed_at.map(|dt| dt.to_rfc3339()),
            state.total_reviews,
            state.correct_streak,
        ],
    )?;
    Ok(())
}

/// Text form of a cell, for warnings about values that failed to decode.
fn describe(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Text(t) => format!("'{}'", String::from_utf8_lossy(t)),
        ValueRef::Blob(b) => format!("<{} byte blob>", b.len()),
        other => format!("{:?}", other),
    }
}

fn text_of(value: ValueRef<'_>) -> Option<&str> {
    match value {
        ValueRef::Text(t) => std::str::from_utf8(t).ok().map(str::trim),
        _ => None,
    }
}

/// Real column read leniently. Anything unusable becomes NaN, which
/// `ReviewState::repaired` resets to the default ease factor.
fn real_column(row: &Row, idx: usize, item_id: &str, column: &str) -> rusqlite::Result<f64> {
    let value = row.get_ref(idx)?;
    Ok(match value {
        ValueRef::Real(v) => v,
        ValueRef::Integer(v) => v as f64,
        ValueRef::Null => f64::NAN,
        _ => match text_of(value).and_then(|t| t.parse().ok()) {
            Some(v) => v,
            None => {
                tracing::warn!("Unreadable {} {} for '{}'", column, describe(value), item_id);
                f64::NAN
            }
        },
    })
}

/// Integer column read leniently; unusable values read as 0.
fn int_column(row: &Row, idx: usize, item_id: &str, column: &str) -> rusqlite::Result<i64> {
    let value = row.get_ref(idx)?;
    Ok(match value {
        ValueRef::Integer(v) => v,
        ValueRef::Real(v) if v.is_finite() => v as i64,
        ValueRef::Null => 0,
        _ => match text_of(value).and_then(|t| t.parse().ok()) {
            Some(v) => v,
            None => {
                tracing::warn!("Unreadable {} {} for '{}'", column, describe(value), item_id);
                0
            }
        },
    })
}

fn timestamp_column(row: &Row, idx: usize, item_id: &str, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let value = row.get_ref(idx)?;
    if let ValueRef::Null = value {
        return Ok(None);
    }
    let parsed = text_of(value).and_then(|raw| DateTime::parse_from_rfc3339(raw).ok());
    if parsed.is_none() {
        tracing::warn!("Unparseable {} {} for '{}'", column, describe(value), item_id);
    }
    Ok(parsed.map(|dt| dt.with_timezone(&Utc)))
}

/// Convert a database row to ReviewState.
///
/// Only the key has to decode; other columns fall back to values that
/// `ReviewState::repaired` normalizes.
fn row_to_state(row: &Row) -> rusqlite::Result<ReviewState> {
    let item_id: String = row.get(0)?;

    Ok(ReviewState {
        ease_factor: real_column(row, 1, &item_id, "ease_factor")?,
        interval: int_column(row, 2, &item_id, "interval_days")?,
        repetitions: int_column(row, 3, &item_id, "repetitions")?,
        next_review_at: timestamp_column(row, 4, &item_id, "next_review")?,
        last_reviewed_at: timestamp_column(row, 5, &item_id, "last_review")?,
        total_reviews: int_column(row, 6, &item_id, "total_reviews")?,
        correct_streak: int_column(row, 7, &item_id, "correct_streak")?,
        item_id,
    })
}

/// Drop rows whose key cannot be decoded; real database errors still propagate.
fn skip_undecodable(row: rusqlite::Result<ReviewState>) -> StoreResult<Option<ReviewState>> {
    match row {
        Ok(state) => Ok(Some(state)),
        Err(e @ (rusqlite::Error::InvalidColumnType(..) | rusqlite::Error::FromSqlConversionFailure(..))) => {
            tracing::warn!("Skipping undecodable review state row: {}", e);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

impl StateStore for SqliteStore {
    fn get(&self, item_id: &str) -> StoreResult<Option<ReviewState>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!("{} WHERE item_id = ?1", SELECT_COLUMNS))?;
        match stmt.query_row(params![item_id], row_to_state).optional() {
            Ok(state) => Ok(state),
            Err(e) => skip_undecodable(Err(e)),
        }
    }

    fn set(&self, state: &ReviewState) -> StoreResult<()> {
        let conn = self.lock()?;
        insert_state(&conn, state)?;
        Ok(())
    }

    fn remove(&self, item_id: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM review_states WHERE item_id = ?1", params![item_id])?;
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT item_id FROM review_states ORDER BY item_id")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }

    fn snapshot(&self) -> StoreResult<Vec<ReviewState>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(SELECT_COLUMNS)?;
        let mut states = Vec::new();
        for row in stmt.query_map([], row_to_state)? {
            states.extend(skip_undecodable(row)?);
        }
        Ok(states)
    }

    fn replace_all(&self, states: Vec<ReviewState>) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM review_states", [])?;
        for state in &states {
            insert_state(&tx, state)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM review_states", [])?;
        Ok(())
    }

    fn len(&self) -> StoreResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM review_states", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
