//! SQLite-backed profile store.
//!
//! One row per identity in the `profiles` table. Every upsert runs inside a
//! single `IMMEDIATE` transaction, so a mutator's changes land together or
//! not at all.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::data_dir;
use super::migrations;
use super::profile::{Mutator, ProfileRecord, ProfileStore};
use crate::error::DatabaseError;
use crate::streak::{DayKey, Stage};

const SELECT_PROFILE: &str = "SELECT external_id, linked_secondary_id, current_streak,
        longest_streak, last_active_day, last_active_at, total_activity_count, stage,
        secondary_streak, secondary_last_active_day, created_at, updated_at
     FROM profiles WHERE external_id = ?1";

/// SQLite database holding profile records.
pub struct SqliteProfileStore {
    conn: Mutex<Connection>,
}

impl SqliteProfileStore {
    /// Open the database at `~/.config/codepet/codepet.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_default() -> Result<Self, DatabaseError> {
        let dir = data_dir().map_err(|e| DatabaseError::Unavailable(e.to_string()))?;
        Self::open(dir.join("codepet.db"))
    }

    /// Open (creating if needed) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .map_err(|source| DatabaseError::OpenFailed { path, source })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn
            .lock()
            .map_err(|_| DatabaseError::Unavailable("connection mutex poisoned".into()))
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    async fn get(&self, external_id: &str) -> Result<Option<ProfileRecord>, DatabaseError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(SELECT_PROFILE, params![external_id], row_to_record)
            .optional()?;
        Ok(record)
    }

    async fn upsert(
        &self,
        external_id: &str,
        now: DateTime<Utc>,
        mutator: Mutator,
    ) -> Result<ProfileRecord, DatabaseError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut record = tx
            .query_row(SELECT_PROFILE, params![external_id], row_to_record)
            .optional()?
            .unwrap_or_else(|| ProfileRecord::new(external_id, now));
        mutator(&mut record);

        tx.execute(
            "INSERT INTO profiles (external_id, linked_secondary_id, current_streak,
                longest_streak, last_active_day, last_active_at, total_activity_count, stage,
                secondary_streak, secondary_last_active_day, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(external_id) DO UPDATE SET
                linked_secondary_id = excluded.linked_secondary_id,
                current_streak = excluded.current_streak,
                longest_streak = excluded.longest_streak,
                last_active_day = excluded.last_active_day,
                last_active_at = excluded.last_active_at,
                total_activity_count = excluded.total_activity_count,
                stage = excluded.stage,
                secondary_streak = excluded.secondary_streak,
                secondary_last_active_day = excluded.secondary_last_active_day,
                updated_at = excluded.updated_at",
            params![
                record.external_id,
                record.linked_secondary_id,
                record.current_streak,
                record.longest_streak,
                record.last_active_day.map(|d| d.to_string()),
                record.last_active_at.map(|t| t.to_rfc3339()),
                record.total_activity_count,
                record.stage.as_str(),
                record.secondary_streak,
                record.secondary_last_active_day.map(|d| d.to_string()),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(record)
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ProfileRecord> {
    let stage: String = row.get(7)?;
    Ok(ProfileRecord {
        external_id: row.get(0)?,
        linked_secondary_id: row.get(1)?,
        current_streak: row.get(2)?,
        longest_streak: row.get(3)?,
        last_active_day: parse_opt::<DayKey>(row, 4)?,
        last_active_at: parse_opt_timestamp(row, 5)?,
        total_activity_count: row.get(6)?,
        stage: Stage::parse(&stage).ok_or_else(|| conversion_error(7, format!("bad stage {stage:?}")))?,
        secondary_streak: row.get(8)?,
        secondary_last_active_day: parse_opt::<DayKey>(row, 9)?,
        created_at: parse_timestamp(row, 10)?,
        updated_at: parse_timestamp(row, 11)?,
    })
}

fn parse_opt<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    row.get::<_, Option<String>>(idx)?
        .map(|s| s.parse::<T>().map_err(|e| conversion_error(idx, e.to_string())))
        .transpose()
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn parse_opt_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => parse_timestamp(row, idx).map(Some),
        None => Ok(None),
    }
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        message.into(),
    )
}
