//! Database schema migrations for codepet.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 if no version is set (initial database).
pub(crate) fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: primary-source profile table.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS profiles (
            external_id          TEXT PRIMARY KEY,
            current_streak       INTEGER NOT NULL DEFAULT 0,
            longest_streak       INTEGER NOT NULL DEFAULT 0,
            last_active_day      TEXT,
            last_active_at       TEXT,
            total_activity_count INTEGER NOT NULL DEFAULT 0,
            stage                TEXT NOT NULL DEFAULT 'egg',
            created_at           TEXT NOT NULL,
            updated_at           TEXT NOT NULL
        );",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()?;
    tracing::debug!("applied migration v1");
    Ok(())
}

/// Migration v2: secondary-source link and mirror streak columns.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "ALTER TABLE profiles ADD COLUMN linked_secondary_id TEXT;
         ALTER TABLE profiles ADD COLUMN secondary_streak INTEGER NOT NULL DEFAULT 0;
         ALTER TABLE profiles ADD COLUMN secondary_last_active_day TEXT;",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()?;
    tracing::debug!("applied migration v2");
    Ok(())
}
