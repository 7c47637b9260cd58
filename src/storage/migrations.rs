//! Database migrations for glas-offline.
//!
//! Each migration upgrades the schema by one version. Migrations run
//! automatically when the database is opened.

use rusqlite::Connection;

use crate::error::GlasError;

/// Current schema version.
const CURRENT_VERSION: i32 = 1;

/// Get the current schema version from the database.
///
/// Returns 0 for a new database.
pub fn get_version(conn: &Connection) -> Result<i32, GlasError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| GlasError::Database(format!("Failed to get schema version: {e}")))
}

fn set_version(conn: &Connection, version: i32) -> Result<(), GlasError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .map_err(|e| GlasError::Database(format!("Failed to set schema version: {e}")))
}

/// Run all pending migrations.
pub fn run(conn: &Connection) -> Result<(), GlasError> {
    let current = get_version(conn)?;

    if current >= CURRENT_VERSION {
        return Ok(());
    }

    for version in (current + 1)..=CURRENT_VERSION {
        run_migration(conn, version)?;
        set_version(conn, version)?;
    }

    Ok(())
}

fn run_migration(conn: &Connection, version: i32) -> Result<(), GlasError> {
    match version {
        1 => migrate_v1(conn),
        _ => Err(GlasError::Database(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: offline queue keyed by item id.
fn migrate_v1(conn: &Connection) -> Result<(), GlasError> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS offline_queue (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL,
            item_type TEXT NOT NULL,
            target TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_attempt TEXT,
            last_error TEXT,
            dead_lettered INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_offline_queue_created
        ON offline_queue(created_at);

        CREATE INDEX IF NOT EXISTS idx_offline_queue_org
        ON offline_queue(org_id);
        ",
    )
    .map_err(|e| GlasError::Database(format!("Migration v1 failed: {e}")))
}
