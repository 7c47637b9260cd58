//! `SQLite` database connection and operations.
//!
//! The CLI keeps the database at `Paths::database` (`~/.glas-offline/queue.db`
//! by default); it holds the `offline_queue` table.

use rusqlite::Connection;

use crate::error::GlasError;

use super::migrations;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at a specific path.
    ///
    /// Writes are committed with `synchronous = FULL` so an enqueue survives a
    /// crash immediately after it returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_at(path: &std::path::Path) -> Result<Self, GlasError> {
        let conn = Connection::open(path).map_err(|e| {
            GlasError::Database(format!("Failed to open database {}: {e}", path.display()))
        })?;

        let _mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| GlasError::Database(format!("Failed to set journal mode: {e}")))?;

        conn.execute_batch("PRAGMA synchronous = FULL;")
            .map_err(|e| GlasError::Database(format!("Failed to set synchronous mode: {e}")))?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    /// Open an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_in_memory() -> Result<Self, GlasError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            GlasError::Database(format!("Failed to open in-memory database: {e}"))
        })?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    fn migrate(&self) -> Result<(), GlasError> {
        migrations::run(&self.conn)
    }

    /// Get the current schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be read.
    pub fn schema_version(&self) -> Result<i32, GlasError> {
        migrations::get_version(&self.conn)
    }

    /// Get a reference to the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
