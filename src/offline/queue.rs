//! Durable queue store.
//!
//! Items are keyed by id in the `offline_queue` table. Every write is its own
//! committed statement, so an item is durable as soon as `enqueue` returns.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use super::item::{ItemKind, QueueItem};
use crate::error::GlasError;
use crate::storage::Database;

const SELECT_COLUMNS: &str = "SELECT id, org_id, item_type, target, payload, created_at, \
                              attempts, last_attempt, last_error, dead_lettered \
                              FROM offline_queue";

/// Persistent store of pending queue items.
pub struct OfflineQueue {
    db: Database,
}

impl OfflineQueue {
    /// Create a queue over an existing database connection.
    #[must_use]
    pub const fn with_database(db: Database) -> Self {
        Self { db }
    }

    /// Write or overwrite an item keyed by its id.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::Database` if the item cannot be written.
    pub fn enqueue(&self, item: &QueueItem) -> Result<(), GlasError> {
        let payload = serde_json::to_string(&item.payload)?;

        self.db
            .connection()
            .execute(
                r"INSERT OR REPLACE INTO offline_queue
                  (id, org_id, item_type, target, payload, created_at,
                   attempts, last_attempt, last_error, dead_lettered)
                  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    item.id,
                    item.org_id,
                    item.kind.as_str(),
                    item.table,
                    payload,
                    format_timestamp(item.created_at),
                    item.attempts,
                    item.last_attempt.map(format_timestamp),
                    item.last_error,
                    item.dead_lettered,
                ],
            )
            .map_err(|e| GlasError::Database(format!("Failed to enqueue item {}: {e}", item.id)))?;

        Ok(())
    }

    /// Every stored item, oldest first. Does not remove anything.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::Database` if the query fails.
    pub fn dequeue_all(&self) -> Result<Vec<QueueItem>, GlasError> {
        let conn = self.db.connection();

        let mut stmt = conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY created_at ASC, id ASC"))
            .map_err(|e| GlasError::Database(format!("Failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], row_to_item)
            .map_err(|e| GlasError::Database(format!("Failed to read queue: {e}")))?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row.map_err(|e| GlasError::Database(e.to_string()))?);
        }

        Ok(items)
    }

    /// Delete an item. Returns whether it existed; a missing id is not an error.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::Database` if the delete fails.
    pub fn remove_item(&self, id: &str) -> Result<bool, GlasError> {
        let rows = self
            .db
            .connection()
            .execute("DELETE FROM offline_queue WHERE id = ?1", [id])
            .map_err(|e| GlasError::Database(format!("Failed to remove item {id}: {e}")))?;

        Ok(rows > 0)
    }

    /// Get a single item by id.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::Database` if the query fails.
    pub fn get(&self, id: &str) -> Result<Option<QueueItem>, GlasError> {
        self.db
            .connection()
            .query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), [id], row_to_item)
            .optional()
            .map_err(|e| GlasError::Database(format!("Failed to read item {id}: {e}")))
    }

    /// Number of stored items.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::Database` if the query fails.
    pub fn count(&self) -> Result<usize, GlasError> {
        Ok(self.dequeue_all()?.len())
    }

    /// Record a failed replay. Dead-letters the item once `attempts` reaches
    /// `max_attempts` (0 means never). Returns whether it is now dead-lettered.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::Database` if the update fails.
    pub fn record_failure(
        &self,
        id: &str,
        error: &str,
        max_attempts: u32,
    ) -> Result<bool, GlasError> {
        let conn = self.db.connection();

        conn.execute(
            r"UPDATE offline_queue SET
              attempts = attempts + 1,
              last_attempt = ?1,
              last_error = ?2,
              dead_lettered = CASE WHEN ?3 > 0 AND attempts + 1 >= ?3 THEN 1 ELSE dead_lettered END
              WHERE id = ?4",
            params![format_timestamp(Utc::now()), error, max_attempts, id],
        )
        .map_err(|e| GlasError::Database(format!("Failed to record attempt for {id}: {e}")))?;

        let dead: Option<bool> = conn
            .query_row(
                "SELECT dead_lettered FROM offline_queue WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| GlasError::Database(format!("Failed to read item {id}: {e}")))?;

        Ok(dead.unwrap_or(false))
    }

    /// Clear attempts and the dead-letter flag so the item is retried.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::Database` if the update fails.
    pub fn reset_attempts(&self, id: &str) -> Result<bool, GlasError> {
        let rows = self
            .db
            .connection()
            .execute(
                r"UPDATE offline_queue SET attempts = 0, last_error = NULL, dead_lettered = 0
                  WHERE id = ?1",
                [id],
            )
            .map_err(|e| GlasError::Database(format!("Failed to reset item {id}: {e}")))?;

        Ok(rows > 0)
    }

    /// Reset every dead-lettered item. Returns how many were reset.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::Database` if the update fails.
    pub fn reset_all_dead_letters(&self) -> Result<usize, GlasError> {
        self.db
            .connection()
            .execute(
                r"UPDATE offline_queue SET attempts = 0, last_error = NULL, dead_lettered = 0
                  WHERE dead_lettered = 1",
                [],
            )
            .map_err(|e| GlasError::Database(format!("Failed to reset dead letters: {e}")))
    }

    /// Queue statistics.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::Database` if the query fails.
    pub fn stats(&self) -> Result<QueueStats, GlasError> {
        let items = self.dequeue_all()?;

        let dead_lettered = items.iter().filter(|i| i.dead_lettered).count();
        let oldest_pending = items.iter().map(|i| i.created_at).min();

        Ok(QueueStats {
            pending: items.len(),
            dead_lettered,
            uploads: items.iter().filter(|i| i.kind == ItemKind::Upload).count(),
            oldest_pending,
        })
    }

    /// Remove every item.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::Database` if the delete fails.
    pub fn clear(&self) -> Result<usize, GlasError> {
        self.db
            .connection()
            .execute("DELETE FROM offline_queue", [])
            .map_err(|e| GlasError::Database(format!("Failed to clear queue: {e}")))
    }
}

/// Queue statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Items in the store, dead letters included
    pub pending: usize,
    /// Items that stopped being retried
    pub dead_lettered: usize,
    /// Upload items among `pending`
    pub uploads: usize,
    /// Creation time of the oldest stored item
    pub oldest_pending: Option<DateTime<Utc>>,
}

/// Fixed-width so that `ORDER BY created_at` is chronological.
fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

fn conversion_error(column: usize, e: GlasError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

fn row_to_item(row: &Row<'_>) -> Result<QueueItem, rusqlite::Error> {
    let kind_str: String = row.get(2)?;
    let payload_str: String = row.get(4)?;
    let created_at_str: String = row.get(5)?;
    let last_attempt_str: Option<String> = row.get(7)?;

    let kind = kind_str
        .parse::<ItemKind>()
        .map_err(|e| conversion_error(2, e))?;
    let payload =
        serde_json::from_str(&payload_str).map_err(|e| conversion_error(4, GlasError::Parse(e)))?;
    let created_at = parse_timestamp(&created_at_str).ok_or_else(|| {
        conversion_error(
            5,
            GlasError::Database(format!("invalid timestamp: {created_at_str}")),
        )
    })?;

    Ok(QueueItem {
        id: row.get(0)?,
        org_id: row.get(1)?,
        kind,
        table: row.get(3)?,
        payload,
        created_at,
        attempts: row.get(6)?,
        last_attempt: last_attempt_str.as_deref().and_then(parse_timestamp),
        last_error: row.get(8)?,
        dead_lettered: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{OrgContext, Role};
    use crate::offline::item::{create_queue_item, NewQueueItem};
    use crate::offline::payload::TableRow;
    use serde_json::json;

    fn create_test_queue() -> OfflineQueue {
        OfflineQueue::with_database(Database::open_in_memory().unwrap())
    }

    fn task_item(task: &str) -> QueueItem {
        let ctx = OrgContext::new("org1", Role::Technician);
        let input = NewQueueItem::mutation(&TableRow::task_status(task, "done")).unwrap();
        create_queue_item(&ctx, input)
    }

    #[test]
    fn test_enqueue_and_get() {
        let queue = create_test_queue();
        let item = task_item("t1");

        queue.enqueue(&item).unwrap();

        let loaded = queue.get(&item.id).unwrap().unwrap();
        assert_eq!(loaded.kind, ItemKind::Mutation);
        assert_eq!(loaded.table, "work_tasks");
        assert_eq!(loaded.payload, json!({"id": "t1", "status": "done"}));
        assert_eq!(loaded.org_id, "org1");
    }

    #[test]
    fn test_enqueue_overwrites_same_id() {
        let queue = create_test_queue();
        let mut item = task_item("t1");
        queue.enqueue(&item).unwrap();

        item.payload = json!({"id": "t1", "status": "blocked"});
        queue.enqueue(&item).unwrap();

        let all = queue.dequeue_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].payload["status"], "blocked");
    }

    #[test]
    fn test_dequeue_all_is_read_only_and_ordered() {
        let queue = create_test_queue();
        let first = task_item("t1");
        let mut second = task_item("t2");
        second.created_at = first.created_at + chrono::Duration::seconds(1);

        // Insert out of order
        queue.enqueue(&second).unwrap();
        queue.enqueue(&first).unwrap();

        let items = queue.dequeue_all().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, first.id);
        assert_eq!(items[1].id, second.id);

        // Still there
        assert_eq!(queue.count().unwrap(), 2);
    }

    #[test]
    fn test_store_is_opaque_to_payload() {
        let queue = create_test_queue();
        let ctx = OrgContext::new("org1", Role::Technician);
        let item = create_queue_item(
            &ctx,
            NewQueueItem::raw(ItemKind::Mutation, "anything", json!(["not", "an", "object"])),
        );

        queue.enqueue(&item).unwrap();
        assert_eq!(queue.get(&item.id).unwrap().unwrap().payload, item.payload);
    }

    #[test]
    fn test_remove_item() {
        let queue = create_test_queue();
        let item = task_item("t1");
        queue.enqueue(&item).unwrap();

        assert!(queue.remove_item(&item.id).unwrap());
        assert!(queue.get(&item.id).unwrap().is_none());

        // Removing again is a no-op
        assert!(!queue.remove_item(&item.id).unwrap());
        assert!(!queue.remove_item("never-existed").unwrap());
    }

    #[test]
    fn test_record_failure_dead_letters_at_limit() {
        let queue = create_test_queue();
        let item = task_item("t1");
        queue.enqueue(&item).unwrap();

        assert!(!queue.record_failure(&item.id, "timeout", 2).unwrap());
        let loaded = queue.get(&item.id).unwrap().unwrap();
        assert_eq!(loaded.attempts, 1);
        assert_eq!(loaded.last_error.as_deref(), Some("timeout"));
        assert!(loaded.last_attempt.is_some());

        assert!(queue.record_failure(&item.id, "timeout", 2).unwrap());
        assert!(queue.get(&item.id).unwrap().unwrap().dead_lettered);
    }

    #[test]
    fn test_record_failure_unlimited() {
        let queue = create_test_queue();
        let item = task_item("t1");
        queue.enqueue(&item).unwrap();

        for _ in 0..20 {
            assert!(!queue.record_failure(&item.id, "500", 0).unwrap());
        }
        assert_eq!(queue.get(&item.id).unwrap().unwrap().attempts, 20);
    }

    #[test]
    fn test_reset_dead_letters() {
        let queue = create_test_queue();
        let a = task_item("t1");
        let b = task_item("t2");
        queue.enqueue(&a).unwrap();
        queue.enqueue(&b).unwrap();
        queue.record_failure(&a.id, "gone", 1).unwrap();
        queue.record_failure(&b.id, "gone", 1).unwrap();

        assert!(queue.reset_attempts(&a.id).unwrap());
        let loaded = queue.get(&a.id).unwrap().unwrap();
        assert_eq!(loaded.attempts, 0);
        assert!(!loaded.dead_lettered);
        assert!(loaded.last_error.is_none());

        assert_eq!(queue.reset_all_dead_letters().unwrap(), 1);
        assert_eq!(queue.stats().unwrap().dead_lettered, 0);
    }

    #[test]
    fn test_stats() {
        let queue = create_test_queue();
        assert_eq!(queue.stats().unwrap().pending, 0);
        assert!(queue.stats().unwrap().oldest_pending.is_none());

        let a = task_item("t1");
        queue.enqueue(&a).unwrap();
        queue.enqueue(&task_item("t2")).unwrap();
        queue.record_failure(&a.id, "gone", 1).unwrap();

        let stats = queue.stats().unwrap();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.dead_lettered, 1);
        assert_eq!(stats.uploads, 0);
        assert_eq!(stats.oldest_pending, Some(a.created_at));
    }

    #[test]
    fn test_clear() {
        let queue = create_test_queue();
        queue.enqueue(&task_item("t1")).unwrap();
        queue.enqueue(&task_item("t2")).unwrap();

        assert_eq!(queue.clear().unwrap(), 2);
        assert_eq!(queue.count().unwrap(), 0);
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("queue.db");
        let item = task_item("t1");

        {
            let queue = OfflineQueue::with_database(Database::open_at(&db_path).unwrap());
            queue.enqueue(&item).unwrap();
        }

        let queue = OfflineQueue::with_database(Database::open_at(&db_path).unwrap());
        let items = queue.dequeue_all().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, item.id);
        assert_eq!(items[0].payload, item.payload);
    }

    #[test]
    fn test_broken_store_errors_reach_caller() {
        let queue = create_test_queue();
        let item = task_item("t1");
        queue.enqueue(&item).unwrap();
        queue
            .db
            .connection()
            .execute_batch("DROP TABLE offline_queue;")
            .unwrap();

        assert!(queue.enqueue(&task_item("t2")).unwrap_err().is_store_error());
        assert!(queue.dequeue_all().unwrap_err().is_store_error());
        assert!(queue.remove_item(&item.id).unwrap_err().is_store_error());
        assert!(queue.count().unwrap_err().is_store_error());
    }
}
