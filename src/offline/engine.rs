//! Sync engine for replaying queued items.
//!
//! A pass reads a snapshot of the queue and replays each item once, in store
//! order. Successes are removed immediately; failures stay queued for the next
//! pass and never abort their siblings. Only store errors end a pass early.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::item::{ItemKind, QueueItem};
use super::queue::OfflineQueue;
use crate::config::{BackendConfig, SyncConfig};
use crate::core::OrgContext;
use crate::error::GlasError;
use crate::remote::RemoteBackend;

/// Configuration for the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bucket uploads are written to.
    pub bucket: String,
    /// Failed replays before an item is dead-lettered; 0 retries forever.
    pub max_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bucket: "org-files".to_string(),
            max_attempts: 10,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn from_settings(backend: &BackendConfig, sync: &SyncConfig) -> Self {
        Self {
            bucket: backend.bucket.clone(),
            max_attempts: sync.max_attempts,
        }
    }
}

/// What happened to one item during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Replayed and removed from the queue.
    Synced,
    /// Replay failed; the item stays queued.
    Failed,
    /// Replay failed and the item reached the attempt limit.
    DeadLettered,
    /// Not attempted: dead-lettered earlier or owned by another org.
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Synced => "synced",
            Self::Failed => "failed",
            Self::DeadLettered => "dead-lettered",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Result of replaying a single item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemResult {
    pub id: String,
    pub kind: ItemKind,
    pub table: String,
    pub outcome: Outcome,
    pub error: Option<String>,
}

/// Result of one sync pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
    pub dead_lettered: usize,
    pub skipped: usize,
    pub results: Vec<ItemResult>,
}

impl SyncReport {
    /// Add a result.
    pub fn add(&mut self, result: ItemResult) {
        match result.outcome {
            Outcome::Synced => self.synced += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::DeadLettered => self.dead_lettered += 1,
            Outcome::Skipped => self.skipped += 1,
        }
        self.results.push(result);
    }

    /// Items actually replayed this pass.
    #[must_use]
    pub const fn attempted(&self) -> usize {
        self.synced + self.failed + self.dead_lettered
    }

    /// True when every attempted item was synced.
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.dead_lettered == 0
    }
}

/// Replays queue items against a remote backend.
pub struct SyncEngine<'a> {
    queue: &'a OfflineQueue,
    backend: &'a dyn RemoteBackend,
    config: EngineConfig,
}

impl<'a> SyncEngine<'a> {
    #[must_use]
    pub fn new(queue: &'a OfflineQueue, backend: &'a dyn RemoteBackend) -> Self {
        Self {
            queue,
            backend,
            config: EngineConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_config(
        queue: &'a OfflineQueue,
        backend: &'a dyn RemoteBackend,
        config: EngineConfig,
    ) -> Self {
        Self {
            queue,
            backend,
            config,
        }
    }

    /// Run one pass over the current snapshot of `ctx`'s items.
    ///
    /// # Errors
    ///
    /// Returns an error only if the queue store fails. Replay failures are
    /// recorded on the item and reported in the returned [`SyncReport`].
    pub fn process_queue(&self, ctx: &OrgContext) -> Result<SyncReport, GlasError> {
        let snapshot = self.queue.dequeue_all()?;
        let mut report = SyncReport::default();

        debug!(org = %ctx.org_id, items = snapshot.len(), "starting sync pass");

        for item in snapshot {
            let result = self.process_item(ctx, &item)?;
            report.add(result);
        }

        info!(
            org = %ctx.org_id,
            synced = report.synced,
            failed = report.failed,
            dead_lettered = report.dead_lettered,
            skipped = report.skipped,
            "sync pass finished"
        );

        Ok(report)
    }

    fn process_item(&self, ctx: &OrgContext, item: &QueueItem) -> Result<ItemResult, GlasError> {
        let result = |outcome: Outcome, error: Option<String>| ItemResult {
            id: item.id.clone(),
            kind: item.kind,
            table: item.table.clone(),
            outcome,
            error,
        };

        if item.org_id != ctx.org_id || item.dead_lettered {
            return Ok(result(Outcome::Skipped, None));
        }

        match self.replay(item) {
            Ok(()) => {
                self.queue.remove_item(&item.id)?;
                debug!(id = %item.id, kind = %item.kind, table = %item.table, "item synced");
                Ok(result(Outcome::Synced, None))
            },
            Err(e) => {
                let message = e.to_string();
                warn!(
                    id = %item.id,
                    kind = %item.kind,
                    table = %item.table,
                    attempt = item.attempts + 1,
                    error = %message,
                    "queue item failed"
                );

                let dead = self
                    .queue
                    .record_failure(&item.id, &message, self.config.max_attempts)?;
                if dead {
                    error!(
                        id = %item.id,
                        table = %item.table,
                        attempts = item.attempts + 1,
                        "queue item dead-lettered"
                    );
                    Ok(result(Outcome::DeadLettered, Some(message)))
                } else {
                    Ok(result(Outcome::Failed, Some(message)))
                }
            },
        }
    }

    /// Replay one item against the backend.
    fn replay(&self, item: &QueueItem) -> Result<(), GlasError> {
        match item.kind {
            ItemKind::Upload => {
                let upload = item.upload_payload()?;
                upload.validate()?;
                let bytes = upload.decode_bytes()?;
                self.backend
                    .upload(&self.config.bucket, &upload.path, &bytes, &upload.content_type)
            },
            ItemKind::Mutation => {
                let row = mutation_row(item)?;
                self.backend.upsert(&item.table, row)
            },
        }
    }
}

/// The stored payload, provided it is an object with a string `id` to upsert on.
fn mutation_row(item: &QueueItem) -> Result<&Value, GlasError> {
    if !item.payload.is_object() {
        return Err(GlasError::InvalidPayload(format!(
            "mutation {} on {} is not an object",
            item.id, item.table
        )));
    }
    match item.row_id() {
        Some(id) if !id.trim().is_empty() => Ok(&item.payload),
        _ => Err(GlasError::InvalidPayload(format!(
            "mutation {} on {} has no row id",
            item.id, item.table
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Role;
    use crate::offline::item::{create_queue_item, NewQueueItem};
    use crate::offline::payload::{TableRow, UploadPayload};
    use crate::remote::{BlobStore, MemoryBackend, RowStore};
    use crate::storage::Database;
    use mockall::mock;
    use serde_json::json;

    mock! {
        pub Backend {}

        impl RowStore for Backend {
            fn upsert(&self, table: &str, row: &Value) -> Result<(), GlasError>;
        }

        impl BlobStore for Backend {
            fn upload(
                &self,
                bucket: &str,
                path: &str,
                bytes: &[u8],
                content_type: &str,
            ) -> Result<(), GlasError>;
        }
    }

    fn ctx() -> OrgContext {
        OrgContext::new("org1", Role::Technician)
    }

    fn queue() -> OfflineQueue {
        OfflineQueue::with_database(Database::open_in_memory().unwrap())
    }

    fn enqueue(queue: &OfflineQueue, input: NewQueueItem) -> QueueItem {
        let item = create_queue_item(&ctx(), input);
        queue.enqueue(&item).unwrap();
        item
    }

    fn task(id: &str, status: &str) -> NewQueueItem {
        NewQueueItem::mutation(&TableRow::task_status(id, status)).unwrap()
    }

    #[test]
    fn test_sync_report_counts() {
        let mut report = SyncReport::default();
        for outcome in [Outcome::Synced, Outcome::Failed, Outcome::Skipped, Outcome::Synced] {
            report.add(ItemResult {
                id: "x".to_string(),
                kind: ItemKind::Mutation,
                table: "work_tasks".to_string(),
                outcome,
                error: None,
            });
        }
        assert_eq!(report.synced, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.attempted(), 3);
        assert!(!report.all_succeeded());
    }

    #[test]
    fn test_mutation_upserts_and_removes() {
        let queue = queue();
        let backend = MemoryBackend::new();
        enqueue(&queue, task("t1", "done"));

        let report = SyncEngine::new(&queue, &backend).process_queue(&ctx()).unwrap();

        assert_eq!(report.synced, 1);
        assert!(report.all_succeeded());
        assert_eq!(backend.row("work_tasks", "t1").unwrap()["status"], "done");
        assert_eq!(queue.count().unwrap(), 0);
    }

    #[test]
    fn test_partial_failure_isolation() {
        let queue = queue();
        let backend = MemoryBackend::new();
        let first = create_queue_item(&ctx(), task("t1", "done"));
        let mut second = create_queue_item(&ctx(), task("t2", "done"));
        let mut third = create_queue_item(&ctx(), task("t3", "done"));
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        third.created_at = first.created_at + chrono::Duration::seconds(2);
        for item in [&first, &second, &third] {
            queue.enqueue(item).unwrap();
        }
        backend.reject_row("t2");

        let report = SyncEngine::new(&queue, &backend).process_queue(&ctx()).unwrap();

        assert_eq!(report.synced, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.results[1].outcome, Outcome::Failed);

        let remaining = queue.dequeue_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, second.id);
        assert_eq!(remaining[0].attempts, 1);
        assert!(remaining[0].last_error.as_deref().unwrap().contains("rejected"));
        assert!(backend.row("work_tasks", "t3").is_some());
    }

    #[test]
    fn test_second_pass_is_noop() {
        let queue = queue();
        let backend = MemoryBackend::new();
        enqueue(&queue, task("t1", "done"));
        let engine = SyncEngine::new(&queue, &backend);

        engine.process_queue(&ctx()).unwrap();
        let report = engine.process_queue(&ctx()).unwrap();

        assert_eq!(report.attempted(), 0);
        assert_eq!(backend.calls(), 1);
        assert_eq!(backend.row_count("work_tasks"), 1);
    }

    #[test]
    fn test_duplicate_mutations_converge_to_one_row() {
        let queue = queue();
        let backend = MemoryBackend::new();
        enqueue(&queue, task("t1", "started"));
        enqueue(&queue, task("t1", "done"));

        SyncEngine::new(&queue, &backend).process_queue(&ctx()).unwrap();

        assert_eq!(backend.row_count("work_tasks"), 1);
        assert_eq!(queue.count().unwrap(), 0);
    }

    #[test]
    fn test_upload_then_dependent_mutation() {
        let queue = queue();
        let backend = MemoryBackend::new();
        let upload = UploadPayload::from_bytes("org1/x.png", b"\x89PNG", "image/png");
        let first = enqueue(&queue, NewQueueItem::upload("work_photos", &upload).unwrap());
        let mut photo = create_queue_item(
            &ctx(),
            NewQueueItem::mutation(&TableRow::photo("wo1", "org1/x.png", "voor")).unwrap(),
        );
        photo.created_at = first.created_at + chrono::Duration::milliseconds(1);
        queue.enqueue(&photo).unwrap();

        let config = EngineConfig {
            bucket: "org-files".to_string(),
            max_attempts: 3,
        };
        let report = SyncEngine::with_config(&queue, &backend, config)
            .process_queue(&ctx())
            .unwrap();

        assert_eq!(report.synced, 2);
        let blob = backend.blob("org-files", "org1/x.png").unwrap();
        assert_eq!(blob.bytes, b"\x89PNG".to_vec());
        assert_eq!(blob.content_type, "image/png");

        let row_id = photo.row_id().unwrap();
        assert_eq!(backend.row("work_photos", row_id).unwrap()["storage_path"], "org1/x.png");
        assert_eq!(queue.count().unwrap(), 0);
    }

    #[test]
    fn test_malformed_payload_stays_queued() {
        let queue = queue();
        let backend = MemoryBackend::new();
        let bad_upload = enqueue(
            &queue,
            NewQueueItem::raw(ItemKind::Upload, "work_photos", json!({"path": "org1/x.png"})),
        );
        let no_id = enqueue(
            &queue,
            NewQueueItem::raw(ItemKind::Mutation, "customers", json!({"name": "Jansen"})),
        );
        let good = enqueue(&queue, task("t1", "done"));

        let report = SyncEngine::new(&queue, &backend).process_queue(&ctx()).unwrap();

        assert_eq!(report.synced, 1);
        assert_eq!(report.failed, 2);
        assert!(queue.get(&bad_upload.id).unwrap().is_some());
        assert!(queue.get(&no_id.id).unwrap().is_some());
        assert!(queue.get(&good.id).unwrap().is_none());
        // Nothing reached the backend for the malformed items
        assert_eq!(backend.calls(), 1);
    }

    #[test]
    fn test_untyped_mutation_with_id_is_replayed() {
        let queue = queue();
        let backend = MemoryBackend::new();
        enqueue(
            &queue,
            NewQueueItem::raw(ItemKind::Mutation, "customers", json!({"id": "c1", "name": "Jansen"})),
        );

        SyncEngine::new(&queue, &backend).process_queue(&ctx()).unwrap();
        assert_eq!(backend.row("customers", "c1").unwrap()["name"], "Jansen");
    }

    #[test]
    fn test_dead_letter_after_max_attempts() {
        let queue = queue();
        let backend = MemoryBackend::new();
        backend.reject_row("t1");
        let item = enqueue(&queue, task("t1", "done"));
        let config = EngineConfig {
            max_attempts: 2,
            ..EngineConfig::default()
        };
        let engine = SyncEngine::with_config(&queue, &backend, config);

        assert_eq!(engine.process_queue(&ctx()).unwrap().failed, 1);
        assert_eq!(engine.process_queue(&ctx()).unwrap().dead_lettered, 1);

        // Now skipped without touching the backend
        let calls = backend.calls();
        let report = engine.process_queue(&ctx()).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(backend.calls(), calls);

        let stored = queue.get(&item.id).unwrap().unwrap();
        assert!(stored.dead_lettered);
        assert_eq!(stored.attempts, 2);
    }

    #[test]
    fn test_other_org_items_untouched() {
        let queue = queue();
        let backend = MemoryBackend::new();
        let other = create_queue_item(&OrgContext::new("org2", Role::Technician), task("t9", "done"));
        queue.enqueue(&other).unwrap();

        let report = SyncEngine::new(&queue, &backend).process_queue(&ctx()).unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(backend.calls(), 0);
        assert!(queue.get(&other.id).unwrap().is_some());
    }

    #[test]
    fn test_upload_uses_configured_bucket_with_mock() {
        let queue = queue();
        let upload = UploadPayload::from_bytes("org1/sig.png", b"sig", "image/png");
        enqueue(&queue, NewQueueItem::upload("work_signatures", &upload).unwrap());

        let mut backend = MockBackend::new();
        backend
            .expect_upload()
            .times(1)
            .returning(|bucket, path, bytes, content_type| {
                assert_eq!(bucket, "signatures");
                assert_eq!(path, "org1/sig.png");
                assert_eq!(bytes, &b"sig"[..]);
                assert_eq!(content_type, "image/png");
                Ok(())
            });
        backend.expect_upsert().never();

        let config = EngineConfig {
            bucket: "signatures".to_string(),
            max_attempts: 0,
        };
        let report = SyncEngine::with_config(&queue, &backend, config)
            .process_queue(&ctx())
            .unwrap();
        assert_eq!(report.synced, 1);
    }

    #[test]
    fn test_transport_failure_is_not_a_pass_error() {
        let queue = queue();
        enqueue(&queue, task("t1", "done"));

        let mut backend = MockBackend::new();
        backend
            .expect_upsert()
            .times(1)
            .returning(|_, _| Err(GlasError::transport("timed out")));

        let report = SyncEngine::new(&queue, &backend).process_queue(&ctx()).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.results[0].error.as_deref(), Some("Remote error: timed out"));
        assert_eq!(queue.count().unwrap(), 1);
    }

    #[test]
    fn test_mutation_without_row_id_never_reaches_backend() {
        let queue = queue();
        let backend = MemoryBackend::new();
        let item = enqueue(
            &queue,
            NewQueueItem::raw(
                ItemKind::Mutation,
                "work_photos",
                json!({"work_order_id": "wo1", "storage_path": "org1/x.png", "description": "voor"}),
            ),
        );
        let engine = SyncEngine::new(&queue, &backend);

        assert_eq!(engine.process_queue(&ctx()).unwrap().failed, 1);
        queue.enqueue(&item).unwrap();
        assert_eq!(engine.process_queue(&ctx()).unwrap().failed, 1);

        assert_eq!(backend.row_count("work_photos"), 0);
        assert_eq!(backend.calls(), 0);
        let stored = queue.get(&item.id).unwrap().unwrap();
        assert!(stored.last_error.unwrap().contains("no row id"));
    }

    #[test]
    fn test_replaying_same_item_twice_keeps_one_row() {
        let queue = queue();
        let backend = MemoryBackend::new();
        let item = enqueue(
            &queue,
            NewQueueItem::mutation(&TableRow::photo("wo1", "org1/x.png", "voor")).unwrap(),
        );
        let engine = SyncEngine::new(&queue, &backend);

        engine.process_queue(&ctx()).unwrap();
        // Upsert landed but the removal was lost
        queue.enqueue(&item).unwrap();
        assert_eq!(engine.process_queue(&ctx()).unwrap().synced, 1);

        assert_eq!(backend.row_count("work_photos"), 1);
        assert_eq!(queue.count().unwrap(), 0);
    }

    #[test]
    fn test_payload_is_upserted_unchanged() {
        let queue = queue();
        let backend = MemoryBackend::new();
        enqueue(
            &queue,
            NewQueueItem::raw(
                ItemKind::Mutation,
                "work_tasks",
                json!({"id": "t1", "status": "done", "completed_at": "2026-10-18T09:00:00Z"}),
            ),
        );

        SyncEngine::new(&queue, &backend).process_queue(&ctx()).unwrap();

        let row = backend.row("work_tasks", "t1").unwrap();
        assert_eq!(row["status"], "done");
        assert_eq!(row["completed_at"], "2026-10-18T09:00:00Z");
    }

    #[test]
    fn test_partial_payload_merges_into_existing_row() {
        let queue = queue();
        let backend = MemoryBackend::new();
        backend
            .upsert(
                "work_checklist_items",
                &json!({"id": "c1", "work_order_id": "wo1", "label": "Kit", "is_checked": false}),
            )
            .unwrap();
        enqueue(
            &queue,
            NewQueueItem::raw(
                ItemKind::Mutation,
                "work_checklist_items",
                json!({"id": "c1", "label": "Kit", "is_checked": true}),
            ),
        );

        let report = SyncEngine::new(&queue, &backend).process_queue(&ctx()).unwrap();

        assert_eq!(report.synced, 1);
        let row = backend.row("work_checklist_items", "c1").unwrap();
        assert_eq!(row["is_checked"], true);
        assert_eq!(row["work_order_id"], "wo1");
    }

    #[test]
    fn test_non_object_mutation_fails() {
        let queue = queue();
        let backend = MemoryBackend::new();
        enqueue(&queue, NewQueueItem::raw(ItemKind::Mutation, "work_tasks", json!(["t1"])));

        let report = SyncEngine::new(&queue, &backend).process_queue(&ctx()).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn test_store_failure_mid_pass_propagates() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("queue.db");
        let queue = OfflineQueue::with_database(Database::open_at(&path).unwrap());
        enqueue(&queue, task("t1", "done"));
        let other = Database::open_at(&path).unwrap();

        let mut backend = MockBackend::new();
        backend.expect_upsert().times(1).returning(move |_, _| {
            other
                .connection()
                .execute_batch("DROP TABLE offline_queue;")
                .unwrap();
            Ok(())
        });

        let err = SyncEngine::new(&queue, &backend)
            .process_queue(&ctx())
            .unwrap_err();
        assert!(err.is_store_error());
    }

    #[test]
    fn test_store_failure_before_pass_propagates() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("queue.db");
        let queue = OfflineQueue::with_database(Database::open_at(&path).unwrap());
        Database::open_at(&path)
            .unwrap()
            .connection()
            .execute_batch("DROP TABLE offline_queue;")
            .unwrap();

        let backend = MemoryBackend::new();
        let err = SyncEngine::new(&queue, &backend)
            .process_queue(&ctx())
            .unwrap_err();
        assert!(err.is_store_error());
        assert_eq!(backend.calls(), 0);
    }
}
