//! Queue items and the factory that stamps them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::payload::{TableRow, UploadPayload};
use crate::core::OrgContext;
use crate::error::GlasError;

/// What replaying an item does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Row upsert against a named table.
    Mutation,
    /// Blob write to a storage path.
    Upload,
}

impl ItemKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mutation => "mutation",
            Self::Upload => "upload",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = GlasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mutation" => Ok(Self::Mutation),
            "upload" => Ok(Self::Upload),
            other => Err(GlasError::InvalidPayload(format!("Unknown item type: {other}"))),
        }
    }
}

/// A pending write persisted until it is replayed or discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Store key and replay idempotency key.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    /// Target table, or the owning table for uploads.
    pub table: String,
    /// Opaque to the store; interpreted at replay time.
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    /// Organization that enqueued the item.
    pub org_id: String,
    /// Failed replay attempts so far.
    pub attempts: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Set once `attempts` reaches the configured limit; skipped by sync.
    pub dead_lettered: bool,
}

impl QueueItem {
    /// Decode the payload of an upload item.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::InvalidPayload` if the item is not an upload or the
    /// payload lacks `path`, `fileData` or `contentType`.
    pub fn upload_payload(&self) -> Result<UploadPayload, GlasError> {
        if self.kind != ItemKind::Upload {
            return Err(GlasError::InvalidPayload(format!(
                "item {} is a {}, not an upload",
                self.id, self.kind
            )));
        }
        serde_json::from_value(self.payload.clone())
            .map_err(|e| GlasError::InvalidPayload(format!("upload {}: {e}", self.id)))
    }

    /// The row id a mutation upserts on, if the payload has one.
    #[must_use]
    pub fn row_id(&self) -> Option<&str> {
        self.payload.get("id").and_then(Value::as_str)
    }
}

/// Caller-supplied part of a queue item, before the factory stamps it.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQueueItem {
    pub kind: ItemKind,
    pub table: String,
    pub payload: Value,
}

impl NewQueueItem {
    /// Upsert of a typed row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row fails validation or cannot be serialized.
    pub fn mutation(row: &TableRow) -> Result<Self, GlasError> {
        row.validate()?;
        Ok(Self {
            kind: ItemKind::Mutation,
            table: row.table().to_string(),
            payload: row.to_value()?,
        })
    }

    /// Blob upload owned by `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails validation or cannot be serialized.
    pub fn upload(table: impl Into<String>, upload: &UploadPayload) -> Result<Self, GlasError> {
        upload.validate()?;
        Ok(Self {
            kind: ItemKind::Upload,
            table: table.into(),
            payload: serde_json::to_value(upload)?,
        })
    }

    /// Untyped item; the payload is checked only at replay.
    #[must_use]
    pub fn raw(kind: ItemKind, table: impl Into<String>, payload: Value) -> Self {
        Self {
            kind,
            table: table.into(),
            payload,
        }
    }
}

/// Stamp a new item with a fresh id, the current time and the caller's org.
#[must_use]
pub fn create_queue_item(ctx: &OrgContext, input: NewQueueItem) -> QueueItem {
    QueueItem {
        id: Uuid::new_v4().to_string(),
        kind: input.kind,
        table: input.table,
        payload: input.payload,
        created_at: Utc::now(),
        org_id: ctx.org_id.clone(),
        attempts: 0,
        last_attempt: None,
        last_error: None,
        dead_lettered: false,
    }
}
