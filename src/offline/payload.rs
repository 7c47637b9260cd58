//! Payload types for queued items.
//!
//! Mutation payloads are one structured record per known table, checked when
//! the item is built; replay sends the stored payload unchanged. Uploads carry
//! a destination path, the file bytes as a data URL (or bare base64) and a
//! content type.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::GlasError;

fn new_row_id() -> String {
    Uuid::new_v4().to_string()
}

/// Status change of a work task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkTaskRow {
    pub id: String,
    pub status: String,
}

/// Free-text notes on a work order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderNotesRow {
    pub id: String,
    pub notes: String,
}

/// A pane measurement taken on site, in millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRow {
    pub id: String,
    pub work_order_id: String,
    pub label: String,
    pub width_mm: f64,
    pub height_mm: f64,
}

/// A checklist entry on a work order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItemRow {
    pub id: String,
    pub work_order_id: String,
    pub label: String,
    #[serde(default)]
    pub is_checked: bool,
}

/// Photo metadata pointing at an uploaded blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRow {
    pub id: String,
    pub work_order_id: String,
    pub storage_path: String,
    pub description: String,
}

/// Customer signature captured on a work order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRow {
    pub id: String,
    pub work_order_id: String,
    pub signer_name: String,
    pub signature_svg: String,
}

/// A row write against one of the known tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", content = "row", rename_all = "snake_case")]
pub enum TableRow {
    WorkTasks(WorkTaskRow),
    WorkOrders(WorkOrderNotesRow),
    WorkMeasurements(MeasurementRow),
    WorkChecklistItems(ChecklistItemRow),
    WorkPhotos(PhotoRow),
    WorkSignatures(SignatureRow),
}

impl TableRow {
    /// Task status change.
    #[must_use]
    pub fn task_status(task_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::WorkTasks(WorkTaskRow {
            id: task_id.into(),
            status: status.into(),
        })
    }

    /// Work order notes.
    #[must_use]
    pub fn work_order_notes(work_order_id: impl Into<String>, notes: impl Into<String>) -> Self {
        Self::WorkOrders(WorkOrderNotesRow {
            id: work_order_id.into(),
            notes: notes.into(),
        })
    }

    /// New measurement with a fresh row id.
    #[must_use]
    pub fn measurement(
        work_order_id: impl Into<String>,
        label: impl Into<String>,
        width_mm: f64,
        height_mm: f64,
    ) -> Self {
        Self::WorkMeasurements(MeasurementRow {
            id: new_row_id(),
            work_order_id: work_order_id.into(),
            label: label.into(),
            width_mm,
            height_mm,
        })
    }

    /// Checklist item; pass an existing id to toggle, `None` to create.
    #[must_use]
    pub fn checklist_item(
        id: Option<String>,
        work_order_id: impl Into<String>,
        label: impl Into<String>,
        is_checked: bool,
    ) -> Self {
        Self::WorkChecklistItems(ChecklistItemRow {
            id: id.unwrap_or_else(new_row_id),
            work_order_id: work_order_id.into(),
            label: label.into(),
            is_checked,
        })
    }

    /// Photo record for a blob stored at `storage_path`.
    #[must_use]
    pub fn photo(
        work_order_id: impl Into<String>,
        storage_path: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::WorkPhotos(PhotoRow {
            id: new_row_id(),
            work_order_id: work_order_id.into(),
            storage_path: storage_path.into(),
            description: description.into(),
        })
    }

    /// Signature record.
    #[must_use]
    pub fn signature(
        work_order_id: impl Into<String>,
        signer_name: impl Into<String>,
        signature_svg: impl Into<String>,
    ) -> Self {
        Self::WorkSignatures(SignatureRow {
            id: new_row_id(),
            work_order_id: work_order_id.into(),
            signer_name: signer_name.into(),
            signature_svg: signature_svg.into(),
        })
    }

    /// Backend table name.
    #[must_use]
    pub const fn table(&self) -> &'static str {
        match self {
            Self::WorkTasks(_) => "work_tasks",
            Self::WorkOrders(_) => "work_orders",
            Self::WorkMeasurements(_) => "work_measurements",
            Self::WorkChecklistItems(_) => "work_checklist_items",
            Self::WorkPhotos(_) => "work_photos",
            Self::WorkSignatures(_) => "work_signatures",
        }
    }

    /// Row identifier used as the upsert conflict key.
    #[must_use]
    pub fn row_id(&self) -> &str {
        match self {
            Self::WorkTasks(r) => &r.id,
            Self::WorkOrders(r) => &r.id,
            Self::WorkMeasurements(r) => &r.id,
            Self::WorkChecklistItems(r) => &r.id,
            Self::WorkPhotos(r) => &r.id,
            Self::WorkSignatures(r) => &r.id,
        }
    }

    /// Field-level checks beyond what the types enforce.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::InvalidPayload` describing the first violation.
    pub fn validate(&self) -> Result<(), GlasError> {
        if self.row_id().trim().is_empty() {
            return Err(GlasError::InvalidPayload(format!(
                "{}: empty row id",
                self.table()
            )));
        }
        match self {
            Self::WorkMeasurements(m) => {
                if m.label.trim().is_empty() {
                    return Err(GlasError::InvalidPayload(
                        "work_measurements: label is required".to_string(),
                    ));
                }
                if !(m.width_mm > 0.0 && m.height_mm > 0.0) {
                    return Err(GlasError::InvalidPayload(format!(
                        "work_measurements: dimensions must be positive, got {} x {}",
                        m.width_mm, m.height_mm
                    )));
                }
            },
            Self::WorkChecklistItems(c) if c.label.trim().is_empty() => {
                return Err(GlasError::InvalidPayload(
                    "work_checklist_items: label is required".to_string(),
                ));
            },
            Self::WorkPhotos(p) if p.storage_path.trim().is_empty() => {
                return Err(GlasError::InvalidPayload(
                    "work_photos: storage_path is required".to_string(),
                ));
            },
            _ => {},
        }
        Ok(())
    }

    /// The record as a JSON object, as sent to the row store.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::Parse` if serialization fails.
    pub fn to_value(&self) -> Result<Value, GlasError> {
        let value = match self {
            Self::WorkTasks(r) => serde_json::to_value(r)?,
            Self::WorkOrders(r) => serde_json::to_value(r)?,
            Self::WorkMeasurements(r) => serde_json::to_value(r)?,
            Self::WorkChecklistItems(r) => serde_json::to_value(r)?,
            Self::WorkPhotos(r) => serde_json::to_value(r)?,
            Self::WorkSignatures(r) => serde_json::to_value(r)?,
        };
        Ok(value)
    }
}

/// A blob write waiting for connectivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPayload {
    /// Object path inside the bucket.
    pub path: String,
    /// `data:<mime>;base64,<data>` URL or bare base64.
    pub file_data: String,
    pub content_type: String,
}

impl UploadPayload {
    /// Encode raw bytes as a data URL payload.
    #[must_use]
    pub fn from_bytes(path: impl Into<String>, bytes: &[u8], content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        Self {
            path: path.into(),
            file_data: format!("data:{content_type};base64,{}", STANDARD.encode(bytes)),
            content_type,
        }
    }

    /// Decode `file_data` back into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::InvalidPayload` if the data is not valid base64.
    pub fn decode_bytes(&self) -> Result<Vec<u8>, GlasError> {
        decode_file_data(&self.file_data)
    }

    /// Check the fields the blob store needs.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::InvalidPayload` if path or content type is empty.
    pub fn validate(&self) -> Result<(), GlasError> {
        if self.path.trim().is_empty() {
            return Err(GlasError::InvalidPayload("upload: path is required".to_string()));
        }
        if self.path.starts_with('/') || self.path.split('/').any(|s| s == "..") {
            return Err(GlasError::InvalidPayload(format!(
                "upload: path must be relative to the bucket: {}",
                self.path
            )));
        }
        if self.content_type.trim().is_empty() {
            return Err(GlasError::InvalidPayload(
                "upload: contentType is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Decode a data URL or bare base64 string.
///
/// Data URLs without the `;base64` marker carry their data as plain text.
///
/// # Errors
///
/// Returns `GlasError::InvalidPayload` for malformed input.
pub fn decode_file_data(data: &str) -> Result<Vec<u8>, GlasError> {
    if let Some(rest) = data.strip_prefix("data:") {
        let (meta, body) = rest
            .split_once(',')
            .ok_or_else(|| GlasError::InvalidPayload("data URL without ','".to_string()))?;
        if meta.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
            return STANDARD
                .decode(body.trim())
                .map_err(|e| GlasError::InvalidPayload(format!("invalid base64: {e}")));
        }
        return Ok(body.as_bytes().to_vec());
    }

    STANDARD
        .decode(data.trim())
        .map_err(|e| GlasError::InvalidPayload(format!("invalid base64: {e}")))
}

/// Object path for a work order photo.
#[must_use]
pub fn photo_path(org_id: &str, work_order_id: &str, tag: &str, file_name: &str) -> String {
    format!("{org_id}/work-orders/{work_order_id}/{tag}-{file_name}")
}

/// Object path for a signature image captured at `millis`.
#[must_use]
pub fn signature_path(org_id: &str, work_order_id: &str, millis: i64) -> String {
    format!("{org_id}/work-orders/{work_order_id}/signatures/{millis}.png")
}

/// Guess a content type from a file extension.
#[must_use]
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
