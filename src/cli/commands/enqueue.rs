//! Enqueue command implementation.
//!
//! Builds typed rows and uploads from flags and hands them to the tracker.
//! Nothing here touches the network.

use std::path::Path;

use chrono::Utc;
use serde_json::Value;

use super::Session;
use crate::cli::args::{EnqueueCommands, OutputFormat};
use crate::core::OrgContext;
use crate::error::GlasError;
use crate::offline::payload::{content_type_for, photo_path, signature_path};
use crate::offline::{NewQueueItem, OfflineTracker, QueueItem, TableRow, UploadPayload};
use crate::output::format_queued;

/// Execute enqueue subcommands.
///
/// # Errors
///
/// Returns an error if the caller lacks the role, input is invalid, a file
/// cannot be read or the item cannot be stored.
pub fn enqueue(
    session: &Session,
    cmd: EnqueueCommands,
    format: OutputFormat,
) -> Result<String, GlasError> {
    let ctx = session.context()?;
    let mut tracker = OfflineTracker::new(&session.queue, session.tracker_config(), false)?;

    let inputs = build_inputs(&ctx, cmd)?;
    let items = inputs
        .into_iter()
        .map(|input| tracker.enqueue_item(&ctx, input))
        .collect::<Result<Vec<QueueItem>, _>>()?;

    format_queued(&items, format)
}

/// Translate a subcommand into the items it queues, in replay order.
fn build_inputs(ctx: &OrgContext, cmd: EnqueueCommands) -> Result<Vec<NewQueueItem>, GlasError> {
    match cmd {
        EnqueueCommands::TaskStatus { task, status } => {
            Ok(vec![NewQueueItem::mutation(&TableRow::task_status(task, status))?])
        },
        EnqueueCommands::Notes { work_order, notes } => Ok(vec![NewQueueItem::mutation(
            &TableRow::work_order_notes(work_order, notes),
        )?]),
        EnqueueCommands::Measurement {
            work_order,
            label,
            width,
            height,
        } => Ok(vec![NewQueueItem::mutation(&TableRow::measurement(
            work_order, label, width, height,
        ))?]),
        EnqueueCommands::Checklist {
            work_order,
            label,
            id,
            checked,
        } => Ok(vec![NewQueueItem::mutation(&TableRow::checklist_item(
            id, work_order, label, checked,
        ))?]),
        EnqueueCommands::Photo {
            work_order,
            file,
            tag,
        } => {
            let (bytes, file_name) = read_file(&file)?;
            let path = photo_path(&ctx.org_id, &work_order, &tag, &file_name);
            let upload = UploadPayload::from_bytes(&path, &bytes, content_type_for(&file_name));
            let row = TableRow::photo(work_order, path, tag);

            // Upload first so the row never points at a missing object.
            Ok(vec![
                NewQueueItem::upload(row.table(), &upload)?,
                NewQueueItem::mutation(&row)?,
            ])
        },
        EnqueueCommands::Signature {
            work_order,
            file,
            signer,
        } => {
            let (bytes, _) = read_file(&file)?;
            let path = signature_path(&ctx.org_id, &work_order, Utc::now().timestamp_millis());
            let upload = UploadPayload::from_bytes(path, &bytes, "image/png");
            let row = TableRow::signature(work_order, signer, upload.file_data.clone());

            Ok(vec![
                NewQueueItem::upload(row.table(), &upload)?,
                NewQueueItem::mutation(&row)?,
            ])
        },
        EnqueueCommands::Raw {
            kind,
            table,
            payload,
        } => {
            let payload: Value = serde_json::from_str(&payload)
                .map_err(|e| GlasError::InvalidPayload(format!("--payload is not JSON: {e}")))?;
            Ok(vec![NewQueueItem::raw(kind, table, payload)])
        },
    }
}

fn read_file(path: &Path) -> Result<(Vec<u8>, String), GlasError> {
    let bytes = std::fs::read(path).map_err(|e| {
        GlasError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| GlasError::InvalidPayload(format!("not a file: {}", path.display())))?;
    Ok((bytes, file_name))
}
