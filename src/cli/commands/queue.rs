//! Queue inspection and maintenance commands.

use serde_json::json;
use tracing::info;

use super::Session;
use crate::cli::args::OutputFormat;
use crate::error::GlasError;
use crate::offline::{ConnectivitySignal, OfflineTracker};
use crate::output::{format_items, format_status, to_json};
use crate::remote::ConnectivityProbe;

/// Show connectivity and queue state.
///
/// Probes the backend when one is configured; otherwise reports offline.
///
/// # Errors
///
/// Returns an error if the queue store cannot be read.
pub fn status(session: &Session, format: OutputFormat) -> Result<String, GlasError> {
    let online = session
        .remote()
        .is_ok_and(|client| client.probe() == ConnectivitySignal::Reachable);

    let tracker = OfflineTracker::new(&session.queue, session.tracker_config(), online)?;
    let stats = session.queue.stats()?;

    format_status(&tracker.state(), &stats, format)
}

/// List queued items, oldest first.
///
/// # Errors
///
/// Returns an error if the queue store cannot be read.
pub fn list(session: &Session, dead: bool, format: OutputFormat) -> Result<String, GlasError> {
    let mut items = session.queue.dequeue_all()?;
    let title = if dead {
        items.retain(|item| item.dead_lettered);
        "Dead-lettered"
    } else {
        "Pending"
    };

    format_items(&items, title, format)
}

/// Reset dead-lettered items for retry.
///
/// # Errors
///
/// Returns `GlasError::NotFound` for an unknown id and `GlasError::Config`
/// when neither `--id` nor `--all` is given.
pub fn retry(
    session: &Session,
    id: Option<&str>,
    all: bool,
    format: OutputFormat,
) -> Result<String, GlasError> {
    if let Some(id) = id {
        if !session.queue.reset_attempts(id)? {
            return Err(GlasError::NotFound(format!("Queue item {id}")));
        }
        info!(id, "item reset for retry");

        match format {
            OutputFormat::Json => to_json(&json!({"reset": 1, "id": id})),
            OutputFormat::Pretty => Ok(format!("Reset item {id} for retry")),
        }
    } else if all {
        let count = session.queue.reset_all_dead_letters()?;
        info!(count, "dead letters reset for retry");

        match format {
            OutputFormat::Json => to_json(&json!({"reset": count})),
            OutputFormat::Pretty => Ok(format!("Reset {count} dead-lettered items for retry")),
        }
    } else {
        Err(GlasError::Config(
            "Specify --all or provide an item --id".to_string(),
        ))
    }
}

/// Remove items without replaying them.
///
/// # Errors
///
/// Returns `GlasError::NotFound` for an unknown id and `GlasError::Config`
/// when `--all` is given without `--force` or nothing is selected.
pub fn discard(
    session: &Session,
    id: Option<&str>,
    all: bool,
    force: bool,
    format: OutputFormat,
) -> Result<String, GlasError> {
    if let Some(id) = id {
        if !session.queue.remove_item(id)? {
            return Err(GlasError::NotFound(format!("Queue item {id}")));
        }
        info!(id, "item discarded");

        match format {
            OutputFormat::Json => to_json(&json!({"discarded": 1, "id": id})),
            OutputFormat::Pretty => Ok(format!("Discarded item {id}")),
        }
    } else if all {
        if !force {
            return Err(GlasError::Config(
                "Use --force to discard every queued item".to_string(),
            ));
        }
        let count = session.queue.clear()?;
        info!(count, "queue cleared");

        match format {
            OutputFormat::Json => to_json(&json!({"discarded": count})),
            OutputFormat::Pretty => Ok(format!("Discarded {count} items")),
        }
    } else {
        Err(GlasError::Config(
            "Specify --all --force or provide an item --id".to_string(),
        ))
    }
}
