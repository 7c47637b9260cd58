//! JSON output formatting.

use serde::Serialize;
use serde_json::json;

use crate::error::GlasError;
use crate::offline::{QueueItem, QueueStats, SyncReport, TrackerState};

/// Format queue items as JSON
///
/// # Errors
///
/// Returns `GlasError::Parse` if JSON serialization fails.
pub fn format_items_json(items: &[QueueItem], list_name: &str) -> Result<String, GlasError> {
    let output = json!({
        "list": list_name,
        "count": items.len(),
        "items": items
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format connectivity and queue state as JSON
///
/// # Errors
///
/// Returns `GlasError::Parse` if JSON serialization fails.
pub fn format_status_json(state: &TrackerState, stats: &QueueStats) -> Result<String, GlasError> {
    let output = json!({
        "is_online": state.is_online,
        "pending_count": state.pending_count,
        "dead_lettered": stats.dead_lettered,
        "uploads": stats.uploads,
        "oldest_pending": stats.oldest_pending,
        "last_sync": state.last_sync,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format the outcome of a sync command as JSON
///
/// `report` is `None` when no pass ran because the backend was unreachable.
///
/// # Errors
///
/// Returns `GlasError::Parse` if JSON serialization fails.
pub fn format_sync_json(
    report: Option<&SyncReport>,
    state: &TrackerState,
) -> Result<String, GlasError> {
    let output = json!({
        "is_online": state.is_online,
        "pending_count": state.pending_count,
        "report": report,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Generic JSON formatter for any serializable type
///
/// # Errors
///
/// Returns `GlasError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, GlasError> {
    Ok(serde_json::to_string_pretty(value)?)
}
