//! Output formatting for glas-offline.
//!
//! This module provides formatters for displaying queue state in various formats.

mod json;
mod pretty;

use crate::cli::args::OutputFormat;
use crate::error::GlasError;
use crate::offline::{QueueItem, QueueStats, SyncReport, TrackerState};

pub use json::*;
pub use pretty::*;

/// Format queue items based on output format
///
/// # Errors
///
/// Returns `GlasError::Parse` if JSON serialization fails.
pub fn format_items(
    items: &[QueueItem],
    title: &str,
    format: OutputFormat,
) -> Result<String, GlasError> {
    match format {
        OutputFormat::Pretty => Ok(format_items_pretty(items, title)),
        OutputFormat::Json => format_items_json(items, title),
    }
}

/// Format newly queued items based on output format
///
/// # Errors
///
/// Returns `GlasError::Parse` if JSON serialization fails.
pub fn format_queued(items: &[QueueItem], format: OutputFormat) -> Result<String, GlasError> {
    match format {
        OutputFormat::Pretty => Ok(items
            .iter()
            .map(format_queued_pretty)
            .collect::<Vec<_>>()
            .join("")),
        OutputFormat::Json => format_items_json(items, "Queued"),
    }
}

/// Format connectivity and queue state based on output format
///
/// # Errors
///
/// Returns `GlasError::Parse` if JSON serialization fails.
pub fn format_status(
    state: &TrackerState,
    stats: &QueueStats,
    format: OutputFormat,
) -> Result<String, GlasError> {
    match format {
        OutputFormat::Pretty => Ok(format_status_pretty(state, stats)),
        OutputFormat::Json => format_status_json(state, stats),
    }
}

/// Format a sync command result based on output format
///
/// # Errors
///
/// Returns `GlasError::Parse` if JSON serialization fails.
pub fn format_sync(
    report: Option<&SyncReport>,
    state: &TrackerState,
    format: OutputFormat,
) -> Result<String, GlasError> {
    match format {
        OutputFormat::Pretty => Ok(format_sync_pretty(report, state)),
        OutputFormat::Json => format_sync_json(report, state),
    }
}
