//! Sync command implementation.
//!
//! Probes the backend, feeds the result to the tracker as a connectivity
//! signal and runs a pass when the backend is reachable.

use tracing::info;

use super::Session;
use crate::cli::args::OutputFormat;
use crate::error::GlasError;
use crate::offline::{ConnectivitySignal, OfflineTracker};
use crate::output::format_sync;
use crate::remote::ConnectivityProbe;

/// Replay the queue against the configured backend.
///
/// With `offline` set the backend is neither probed nor contacted.
///
/// # Errors
///
/// Returns an error if no organization or backend is configured, or if the
/// queue store fails. Failures of individual items are part of the output.
pub fn sync(session: &Session, offline: bool, format: OutputFormat) -> Result<String, GlasError> {
    let ctx = session.context()?;
    let mut tracker = OfflineTracker::new(&session.queue, session.tracker_config(), false)?;

    if offline {
        info!(pending = tracker.pending_count(), "offline, nothing sent");
        return format_sync(None, &tracker.state(), format);
    }

    let client = session.remote()?;
    let signal = client.probe();

    let mut report = tracker.on_signal(&ctx, signal, &client)?;
    if report.is_none() && signal == ConnectivitySignal::Reachable {
        // sync_on_reconnect disabled; an explicit sync still runs a pass
        report = tracker.sync_now(&ctx, &client)?;
    }

    format_sync(report.as_ref(), &tracker.state(), format)
}
