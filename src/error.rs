//! Error types for glas-offline.

use thiserror::Error;

/// Errors produced by the offline queue and its collaborators.
#[derive(Debug, Error)]
pub enum GlasError {
    /// The local queue store could not be opened, read or written.
    #[error("Queue store error: {0}")]
    Database(String),

    /// Configuration could not be loaded or is incomplete.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A queued item or remote resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A queued payload does not have the shape its kind requires.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The remote row or blob store rejected or failed a write.
    #[error("{}", format_remote(*.status, .message))]
    Remote {
        /// HTTP status, when the backend answered at all.
        status: Option<u16>,
        /// Backend or transport message.
        message: String,
    },

    /// The operation needs connectivity and the device is offline.
    #[error("Device is offline")]
    Offline,

    /// The caller's role does not allow the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

fn format_remote(status: Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Remote error ({code}): {message}"),
        None => format!("Remote error: {message}"),
    }
}

impl GlasError {
    /// Build a remote error from a transport failure (no HTTP status).
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Remote {
            status: None,
            message: message.into(),
        }
    }

    /// True for failures of the local store itself.
    ///
    /// These are fatal to the calling operation, unlike replay failures.
    #[must_use]
    pub const fn is_store_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<rusqlite::Error> for GlasError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
