//! Remote backend interfaces.
//!
//! The sync engine replays queued items through these traits. The hosted
//! backend implementation speaks HTTP; the in-memory one backs tests and
//! local dry runs.

mod memory;
mod supabase;

pub use memory::{MemoryBackend, StoredBlob};
pub use supabase::SupabaseClient;

use serde_json::Value;

use crate::error::GlasError;
use crate::offline::ConnectivitySignal;

/// Row writes against named tables.
pub trait RowStore {
    /// Insert `row` into `table`, or merge it into the row with the same `id`.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::Remote` if the backend rejects or fails the write.
    fn upsert(&self, table: &str, row: &Value) -> Result<(), GlasError>;
}

/// Blob writes into storage buckets.
pub trait BlobStore {
    /// Write `bytes` to `path` in `bucket`, replacing any existing object.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::Remote` if the backend rejects or fails the write.
    fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), GlasError>;
}

/// A backend that can replay both kinds of queue items.
pub trait RemoteBackend: RowStore + BlobStore {}

impl<T: RowStore + BlobStore + ?Sized> RemoteBackend for T {}

/// Source of connectivity transitions.
pub trait ConnectivityProbe {
    /// Check reachability once and report it as a signal.
    fn probe(&self) -> ConnectivitySignal;
}
