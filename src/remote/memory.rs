//! In-process backend with failure injection.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::{Map, Value};

use super::{BlobStore, ConnectivityProbe, RowStore};
use crate::error::GlasError;
use crate::offline::ConnectivitySignal;

/// A blob as written by [`BlobStore::upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Backend keeping rows and blobs in memory.
///
/// Single-threaded like the queue itself. Rows are merged on upsert.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    rows: RefCell<HashMap<String, BTreeMap<String, Map<String, Value>>>>,
    blobs: RefCell<HashMap<(String, String), StoredBlob>>,
    rejected_rows: RefCell<HashSet<String>>,
    rejected_paths: RefCell<HashSet<String>>,
    unreachable: Cell<bool>,
    calls: Cell<usize>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every upsert of the row with this id.
    pub fn reject_row(&self, id: impl Into<String>) {
        self.rejected_rows.borrow_mut().insert(id.into());
    }

    /// Fail every upload to this path.
    pub fn reject_path(&self, path: impl Into<String>) {
        self.rejected_paths.borrow_mut().insert(path.into());
    }

    /// Stop rejecting anything.
    pub fn clear_rejections(&self) {
        self.rejected_rows.borrow_mut().clear();
        self.rejected_paths.borrow_mut().clear();
    }

    /// Simulate losing or regaining the network.
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.set(!reachable);
    }

    /// Number of upsert and upload calls received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// A stored row by table and id.
    #[must_use]
    pub fn row(&self, table: &str, id: &str) -> Option<Map<String, Value>> {
        self.rows
            .borrow()
            .get(table)
            .and_then(|rows| rows.get(id))
            .cloned()
    }

    /// Number of rows in a table.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.rows.borrow().get(table).map_or(0, BTreeMap::len)
    }

    /// A stored blob by bucket and path.
    #[must_use]
    pub fn blob(&self, bucket: &str, path: &str) -> Option<StoredBlob> {
        self.blobs
            .borrow()
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    fn begin_call(&self) -> Result<(), GlasError> {
        self.calls.set(self.calls.get() + 1);
        if self.unreachable.get() {
            return Err(GlasError::Offline);
        }
        Ok(())
    }
}

impl RowStore for MemoryBackend {
    fn upsert(&self, table: &str, row: &Value) -> Result<(), GlasError> {
        self.begin_call()?;

        let fields = row.as_object().ok_or_else(|| GlasError::Remote {
            status: Some(400),
            message: format!("{table}: row must be an object"),
        })?;
        let id = fields
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| GlasError::Remote {
                status: Some(400),
                message: format!("{table}: row without id"),
            })?;

        if self.rejected_rows.borrow().contains(id) {
            return Err(GlasError::Remote {
                status: Some(409),
                message: format!("{table}: row {id} rejected"),
            });
        }

        let mut rows = self.rows.borrow_mut();
        let existing = rows
            .entry(table.to_string())
            .or_default()
            .entry(id.to_string())
            .or_default();
        for (key, value) in fields {
            existing.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

impl BlobStore for MemoryBackend {
    fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), GlasError> {
        self.begin_call()?;

        if self.rejected_paths.borrow().contains(path) {
            return Err(GlasError::Remote {
                status: Some(403),
                message: format!("{bucket}/{path} rejected"),
            });
        }

        self.blobs.borrow_mut().insert(
            (bucket.to_string(), path.to_string()),
            StoredBlob {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

impl ConnectivityProbe for MemoryBackend {
    fn probe(&self) -> ConnectivitySignal {
        if self.unreachable.get() {
            ConnectivitySignal::Unreachable
        } else {
            ConnectivitySignal::Reachable
        }
    }
}
