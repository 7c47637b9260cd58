//! Connectivity and pending-state tracking.
//!
//! The tracker is what the UI layer talks to: it knows whether the device is
//! online, how many items are pending, and runs sync passes on demand or when
//! connectivity returns. The pending count is always re-read from the store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::engine::{EngineConfig, SyncEngine, SyncReport};
use super::item::{create_queue_item, NewQueueItem, QueueItem};
use super::queue::OfflineQueue;
use crate::config::Config;
use crate::core::{OrgContext, Role};
use crate::error::GlasError;
use crate::remote::RemoteBackend;

/// Platform connectivity transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivitySignal {
    Reachable,
    Unreachable,
}

/// Roles allowed to queue writes.
const ENQUEUE_ROLES: &[Role] = &[Role::Technician];

/// Tracker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub engine: EngineConfig,
    /// Run a pass on an offline → online transition.
    pub sync_on_reconnect: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            sync_on_reconnect: true,
        }
    }
}

impl TrackerConfig {
    #[must_use]
    pub fn from_settings(config: &Config) -> Self {
        Self {
            engine: EngineConfig::from_settings(&config.backend, &config.sync),
            sync_on_reconnect: config.sync.sync_on_reconnect,
        }
    }
}

/// Snapshot of what the UI shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerState {
    pub is_online: bool,
    pub pending_count: usize,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Online state, pending count and sync trigger for one queue.
pub struct OfflineTracker<'a> {
    queue: &'a OfflineQueue,
    config: TrackerConfig,
    online: bool,
    pending_count: usize,
    last_sync: Option<DateTime<Utc>>,
}

impl<'a> OfflineTracker<'a> {
    /// Create a tracker and read the initial pending count.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue store cannot be read.
    pub fn new(
        queue: &'a OfflineQueue,
        config: TrackerConfig,
        online: bool,
    ) -> Result<Self, GlasError> {
        let mut tracker = Self {
            queue,
            config,
            online,
            pending_count: 0,
            last_sync: None,
        };
        tracker.refresh_pending()?;
        Ok(tracker)
    }

    #[must_use]
    pub const fn is_online(&self) -> bool {
        self.online
    }

    /// Cached count from the last store read.
    #[must_use]
    pub const fn pending_count(&self) -> usize {
        self.pending_count
    }

    #[must_use]
    pub const fn state(&self) -> TrackerState {
        TrackerState {
            is_online: self.online,
            pending_count: self.pending_count,
            last_sync: self.last_sync,
        }
    }

    /// Apply a connectivity transition.
    ///
    /// Coming back online runs a sync pass when `sync_on_reconnect` is set;
    /// the report of that pass is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue store fails during the pass.
    pub fn on_signal(
        &mut self,
        ctx: &OrgContext,
        signal: ConnectivitySignal,
        backend: &dyn RemoteBackend,
    ) -> Result<Option<SyncReport>, GlasError> {
        let was_online = self.online;
        self.online = signal == ConnectivitySignal::Reachable;

        if was_online != self.online {
            info!(online = self.online, "connectivity changed");
        }

        if !was_online && self.online && self.config.sync_on_reconnect {
            return self.sync_now(ctx, backend);
        }
        Ok(None)
    }

    /// Run a full sync pass if online, then re-read the pending count.
    ///
    /// Offline this does nothing and returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue store fails. Replay failures are in the
    /// report, not in the error.
    pub fn sync_now(
        &mut self,
        ctx: &OrgContext,
        backend: &dyn RemoteBackend,
    ) -> Result<Option<SyncReport>, GlasError> {
        if !self.online {
            debug!("offline, skipping sync");
            return Ok(None);
        }

        let engine = SyncEngine::with_config(self.queue, backend, self.config.engine.clone());
        let report = engine.process_queue(ctx)?;
        self.last_sync = Some(Utc::now());
        self.refresh_pending()?;

        Ok(Some(report))
    }

    /// Stamp, persist and count a new item.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::PermissionDenied` for roles below technician, or a
    /// store error if the item cannot be written.
    pub fn enqueue_item(
        &mut self,
        ctx: &OrgContext,
        input: NewQueueItem,
    ) -> Result<QueueItem, GlasError> {
        ctx.require(ENQUEUE_ROLES, "queue writes")?;

        let item = create_queue_item(ctx, input);
        self.queue.enqueue(&item)?;
        debug!(id = %item.id, kind = %item.kind, table = %item.table, "item queued");

        self.refresh_pending()?;
        Ok(item)
    }

    /// Re-read the pending count from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue store cannot be read.
    pub fn refresh_pending(&mut self) -> Result<usize, GlasError> {
        self.pending_count = self.queue.dequeue_all()?.len();
        Ok(self.pending_count)
    }
}
