//! Offline-first write queue.
//!
//! Writes made while the device has no connectivity are persisted locally
//! and replayed against the backend once it is reachable again.
//!
//! - `queue`: durable store keyed by item id
//! - `item`: queue items and the factory that stamps them
//! - `payload`: typed per-table rows and upload payloads
//! - `engine`: one-at-a-time replay with per-item isolation
//! - `tracker`: online state, pending count and sync trigger

pub mod engine;
pub mod item;
pub mod payload;
pub mod queue;
pub mod tracker;

pub use engine::{EngineConfig, ItemResult, Outcome, SyncEngine, SyncReport};
pub use item::{create_queue_item, ItemKind, NewQueueItem, QueueItem};
pub use payload::{TableRow, UploadPayload};
pub use queue::{OfflineQueue, QueueStats};
pub use tracker::{ConnectivitySignal, OfflineTracker, TrackerConfig, TrackerState};
