//! glas-offline - offline-first write queue for field technicians
//!
//! Writes made without connectivity are persisted in a local SQLite store
//! and replayed one at a time against the backend once it is reachable.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod offline;
pub mod output;
pub mod remote;
pub mod storage;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use crate::core::{OrgContext, Role};
pub use error::GlasError;
pub use offline::{OfflineQueue, OfflineTracker, SyncEngine};
