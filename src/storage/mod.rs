//! Storage layer for glas-offline.
//!
//! SQLite-based persistence for the offline queue. The database lives on the
//! device and survives process restarts.

mod database;
mod migrations;

pub use database::Database;
