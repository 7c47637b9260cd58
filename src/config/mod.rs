//! Configuration management for glas-offline.
//!
//! This module handles loading and saving configuration from `~/.glas-offline/`.

mod paths;
mod settings;

pub use paths::Paths;
pub use settings::{BackendConfig, ColorSetting, Config, GeneralConfig, SyncConfig};
