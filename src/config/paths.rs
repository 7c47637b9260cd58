//! Path resolution for glas-offline configuration and data files.
//!
//! All data is stored in `~/.glas-offline/` unless `GLAS_OFFLINE_HOME` is set:
//! - `config.yaml` - Backend and sync settings
//! - `queue.db` - SQLite database holding the offline queue

use std::path::PathBuf;

use crate::error::GlasError;

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "GLAS_OFFLINE_HOME";

/// Paths to configuration and data files.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory: `~/.glas-offline/`
    pub root: PathBuf,
    /// Config file: `~/.glas-offline/config.yaml`
    pub config_file: PathBuf,
    /// Queue database: `~/.glas-offline/queue.db`
    pub database: PathBuf,
}

impl Paths {
    /// Resolve paths from `GLAS_OFFLINE_HOME` or the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if neither variable is set.
    pub fn new() -> Result<Self, GlasError> {
        if let Ok(root) = std::env::var(HOME_ENV) {
            return Ok(Self::with_root(PathBuf::from(root)));
        }

        let home = std::env::var("HOME")
            .map_err(|_| GlasError::Config("Could not determine home directory".to_string()))?;

        Ok(Self::with_root(PathBuf::from(home).join(".glas-offline")))
    }

    /// Create paths with a custom root directory.
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("queue.db"),
            root,
        }
    }

    /// Ensure the data directory exists.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<(), GlasError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| {
                GlasError::Config(format!(
                    "Failed to create directory {}: {e}",
                    self.root.display()
                ))
            })?;
        }
        Ok(())
    }
}
