//! Command implementations for glas-offline.
//!
//! Each command takes the opened [`Session`] and returns the text to print.

mod enqueue;
mod queue;
mod sync;

pub use enqueue::enqueue;
pub use queue::{discard, list, retry, status};
pub use sync::sync;

use crate::cli::args::Cli;
use crate::config::{Config, Paths};
use crate::core::{OrgContext, Role};
use crate::error::GlasError;
use crate::offline::{OfflineQueue, TrackerConfig};
use crate::remote::SupabaseClient;
use crate::storage::Database;

/// Everything a command needs: the opened queue, merged settings and the
/// caller's identity.
pub struct Session {
    pub queue: OfflineQueue,
    pub config: Config,
    pub org: Option<String>,
    pub role: Role,
}

impl Session {
    /// Resolve the data directory, load config.yaml, apply flag and
    /// environment overrides and open the queue store.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be parsed or the store cannot
    /// be opened.
    pub fn open(cli: &Cli) -> Result<Self, GlasError> {
        let paths = match &cli.data_dir {
            Some(dir) => Paths::with_root(dir.clone()),
            None => Paths::new()?,
        };
        paths.ensure_dirs()?;

        let mut config = Config::load_from_path(&paths.config_file)?;
        if let Some(url) = &cli.backend_url {
            config.backend.url = Some(url.clone());
        }
        if let Some(key) = &cli.anon_key {
            config.backend.anon_key = Some(key.clone());
        }
        if let Some(token) = &cli.access_token {
            config.backend.access_token = Some(token.clone());
        }

        let queue = OfflineQueue::with_database(Database::open_at(&paths.database)?);

        Ok(Self {
            queue,
            config,
            org: cli.org.clone(),
            role: cli.role,
        })
    }

    /// Caller context for operations scoped to an organization.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::Config` if no organization was given.
    pub fn context(&self) -> Result<OrgContext, GlasError> {
        let org = self
            .org
            .as_deref()
            .filter(|org| !org.trim().is_empty())
            .ok_or_else(|| GlasError::Config("Organization not set (--org or GLAS_ORG_ID)".to_string()))?;
        Ok(OrgContext::new(org, self.role))
    }

    #[must_use]
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig::from_settings(&self.config)
    }

    /// HTTP client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::Config` if the backend is not configured.
    pub fn remote(&self) -> Result<SupabaseClient, GlasError> {
        SupabaseClient::from_config(&self.config.backend)
    }
}
