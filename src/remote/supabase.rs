//! HTTP client for the hosted backend.
//!
//! Rows go through the REST endpoint (`/rest/v1/{table}`) with merge-on-conflict
//! upserts; blobs go through the storage endpoint (`/storage/v1/object/...`)
//! with `x-upsert` so an existing object is replaced.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use super::{BlobStore, ConnectivityProbe, RowStore};
use crate::config::BackendConfig;
use crate::error::GlasError;
use crate::offline::ConnectivitySignal;

/// Client for the hosted row and blob API.
pub struct SupabaseClient {
    base_url: Url,
    anon_key: String,
    access_token: String,
    client: Client,
}

impl SupabaseClient {
    /// Build a client from backend settings.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::Config` if the URL or API key is missing or invalid.
    pub fn from_config(config: &BackendConfig) -> Result<Self, GlasError> {
        let url = config.url.as_deref().ok_or_else(|| {
            GlasError::Config("Backend URL not configured (backend.url or GLAS_BACKEND_URL)".to_string())
        })?;
        let anon_key = config.anon_key.clone().ok_or_else(|| {
            GlasError::Config("API key not configured (backend.anon_key or GLAS_ANON_KEY)".to_string())
        })?;

        let base_url = Url::parse(url)
            .map_err(|e| GlasError::Config(format!("Invalid backend URL {url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GlasError::Config(format!("Invalid backend URL {url}")));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GlasError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            access_token: config.access_token.clone().unwrap_or_else(|| anon_key.clone()),
            anon_key,
            client,
        })
    }

    fn endpoint<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Result<Url, GlasError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GlasError::Config(format!("Invalid backend URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn rest_url(&self, table: &str) -> Result<Url, GlasError> {
        validate_table(table)?;
        let mut url = self.endpoint(["rest", "v1", table])?;
        url.query_pairs_mut().append_pair("on_conflict", "id");
        Ok(url)
    }

    fn object_url(&self, bucket: &str, path: &str) -> Result<Url, GlasError> {
        let segments = ["storage", "v1", "object", bucket]
            .into_iter()
            .chain(path.split('/').filter(|s| !s.is_empty()));
        self.endpoint(segments)
    }

    fn check(response: Response) -> Result<(), GlasError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().unwrap_or_default();
        let message = extract_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
        Err(GlasError::Remote {
            status: Some(status.as_u16()),
            message,
        })
    }
}

impl RowStore for SupabaseClient {
    fn upsert(&self, table: &str, row: &Value) -> Result<(), GlasError> {
        let url = self.rest_url(table)?;
        debug!(%url, "upserting row");

        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.access_token)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row)
            .send()
            .map_err(|e| GlasError::transport(e.to_string()))?;

        Self::check(response)
    }
}

impl BlobStore for SupabaseClient {
    fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), GlasError> {
        let url = self.object_url(bucket, path)?;
        debug!(%url, size = bytes.len(), "uploading object");

        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.access_token)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .map_err(|e| GlasError::transport(e.to_string()))?;

        Self::check(response)
    }
}

impl ConnectivityProbe for SupabaseClient {
    fn probe(&self) -> ConnectivitySignal {
        let Ok(url) = self.endpoint(["rest", "v1", ""]) else {
            return ConnectivitySignal::Unreachable;
        };
        // Any HTTP answer, even an auth error, means the network is there.
        match self.client.get(url).header("apikey", &self.anon_key).send() {
            Ok(_) => ConnectivitySignal::Reachable,
            Err(e) => {
                debug!(error = %e, "backend unreachable");
                ConnectivitySignal::Unreachable
            },
        }
    }
}

fn validate_table(table: &str) -> Result<(), GlasError> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(GlasError::InvalidPayload(format!("Invalid table name: {table}")))
    }
}

/// Pull `message` (REST) or `error` (storage) out of an error body.
fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error", "msg"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(String::from)
}
