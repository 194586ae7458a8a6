use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Runtime configuration, loaded from a JSON file. Missing fields fall
/// back to the defaults below so a partial config stays valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// TAK server endpoint receiving CoT documents via HTTP PUT.
    pub tak_endpoint_url: String,
    /// URL polled by the connectivity monitor; defaults to the endpoint.
    pub probe_url: Option<String>,
    /// Ground-plane reference elevation for geolocation, meters.
    pub target_elevation_m: f64,
    /// Bound on the best-effort push during ingestion, seconds.
    pub push_timeout_secs: u64,
    /// Per-request timeout for the HTTP transport, seconds.
    pub request_timeout_secs: u64,
    /// Connectivity poll / periodic sync interval, seconds.
    pub sync_interval_secs: u64,
    pub sync_batch_size: usize,
    /// Retries before an entry is dead-lettered.
    pub max_retries: u32,
    /// Synced entries older than this are garbage-collected.
    pub retention_days: i64,
    pub db_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tak_endpoint_url: "http://localhost:8087/cot".to_string(),
            probe_url: None,
            target_elevation_m: 0.0,
            push_timeout_secs: 3,
            request_timeout_secs: 5,
            sync_interval_secs: 30,
            sync_batch_size: 25,
            max_retries: 5,
            retention_days: 30,
            db_path: "cot-relay.sqlite3".to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid settings file {}", path.display()))
    }

    pub fn probe_url(&self) -> &str {
        self.probe_url.as_deref().unwrap_or(&self.tak_endpoint_url)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let settings = Settings::load(Path::new("/nonexistent/cot-relay.json")).unwrap();
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.retention_days, 30);
        assert_eq!(settings.probe_url(), "http://localhost:8087/cot");
    }

    #[test]
    fn partial_config_keeps_defaults_for_rest() {
        let settings: Settings =
            serde_json::from_str(r#"{"takEndpointUrl": "https://tak.example/cot"}"#).unwrap();
        assert_eq!(settings.tak_endpoint_url, "https://tak.example/cot");
        assert_eq!(settings.sync_batch_size, 25);
        assert_eq!(settings.probe_url(), "https://tak.example/cot");
    }
}
