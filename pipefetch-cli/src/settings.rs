//! CLI configuration file.
//!
//! A JSON document holding fetcher options at the top level and transport
//! settings under `transport`:
//!
//! ```json
//! {
//!   "baseUrl": "http://127.0.0.1:3000",
//!   "headers": { "accept": "application/json" },
//!   "retry": true,
//!   "cache": { "defaultTtlSecs": 30 },
//!   "transport": { "connectTimeoutMs": 2000 }
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pipefetch_core::FetcherOptions;
use pipefetch_fetch::TransportSettings;
use serde::Deserialize;
use tracing::debug;

/// Contents of the CLI config file.
#[derive(Debug, Default, Deserialize)]
pub struct CliSettings {
    /// Fetcher options.
    #[serde(flatten)]
    pub fetcher: FetcherOptions,
    /// Pooling parameters for the shared transport.
    #[serde(default)]
    pub transport: TransportSettings,
}

/// Returns the default config file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|c| c.join("pipefetch"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.json")
}

/// Loads settings from `path`, or from the default location.
///
/// A missing file yields defaults; an unreadable or malformed one is an error.
pub fn load(path: Option<&Path>) -> Result<CliSettings> {
    let path = path.map_or_else(default_config_path, Path::to_path_buf);

    if !path.exists() {
        debug!(path = %path.display(), "Config file not found, using defaults");
        return Ok(CliSettings::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let settings = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config {}", path.display()))?;

    debug!(path = %path.display(), "Loaded config");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load(Some(&dir.path().join("absent.json"))).unwrap();
        assert!(settings.fetcher.base_url.is_none());
        assert_eq!(settings.transport, TransportSettings::default());
    }

    #[test]
    fn test_flattened_fetcher_and_transport() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"baseUrl":"http://127.0.0.1:3000","retry":true,"transport":{{"connections":4}}}}"#
        )
        .unwrap();

        let settings = load(Some(file.path())).unwrap();
        assert_eq!(settings.fetcher.base_url.as_deref(), Some("http://127.0.0.1:3000"));
        assert!(settings.fetcher.retry.is_some());
        assert_eq!(settings.transport.connections, 4);
        assert_eq!(settings.transport.connect_timeout_ms, 10_000);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(load(Some(file.path())).is_err());
    }
}
