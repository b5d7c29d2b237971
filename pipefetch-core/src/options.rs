//! Fetcher options and the resolved per-instance configuration.
//!
//! [`FetcherOptions`] is what a caller supplies: every field optional.
//! [`FetcherConfig::resolve`] fills the gaps with defaults and produces the
//! configuration a fetcher keeps for its lifetime.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::headers::{merge_headers, HeaderRecord, HeadersInit};
use crate::logger::FetchLogger;

// ============================================================================
// Step Toggle
// ============================================================================

/// A pipeline step setting: `false`, `true` (default options) or explicit options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Toggle<T> {
    /// `true` enables the step with default options, `false` disables it.
    Flag(bool),
    /// Enables the step with these options.
    Options(T),
}

impl<T: Default> Toggle<T> {
    /// Returns the step options if the step is enabled.
    pub fn into_enabled(self) -> Option<T> {
        match self {
            Self::Flag(true) => Some(T::default()),
            Self::Flag(false) => None,
            Self::Options(options) => Some(options),
        }
    }
}

// ============================================================================
// Retry Options
// ============================================================================

/// Options for the retry step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryOptions {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub min_timeout_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_timeout_ms: u64,
    /// Backoff multiplier applied per retry.
    pub timeout_factor: f64,
    /// Whether a `Retry-After` header overrides the computed delay.
    pub retry_after: bool,
    /// Methods eligible for retry.
    pub methods: Vec<String>,
    /// Response statuses that trigger a retry.
    pub status_codes: Vec<u16>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 5,
            min_timeout_ms: 500,
            max_timeout_ms: 30_000,
            timeout_factor: 2.0,
            retry_after: true,
            methods: ["GET", "HEAD", "OPTIONS", "PUT", "DELETE", "TRACE"]
                .into_iter()
                .map(String::from)
                .collect(),
            status_codes: vec![500, 502, 503, 504, 429],
        }
    }
}

impl RetryOptions {
    /// Sets the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the initial delay.
    pub fn with_min_timeout(mut self, delay: Duration) -> Self {
        self.min_timeout_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the initial delay.
    pub fn min_timeout(&self) -> Duration {
        Duration::from_millis(self.min_timeout_ms)
    }

    /// Returns the delay cap.
    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms)
    }

    /// Returns true if `method` may be retried.
    pub fn allows_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

// ============================================================================
// Cache Options
// ============================================================================

/// Options for the cache step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheOptions {
    /// Methods whose responses may be cached.
    pub methods: Vec<String>,
    /// Maximum number of cached responses.
    pub max_entries: usize,
    /// Freshness used when a response carries no `max-age`, in seconds.
    pub default_ttl_secs: u64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            methods: vec!["GET".to_string()],
            max_entries: 1024,
            default_ttl_secs: 60,
        }
    }
}

impl CacheOptions {
    /// Returns the fallback freshness lifetime.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Returns true if responses to `method` may be cached.
    pub fn allows_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

// ============================================================================
// Fetcher Options
// ============================================================================

/// Caller-supplied fetcher options. Absent fields take defaults.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetcherOptions {
    /// Origin/prefix relative inputs are resolved against.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Headers sent with every request.
    #[serde(default)]
    pub headers: Option<HeadersInit>,
    /// Whether responses with status >= 400 become errors. Defaults to true.
    #[serde(default)]
    pub throw_on_error: Option<bool>,
    /// Cache step setting. Defaults to disabled.
    #[serde(default)]
    pub cache: Option<Toggle<CacheOptions>>,
    /// Retry step setting. Defaults to disabled.
    #[serde(default)]
    pub retry: Option<Toggle<RetryOptions>>,
    /// Request log sink.
    #[serde(skip)]
    pub logger: Option<Arc<dyn FetchLogger>>,
}

impl FetcherOptions {
    /// Creates empty options (all defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the instance headers.
    pub fn headers(mut self, headers: impl Into<HeadersInit>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    /// Sets whether error statuses become failures.
    pub fn throw_on_error(mut self, enabled: bool) -> Self {
        self.throw_on_error = Some(enabled);
        self
    }

    /// Enables the cache step.
    pub fn cache(mut self, options: CacheOptions) -> Self {
        self.cache = Some(Toggle::Options(options));
        self
    }

    /// Enables the retry step.
    pub fn retry(mut self, options: RetryOptions) -> Self {
        self.retry = Some(Toggle::Options(options));
        self
    }

    /// Sets the request log sink.
    pub fn logger(mut self, logger: Arc<dyn FetchLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Parses options from a JSON document.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Loads options from a JSON file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let options = Self::from_json_str(&content)?;

        info!(path = %path.display(), "Loaded fetcher options");
        Ok(options)
    }
}

impl fmt::Debug for FetcherOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetcherOptions")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("throw_on_error", &self.throw_on_error)
            .field("cache", &self.cache)
            .field("retry", &self.retry)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

// ============================================================================
// Fetcher Config
// ============================================================================

/// Resolved per-instance configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetcherConfig {
    /// Base URL; `None` means inputs must be absolute.
    pub base_url: Option<String>,
    /// Instance headers.
    pub headers: HeaderRecord,
    /// Whether error statuses become failures.
    pub throw_on_error: bool,
    /// Cache step options, `None` when disabled.
    pub cache: Option<CacheOptions>,
    /// Retry step options, `None` when disabled.
    pub retry: Option<RetryOptions>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: HeaderRecord::new(),
            throw_on_error: true,
            cache: None,
            retry: None,
        }
    }
}

impl FetcherConfig {
    /// Merges `options` over the defaults. The logger is not part of the config.
    pub fn resolve(options: FetcherOptions) -> Self {
        let defaults = Self::default();

        Self {
            base_url: options.base_url.or(defaults.base_url),
            headers: merge_headers(
                Some(HeadersInit::Map(defaults.headers)),
                options.headers,
            ),
            throw_on_error: options.throw_on_error.unwrap_or(defaults.throw_on_error),
            cache: options.cache.map_or(defaults.cache, Toggle::into_enabled),
            retry: options.retry.map_or(defaults.retry, Toggle::into_enabled),
        }
    }

    /// Converts back into options, e.g. to build a sibling instance.
    pub fn to_options(&self) -> FetcherOptions {
        FetcherOptions {
            base_url: self.base_url.clone(),
            headers: Some(HeadersInit::Map(self.headers.clone())),
            throw_on_error: Some(self.throw_on_error),
            cache: Some(
                self.cache
                    .clone()
                    .map_or(Toggle::Flag(false), Toggle::Options),
            ),
            retry: Some(
                self.retry
                    .clone()
                    .map_or(Toggle::Flag(false), Toggle::Options),
            ),
            logger: None,
        }
    }

    /// Checks that a non-empty base URL is absolute.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Some(base_url) = self.base_url.as_deref().filter(|u| !u.is_empty()) else {
            return Ok(());
        };

        let uri: http::Uri = base_url
            .parse()
            .map_err(|e: http::uri::InvalidUri| ConfigError::InvalidBaseUrl(e.to_string()))?;

        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(ConfigError::InvalidBaseUrl(format!(
                "{base_url} is not an absolute URL"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = FetcherConfig::resolve(FetcherOptions::new());
        assert_eq!(config.base_url, None);
        assert!(config.headers.is_empty());
        assert!(config.throw_on_error);
        assert_eq!(config.cache, None);
        assert_eq!(config.retry, None);
    }

    #[test]
    fn test_fields_override_independently() {
        let config = FetcherConfig::resolve(
            FetcherOptions::new()
                .base_url("http://127.0.0.1:3000")
                .throw_on_error(false)
                .retry(RetryOptions::default().with_max_retries(2)),
        );

        assert_eq!(config.base_url.as_deref(), Some("http://127.0.0.1:3000"));
        assert!(!config.throw_on_error);
        assert_eq!(config.retry.map(|r| r.max_retries), Some(2));
        assert_eq!(config.cache, None);
    }

    #[test]
    fn test_headers_are_normalized() {
        let config = FetcherConfig::resolve(
            FetcherOptions::new().headers([("authorization", "Bearer t"), ("", "skip")]),
        );
        assert_eq!(config.headers.len(), 1);
        assert_eq!(config.headers["authorization"], "Bearer t");
    }

    #[test]
    fn test_toggle_parsing() {
        let options = FetcherOptions::from_json_str(
            r#"{"baseUrl":"http://h:3000","cache":true,"retry":{"maxRetries":1},"throwOnError":false}"#,
        )
        .unwrap();
        let config = FetcherConfig::resolve(options);

        assert_eq!(config.cache, Some(CacheOptions::default()));
        let retry = config.retry.unwrap();
        assert_eq!(retry.max_retries, 1);
        assert_eq!(retry.min_timeout_ms, 500);
        assert!(!config.throw_on_error);

        let disabled =
            FetcherConfig::resolve(FetcherOptions::from_json_str(r#"{"cache":false}"#).unwrap());
        assert_eq!(disabled.cache, None);
    }

    #[test]
    fn test_round_trip_through_options() {
        let config = FetcherConfig::resolve(
            FetcherOptions::new()
                .base_url("http://h")
                .headers([("a", "1")])
                .cache(CacheOptions::default()),
        );
        assert_eq!(FetcherConfig::resolve(config.to_options()), config);
    }

    #[test]
    fn test_validate_base_url() {
        let mut config = FetcherConfig::default();
        assert!(config.validate().is_ok());

        config.base_url = Some(String::new());
        assert!(config.validate().is_ok());

        config.base_url = Some("http://127.0.0.1:3000".to_string());
        assert!(config.validate().is_ok());

        config.base_url = Some("/relative".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let options = FetcherOptions::load_from(&dir.path().join("absent.json")).unwrap();
        assert!(options.base_url.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"baseUrl":"http://h","headers":[["x","1"]]}}"#).unwrap();

        let options = FetcherOptions::load_from(file.path()).unwrap();
        let config = FetcherConfig::resolve(options);
        assert_eq!(config.base_url.as_deref(), Some("http://h"));
        assert_eq!(config.headers["x"], "1");
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            FetcherOptions::load_from(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
