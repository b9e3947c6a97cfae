//! Client configuration.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// API URL baked in at compile time (set `STRIDE_API_URL` while building).
const COMPILE_TIME_API_URL: Option<&str> = option_env!("STRIDE_API_URL");

/// Development API default, used by debug builds when no override exists.
pub const DEV_API_URL: &str = "http://localhost:8000";

/// Relative API path used by release builds when no override exists.
pub const PRODUCTION_API_PATH: &str = "/api";

/// Origin that relative API paths are resolved against.
pub const DEFAULT_APP_ORIGIN: &str = match option_env!("STRIDE_APP_ORIGIN") {
    Some(origin) => origin,
    None => "http://localhost",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_REFRESH_TTL_MS: u64 = 7_000;
const DEFAULT_REFRESH_MAX_ATTEMPTS: u32 = 2;
const DEFAULT_REFRESH_BACKOFF_BASE_MS: u64 = 300;
const DEFAULT_STORAGE_SERVICE_NAME: &str = "fit.stride.client";

/// Resolve the API base URL.
///
/// Order: runtime override, compile-time override, development default in
/// debug builds, then the relative production path.
pub fn resolve_api_url(
    runtime_override: Option<&str>,
    compile_time_override: Option<&str>,
    debug_build: bool,
) -> String {
    let non_empty = |value: Option<&str>| {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| v.trim_end_matches('/').to_string())
    };

    if let Some(url) = non_empty(runtime_override) {
        return url;
    }
    if let Some(url) = non_empty(compile_time_override) {
        return url;
    }
    if debug_build {
        DEV_API_URL.to_string()
    } else {
        PRODUCTION_API_PATH.to_string()
    }
}

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// API base URL, absolute or a path relative to `app_origin`.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Origin for relative API paths.
    #[serde(default = "default_app_origin")]
    pub app_origin: String,
    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// How long a pending refresh may be shared before a new one is started.
    #[serde(default = "default_refresh_ttl_ms")]
    pub refresh_ttl_ms: u64,
    /// Total refresh attempts per refresh cycle.
    #[serde(default = "default_refresh_max_attempts")]
    pub refresh_max_attempts: u32,
    /// Base delay for refresh backoff (`base * 2^(attempt-1)`).
    #[serde(default = "default_refresh_backoff_base_ms")]
    pub refresh_backoff_base_ms: u64,
    /// Service name used for platform secure storage entries.
    #[serde(default = "default_storage_service_name")]
    pub storage_service_name: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_url() -> String {
    resolve_api_url(None, COMPILE_TIME_API_URL, cfg!(debug_assertions))
}

fn default_app_origin() -> String {
    DEFAULT_APP_ORIGIN.to_string()
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_refresh_ttl_ms() -> u64 {
    DEFAULT_REFRESH_TTL_MS
}

fn default_refresh_max_attempts() -> u32 {
    DEFAULT_REFRESH_MAX_ATTEMPTS
}

fn default_refresh_backoff_base_ms() -> u64 {
    DEFAULT_REFRESH_BACKOFF_BASE_MS
}

fn default_storage_service_name() -> String {
    DEFAULT_STORAGE_SERVICE_NAME.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_url: default_api_url(),
            app_origin: default_app_origin(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            refresh_ttl_ms: DEFAULT_REFRESH_TTL_MS,
            refresh_max_attempts: DEFAULT_REFRESH_MAX_ATTEMPTS,
            refresh_backoff_base_ms: DEFAULT_REFRESH_BACKOFF_BASE_MS,
            storage_service_name: default_storage_service_name(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file (if present), then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("STRIDE_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(api_url) = std::env::var("STRIDE_API_URL") {
            if !api_url.trim().is_empty() {
                self.api_url = resolve_api_url(Some(&api_url), None, cfg!(debug_assertions));
            }
        }
    }

    fn validate(&self) -> CoreResult<()> {
        if self.refresh_max_attempts == 0 {
            return Err(CoreError::Config(
                "refresh_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(CoreError::Config(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The absolute API base URL. Relative `api_url` values are joined onto
    /// `app_origin`.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        let invalid = |url: &str| {
            let url = url.to_string();
            move |source| CoreError::InvalidApiUrl { url, source }
        };

        if self.api_url.starts_with('/') {
            let origin = Url::parse(&self.app_origin).map_err(invalid(&self.app_origin))?;
            return origin.join(&self.api_url).map_err(invalid(&self.api_url));
        }
        Url::parse(&self.api_url).map_err(invalid(&self.api_url))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_millis(self.refresh_ttl_ms)
    }

    pub fn refresh_backoff_base(&self) -> Duration {
        Duration::from_millis(self.refresh_backoff_base_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_runtime_override_wins() {
        assert_eq!(
            resolve_api_url(Some("https://api.stride.fit/"), Some("https://build"), true),
            "https://api.stride.fit"
        );
    }

    #[test]
    fn test_resolve_compile_time_before_defaults() {
        assert_eq!(
            resolve_api_url(None, Some("https://build.stride.fit"), false),
            "https://build.stride.fit"
        );
    }

    #[test]
    fn test_resolve_blank_override_ignored() {
        assert_eq!(resolve_api_url(Some("   "), None, true), DEV_API_URL);
    }

    #[test]
    fn test_resolve_release_falls_back_to_relative_path() {
        assert_eq!(resolve_api_url(None, None, false), PRODUCTION_API_PATH);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.refresh_ttl(), Duration::from_millis(7_000));
        assert_eq!(config.refresh_max_attempts, 2);
        assert_eq!(config.refresh_backoff_base(), Duration::from_millis(300));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_relative_api_url_joins_origin() {
        let config = Config {
            api_url: "/api".to_string(),
            app_origin: "https://app.stride.fit".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.api_base_url().unwrap().as_str(),
            "https://app.stride.fit/api"
        );
    }

    #[test]
    fn test_absolute_api_url_parses() {
        let config = Config {
            api_url: "https://api.stride.fit".to_string(),
            ..Config::default()
        };
        assert_eq!(config.api_base_url().unwrap().host_str(), Some("api.stride.fit"));
    }

    #[test]
    fn test_invalid_api_url() {
        let config = Config {
            api_url: "not a valid url".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.api_base_url(),
            Err(CoreError::InvalidApiUrl { url, .. }) if url == "not a valid url"
        ));
    }

    #[test]
    fn test_config_load_from_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "log_level": "debug", "refresh_ttl_ms": 5000 }"#)
            .unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.refresh_ttl_ms, 5000);
        assert_eq!(config.refresh_max_attempts, 2);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            request_timeout_ms: 2_500,
            ..Config::default()
        };
        config.save(&paths).unwrap();

        let loaded = Config::load(&paths).unwrap();
        assert_eq!(loaded.request_timeout_ms, 2_500);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        Config {
            refresh_max_attempts: 0,
            ..Config::default()
        }
        .save(&paths)
        .unwrap();

        assert!(matches!(Config::load(&paths), Err(CoreError::Config(_))));
    }
}
