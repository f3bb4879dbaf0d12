//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub websocket: WebSocketConfig,

    #[serde(default)]
    pub map: MapConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend REST API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL including the `/api` prefix
    #[serde(default = "default_api_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Live feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Socket endpoint without the token query
    #[serde(default = "default_ws_url")]
    pub url: String,

    #[serde(default = "default_reconnect_base")]
    pub reconnect_base_ms: u64,

    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_ms: u64,

    /// 0 retries forever
    #[serde(default)]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
}

fn default_ws_url() -> String {
    "ws://localhost:8000/ws/connect".to_string()
}

fn default_reconnect_base() -> u64 {
    1000
}

fn default_reconnect_max() -> u64 {
    30_000
}

fn default_ping_interval() -> u64 {
    30
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: default_ws_url(),
            reconnect_base_ms: default_reconnect_base(),
            reconnect_max_ms: default_reconnect_max(),
            max_reconnect_attempts: 0,
            ping_interval_secs: default_ping_interval(),
        }
    }
}

/// Map provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MapConfig {
    #[serde(default)]
    pub access_token: String,

    #[serde(default = "default_map_style")]
    pub style: String,

    #[serde(default)]
    pub center_latitude: f64,

    #[serde(default)]
    pub center_longitude: f64,

    #[serde(default = "default_zoom")]
    pub zoom: f64,
}

fn default_map_style() -> String {
    "mapbox/streets-v12".to_string()
}

fn default_zoom() -> f64 {
    12.0
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            style: default_map_style(),
            center_latitude: 0.0,
            center_longitude: 0.0,
            zoom: default_zoom(),
        }
    }
}

impl MapConfig {
    /// Mapbox Static Images URL centered on a point; `None` without a token
    ///
    /// The browser dashboard builds the same URL from `TRANSIT_MAP_TOKEN` and
    /// `TRANSIT_MAP_STYLE` at compile time.
    pub fn static_image_url(
        &self,
        latitude: f64,
        longitude: f64,
        width: u32,
        height: u32,
    ) -> Option<String> {
        if self.access_token.trim().is_empty() {
            return None;
        }
        Some(format!(
            "https://api.mapbox.com/styles/v1/{}/static/{:.6},{:.6},{:.2}/{}x{}?access_token={}",
            self.style,
            longitude,
            latitude,
            self.zoom,
            width,
            height,
            urlencoding::encode(self.access_token.trim())
        ))
    }
}

/// Where the access token lives between runs
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_token_file")]
    pub token_file: String,
}

fn default_token_file() -> String {
    dirs::data_local_dir()
        .map(|p| {
            p.join("transit")
                .join(crate::session::TOKEN_KEY)
                .to_string_lossy()
                .to_string()
        })
        .unwrap_or_else(|| format!("./.transit/{}", crate::session::TOKEN_KEY))
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("transit").join("config.toml")),
            Some(PathBuf::from("/etc/transit/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("TRANSIT_API_URL") {
            self.api.base_url = url;
        }
        if let Ok(url) = std::env::var("TRANSIT_WS_URL") {
            self.websocket.url = url;
        }
        if let Ok(token) = std::env::var("TRANSIT_MAP_TOKEN") {
            self.map.access_token = token;
        }
        if let Ok(style) = std::env::var("TRANSIT_MAP_STYLE") {
            self.map.style = style;
        }
        if let Ok(path) = std::env::var("TRANSIT_TOKEN_FILE") {
            self.session.token_file = path;
        }
        if let Ok(level) = std::env::var("TRANSIT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TRANSIT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Transit Dashboard Configuration
#
# Environment variables override these settings:
# - TRANSIT_API_URL
# - TRANSIT_WS_URL
# - TRANSIT_MAP_TOKEN
# - TRANSIT_MAP_STYLE
# - TRANSIT_TOKEN_FILE
# - TRANSIT_LOG_LEVEL
# - TRANSIT_LOG_FORMAT

[api]
# Backend REST base URL (including the /api prefix)
base_url = "http://localhost:8000/api"

# Request timeout in seconds
request_timeout_secs = 30

[websocket]
# Live feed endpoint; the access token is appended as ?token=
url = "ws://localhost:8000/ws/connect"

# Reconnect backoff: base delay doubles per attempt up to the maximum (ms)
reconnect_base_ms = 1000
reconnect_max_ms = 30000

# Give up after this many failed attempts (0 = never give up)
max_reconnect_attempts = 0

# Keepalive ping interval in seconds
ping_interval_secs = 30

[map]
# Map provider access token (Mapbox), used by `transit map`. The browser
# dashboard reads TRANSIT_MAP_TOKEN / TRANSIT_MAP_STYLE when it is built.
access_token = ""
style = "mapbox/streets-v12"
center_latitude = 0.0
center_longitude = 0.0
zoom = 12.0

[session]
# Where the access token is kept between runs
# token_file = "~/.local/share/transit/access_token"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:8000/api");
        assert_eq!(config.websocket.url, "ws://localhost:8000/ws/connect");
        assert_eq!(config.websocket.reconnect_base_ms, 1000);
        assert_eq!(config.websocket.reconnect_max_ms, 30_000);
        assert_eq!(config.websocket.max_reconnect_attempts, 0);
        assert!(config.session.token_file.ends_with("access_token"));
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.websocket.ping_interval_secs, 30);
        assert_eq!(config.map.style, "mapbox/streets-v12");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config = Config::parse(
            r#"
            [api]
            base_url = "https://transit.example.com/api"

            [websocket]
            max_reconnect_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://transit.example.com/api");
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.websocket.max_reconnect_attempts, 5);
        assert_eq!(config.websocket.reconnect_base_ms, 1000);
        assert_eq!(config.map.zoom, 12.0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/transit.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api\nbase_url = ").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_static_map_url() {
        let mut map = MapConfig::default();
        assert!(map.static_image_url(12.97, 77.59, 800, 500).is_none());

        map.access_token = "pk.abc".to_string();
        map.zoom = 13.0;
        let url = map.static_image_url(12.97, 77.59, 800, 500).unwrap();
        assert_eq!(
            url,
            "https://api.mapbox.com/styles/v1/mapbox/streets-v12/static/77.590000,12.970000,13.00/800x500?access_token=pk.abc"
        );
    }
}
