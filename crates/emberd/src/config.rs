//! Configuration file parsing and structures.
//!
//! emberd uses TOML for declarative configuration. Each integration section
//! is a map keyed by entry id, so the same integration can run against
//! several vendor accounts or devices; every entry owns its own poller.

use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use tracing_subscriber::filter::LevelFilter;

/// Default polling period for the air-quality integration, in seconds.
pub const DEFAULT_UPDATE_INTERVAL: u64 = 900;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Local HTTP API; absent disables it
    #[serde(default)]
    pub api: Option<ApiConfig>,

    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,
}

/// Local HTTP API configuration
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_listen")]
    pub listen: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8565
}

/// Integration configuration container
///
/// Key = entry id, value = per-entry configuration.
#[derive(Debug, Default, Deserialize)]
pub struct IntegrationsConfig {
    #[serde(default)]
    pub airquality: HashMap<String, AirQualityEntry>,

    #[serde(default)]
    pub printer: HashMap<String, PrinterEntry>,
}

/// One configured air-quality station
#[derive(Debug, Clone, Deserialize)]
pub struct AirQualityEntry {
    /// Vendor API token
    pub token: String,

    /// Station id, as selected during the config flow
    pub station_id: i64,

    /// Display name; defaults to the entry id
    #[serde(default)]
    pub name: Option<String>,

    /// Polling period in seconds
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// One configured 3D-printer controller
#[derive(Debug, Clone, Deserialize)]
pub struct PrinterEntry {
    /// Controller base URL (e.g. "http://octopi.local")
    pub base_url: String,

    /// Controller API key
    pub api_key: String,

    /// Display name; defaults to the entry id
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_update_interval() -> u64 {
    DEFAULT_UPDATE_INTERVAL
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        toml::from_str(&contents).map_err(ConfigError::Parse)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [logging]
            level = "debug"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.api.is_none());
        assert!(config.integrations.airquality.is_empty());
        assert!(config.integrations.printer.is_empty());
    }

    #[test]
    fn test_parse_airquality_entry_with_defaults() {
        let toml = r#"
            [integrations.airquality.beijing]
            token = "secret"
            station_id = 1451
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        let entry = config.integrations.airquality.get("beijing").unwrap();
        assert_eq!(entry.token, "secret");
        assert_eq!(entry.station_id, 1451);
        assert_eq!(entry.update_interval, 900);
        assert!(entry.enabled);
        assert!(entry.name.is_none());
    }

    #[test]
    fn test_parse_printer_entry() {
        let toml = r#"
            [integrations.printer.workshop]
            base_url = "http://octopi.local"
            api_key = "abc123"
            name = "Workshop printer"
            enabled = false
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        let entry = config.integrations.printer.get("workshop").unwrap();
        assert_eq!(entry.base_url, "http://octopi.local");
        assert_eq!(entry.name.as_deref(), Some("Workshop printer"));
        assert!(!entry.enabled);
    }

    #[test]
    fn test_parse_api_section_defaults() {
        let toml = r#"
            [api]
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        let api = config.api.unwrap();
        assert_eq!(api.listen, "127.0.0.1");
        assert_eq!(api.port, 8565);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [logging]
            level = "warn"

            [integrations.airquality.oslo]
            token = "t"
            station_id = 3162
            update_interval = 300
            "#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(
            config
                .integrations
                .airquality
                .get("oslo")
                .unwrap()
                .update_interval,
            300
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::from_file("/nonexistent/emberd.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
    }
}
