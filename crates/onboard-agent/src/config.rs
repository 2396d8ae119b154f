//! Agent configuration loading from file and environment variables.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level agent configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Where the device's persisted state lives.
    #[serde(default)]
    pub device: DeviceConfig,

    /// File names relative to `device.base_dir`.
    #[serde(default)]
    pub files: FileNames,

    /// Backoff settings for controller requests.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Public IP information lookup.
    #[serde(default)]
    pub geolocation: GeolocationConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Directory holding credentials, inputs and outputs.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
}

/// Names of every file the agent reads or writes.
///
/// The defaults are the names the other device agents expect.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileNames {
    pub onboard_cert: String,
    pub onboard_key: String,
    pub device_cert: String,
    pub device_key: String,
    pub root_cert: String,
    pub server: String,
    pub promiscuous_marker: String,
    pub endpoint_map: String,
    pub network_config: String,
    pub uuid: String,
    pub client_ip: String,
    pub hw_status: String,
    pub sw_status: String,
}

/// Exponential backoff parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Base time unit of the backoff formula, in milliseconds.
    #[serde(default = "default_retry_unit_ms")]
    pub unit_ms: u64,

    /// Ceiling for the delay between two attempts, in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeolocationConfig {
    /// Whether to query the service at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// An ipinfo-compatible JSON endpoint.
    #[serde(default = "default_geolocation_url")]
    pub url: String,

    /// Request timeout, in seconds.
    #[serde(default = "default_geolocation_timeout_secs")]
    pub timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "onboard_agent=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("/opt/onboard/etc")
}

fn default_retry_unit_ms() -> u64 {
    1000
}

fn default_max_delay_secs() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_geolocation_url() -> String {
    "https://ipinfo.io/json".to_string()
}

fn default_geolocation_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
        }
    }
}

impl Default for FileNames {
    fn default() -> Self {
        Self {
            onboard_cert: "onboard.cert.pem".to_string(),
            onboard_key: "onboard.key.pem".to_string(),
            device_cert: "device.cert.pem".to_string(),
            device_key: "device.key.pem".to_string(),
            root_cert: "root-certificate.pem".to_string(),
            server: "server".to_string(),
            promiscuous_marker: "infra".to_string(),
            endpoint_map: "zedserverconfig".to_string(),
            network_config: "zedrouterconfig.json".to_string(),
            uuid: "uuid".to_string(),
            client_ip: "clientIP".to_string(),
            hw_status: "hwstatus.json".to_string(),
            sw_status: "swstatus.json".to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            unit_ms: default_retry_unit_ms(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl RetryConfig {
    pub fn unit(&self) -> Duration {
        Duration::from_millis(self.unit_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_geolocation_url(),
            timeout_secs: default_geolocation_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but cannot be used.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `ONBOARD_BASE_DIR` overrides `device.base_dir`
/// - `ONBOARD_MAX_DELAY_SECS` overrides `retry.max_delay_secs`
/// - `ONBOARD_GEO_ENABLED` overrides `geolocation.enabled`
/// - `ONBOARD_LOG_LEVEL` overrides `logging.level`
/// - `ONBOARD_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if the retry timing would never wait between attempts.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.retry.unit_ms == 0 {
        return Err(ConfigError::Invalid {
            field: "retry.unit_ms",
            reason: "must be at least 1",
        });
    }
    if config.retry.max_delay_secs == 0 {
        return Err(ConfigError::Invalid {
            field: "retry.max_delay_secs",
            reason: "must be at least 1",
        });
    }
    Ok(())
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(dir) = var("ONBOARD_BASE_DIR").filter(|v| !v.trim().is_empty()) {
        config.device.base_dir = PathBuf::from(dir);
    }
    if let Some(secs) = var("ONBOARD_MAX_DELAY_SECS") {
        if let Ok(parsed) = secs.parse() {
            config.retry.max_delay_secs = parsed;
        }
    }
    if let Some(enabled) = var("ONBOARD_GEO_ENABLED") {
        config.geolocation.enabled = enabled == "true" || enabled == "1";
    }
    if let Some(level) = var("ONBOARD_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("ONBOARD_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}
