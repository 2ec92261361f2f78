//! Configuration module for the Powervault-MQTT bridge
//!
//! Loads configuration from a TOML file with the following sections:
//! - [default] - General settings (log_level)
//! - [powervault] - Powervault cloud API settings
//! - [mqtt] - MQTT broker and discovery settings

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Log level for the application
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing LevelFilter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub default: DefaultConfig,
    pub powervault: PowervaultConfig,
    pub mqtt: MqttConfig,
}

/// General application settings
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DefaultConfig {
    /// Log level: TRACE, DEBUG, INFO, WARN, ERROR
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Powervault cloud API configuration
#[derive(Deserialize, Clone)]
pub struct PowervaultConfig {
    /// API key issued by Powervault (required)
    pub api_key: String,

    /// Battery unit to bridge (required, see the `units` subcommand)
    pub unit_id: String,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Refresh interval (e.g., "30s", "1m")
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Per-request HTTP timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Extra attempts for a failed refresh cycle
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_base_url() -> String {
    "https://api.p3.powervault.co.uk/v3".to_string()
}

fn default_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_retries() -> u32 {
    1
}

impl std::fmt::Debug for PowervaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("PowervaultConfig")
            .field("api_key", &"***REDACTED***")
            .field("unit_id", &self.unit_id)
            .field("base_url", &self.base_url)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish()
    }
}

/// MQTT broker configuration
#[derive(Deserialize, Clone)]
pub struct MqttConfig {
    /// MQTT root topic (e.g., "powervault")
    #[serde(default = "default_mqtt_root")]
    pub root: String,

    /// MQTT broker hostname
    pub host: Option<String>,

    /// MQTT broker port (default 1883)
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Unix socket path, takes precedence over host
    pub socket: Option<String>,

    /// MQTT username (empty disables authentication)
    #[serde(default)]
    pub username: String,

    /// MQTT password
    #[serde(default)]
    pub password: String,

    /// Home Assistant discovery prefix
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
}

fn default_mqtt_root() -> String {
    "powervault".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

impl std::fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MqttConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("socket", &self.socket)
            .field("username", &self.username)
            .field("password", &"***REDACTED***")
            .field("root", &self.root)
            .field("discovery_prefix", &self.discovery_prefix)
            .finish()
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the config.toml file
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(
                path.to_string_lossy().to_string(),
            ));
        }

        let contents =
            fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration logic (semantic validation beyond type checks)
    fn validate(&self) -> Result<(), ConfigError> {
        if self.powervault.api_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "powervault.api_key must not be empty".to_string(),
            ));
        }

        if self.powervault.unit_id.is_empty() {
            return Err(ConfigError::ValidationError(
                "powervault.unit_id must not be empty".to_string(),
            ));
        }

        // Scheduling works in whole seconds
        if self.powervault.interval < Duration::from_secs(1) {
            return Err(ConfigError::ValidationError(
                "powervault.interval must be at least 1s".to_string(),
            ));
        }

        let has_host = self.mqtt.host.as_ref().is_some_and(|h| !h.is_empty());
        if !has_host && self.mqtt.socket.is_none() {
            return Err(ConfigError::ValidationError(
                "mqtt.host or mqtt.socket must be set".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
