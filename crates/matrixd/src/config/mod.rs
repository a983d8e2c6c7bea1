//! Configuration file parsing and structures.
//!
//! matrixd uses a single TOML file. The `[matrix]` table is also the persisted
//! name store: renaming an input or output rewrites its `sources`/`zones` lists
//! in place (see [`TomlFileStore`]).

mod store;

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

#[cfg(test)]
pub use store::MemoryConfigStore;
pub use store::ConfigStore;
pub use store::TomlFileStore;

/// Top-level configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    pub matrix: MatrixConfig,
    #[serde(default)]
    pub api: Option<ApiConfig>,
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

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"matrixd::engine" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

fn default_port() -> u16 {
    23
}

fn default_input_count() -> u8 {
    8
}

fn default_output_count() -> u8 {
    8
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_command_timeout_secs() -> u64 {
    5
}

/// The HDMI matrix itself: where it lives and what its ports are called.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MatrixConfig {
    /// Hostname or IP address of the matrix
    pub host: String,

    /// TCP control port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Opaque key grouping all entities of this matrix (defaults to host)
    #[serde(default)]
    pub entry_id: Option<String>,

    /// Input names, in input order
    #[serde(default)]
    pub sources: Vec<String>,

    /// Output (zone) names, in output order
    #[serde(default)]
    pub zones: Vec<String>,

    /// Number of placeholder inputs used when `sources` is empty.
    /// Not queried from the device.
    #[serde(default = "default_input_count")]
    pub default_input_count: u8,

    /// Number of placeholder outputs used when `zones` is empty
    #[serde(default = "default_output_count")]
    pub default_output_count: u8,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl MatrixConfig {
    /// Configuration with only a host set; everything else defaulted.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            entry_id: None,
            sources: Vec::new(),
            zones: Vec::new(),
            default_input_count: default_input_count(),
            default_output_count: default_output_count(),
            poll_interval_secs: default_poll_interval_secs(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }

    /// Input names as selectable options, synthesizing placeholders when unconfigured.
    pub fn input_names(&self) -> Vec<String> {
        if self.sources.is_empty() {
            placeholder_names("Input", self.default_input_count)
        } else {
            self.sources.clone()
        }
    }

    /// Output names, synthesizing placeholders when unconfigured.
    pub fn output_names(&self) -> Vec<String> {
        if self.zones.is_empty() {
            placeholder_names("Output", self.default_output_count)
        } else {
            self.zones.clone()
        }
    }
}

fn placeholder_names(prefix: &str, count: u8) -> Vec<String> {
    (1..=count).map(|i| format!("{} {}", prefix, i)).collect()
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8565
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
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

    #[error("Failed to write config file {0}: {1}")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to edit TOML: {0}")]
    Edit(#[from] toml_edit::TomlError),

    #[error("Invalid config document: {0}")]
    InvalidDocument(String),
}
