use crate::agent::config::{ChatConfig, ModelConfig};
use crate::database::DatabaseConfig;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub enum LogLevel {
    #[serde(rename = "trace")]
    Trace,
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "info")]
    Info,
    #[default]
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_console_output")]
    pub console_output: bool,
    #[serde(default = "default_file_output")]
    pub file_output: bool,
    #[serde(default = "default_log_file_path")]
    pub file_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            console_output: default_console_output(),
            file_output: default_file_output(),
            file_path: default_log_file_path(),
        }
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_console_output() -> bool {
    true
}

fn default_file_output() -> bool {
    false
}

fn default_log_file_path() -> String {
    match Config::get_config_directory() {
        Some(config_dir) => config_dir.join("askdb.log").to_string_lossy().to_string(),
        None => "askdb.log".to_string(),
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Conversations kept in memory before the least recently active is dropped
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: default_bind_address(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_max_sessions() -> usize {
    1000
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// `~/.config/askdb`
    pub fn get_config_directory() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".config").join("askdb"))
    }

    pub fn default_config_path() -> Option<PathBuf> {
        Self::get_config_directory().map(|dir| dir.join("config.toml"))
    }

    /// Load configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist; a missing default file yields the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config_path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_config_path() {
                Some(path) => (path, false),
                None => return Ok(Config::default()),
            },
        };

        if !required && !config_path.exists() {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
            path: config_path.clone(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: config_path.clone(),
            source,
        })?;

        debug!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string(self)?;
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        ensure_config_dir(path).map_err(io_error)?;
        let mut file = File::create(path).map_err(io_error)?;
        file.write_all(toml.as_bytes()).map_err(io_error)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.model.validate().map_err(ConfigError::Invalid)?;
        self.chat.validate().map_err(ConfigError::Invalid)?;

        if self.database.query_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "query_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.server.max_sessions == 0 {
            return Err(ConfigError::Invalid(
                "max_sessions must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn ensure_config_dir(config_path: &Path) -> io::Result<()> {
    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
