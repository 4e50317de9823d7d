//! Host configuration loading from file and environment variables.

use academic_db::{
    DeploymentMode, PragmaSettings, StoreOptions, MAX_BUSY_TIMEOUT_MS, MODE_ENV_VAR, NODE_ENV_VAR,
};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level host configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Deployment settings.
    #[serde(default)]
    pub deployment: DeploymentConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Deployment configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentConfig {
    /// Deployment mode name. Only `"production"` selects production.
    #[serde(default)]
    pub mode: Option<String>,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database file. When unset, the path is chosen from the deployment mode.
    #[serde(default)]
    pub path: Option<String>,

    /// Page cache size passed to `PRAGMA cache_size`.
    #[serde(default = "default_cache_size")]
    pub cache_size: i64,

    /// Busy timeout for the database handle, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Refuse to start if any startup pragma is rejected.
    #[serde(default)]
    pub strict_pragmas: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "academic_db=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_cache_size() -> i64 {
    PragmaSettings::default().cache_size
}

fn default_busy_timeout_ms() -> u32 {
    PragmaSettings::default().busy_timeout_ms
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            cache_size: default_cache_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
            strict_pragmas: false,
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

impl Config {
    /// The deployment mode this configuration selects.
    pub fn deployment_mode(&self) -> DeploymentMode {
        self.deployment
            .mode
            .as_deref()
            .map(DeploymentMode::parse)
            .unwrap_or_default()
    }

    /// Store options derived from the database section.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            path: self.database.path.as_ref().map(PathBuf::from),
            pragmas: PragmaSettings {
                cache_size: self.database.cache_size,
                busy_timeout_ms: self.database.busy_timeout_ms,
                strict: self.database.strict_pragmas,
            },
            ..StoreOptions::default()
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

    /// A setting is outside the range the database accepts.
    #[error("invalid config value for {key}: {reason}")]
    Invalid {
        /// Dotted config key.
        key: &'static str,
        /// Why the value was refused.
        reason: String,
    },
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `ACADEMIC_ENV` (or `NODE_ENV` when unset) overrides `deployment.mode`
/// - `ACADEMIC_DB_PATH` overrides `database.path`
/// - `ACADEMIC_DB_CACHE_SIZE` overrides `database.cache_size`
/// - `ACADEMIC_DB_BUSY_TIMEOUT_MS` overrides `database.busy_timeout_ms`
/// - `ACADEMIC_DB_STRICT_PRAGMAS` overrides `database.strict_pragmas` (set to "true" to enable)
/// - `ACADEMIC_LOG_LEVEL` overrides `logging.level`
/// - `ACADEMIC_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed,
/// or if the resulting settings are out of range.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`], reading overrides through `env`.
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_config_with(
    path: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
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

    if let Some(mode) = env(MODE_ENV_VAR).or_else(|| env(NODE_ENV_VAR)) {
        config.deployment.mode = Some(mode);
    }
    if let Some(db_path) = env("ACADEMIC_DB_PATH").filter(|p| !p.trim().is_empty()) {
        config.database.path = Some(db_path);
    }
    if let Some(cache_size) = env("ACADEMIC_DB_CACHE_SIZE") {
        match cache_size.parse() {
            Ok(parsed) => config.database.cache_size = parsed,
            Err(_) => tracing::warn!(value = %cache_size, "ignoring invalid ACADEMIC_DB_CACHE_SIZE"),
        }
    }
    if let Some(timeout) = env("ACADEMIC_DB_BUSY_TIMEOUT_MS") {
        match timeout.parse() {
            Ok(parsed) => config.database.busy_timeout_ms = parsed,
            Err(_) => tracing::warn!(value = %timeout, "ignoring invalid ACADEMIC_DB_BUSY_TIMEOUT_MS"),
        }
    }
    if let Some(strict) = env("ACADEMIC_DB_STRICT_PRAGMAS") {
        config.database.strict_pragmas = strict == "true" || strict == "1";
    }
    if let Some(level) = env("ACADEMIC_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = env("ACADEMIC_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.database.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
        return Err(ConfigError::Invalid {
            key: "database.busy_timeout_ms",
            reason: format!(
                "{} exceeds the maximum of {MAX_BUSY_TIMEOUT_MS}",
                config.database.busy_timeout_ms
            ),
        });
    }
    Ok(())
}
