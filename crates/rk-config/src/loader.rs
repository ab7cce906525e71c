//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "rolekeeper.toml",
    "config.toml",
    "./config/rolekeeper.toml",
    "/etc/rolekeeper/config.toml",
];

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ROLEKEEPER_CONFIG";

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file()? {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        apply_overrides(&mut config, |key| env::var(key).ok())?;

        Ok(config)
    }

    /// Find the configuration file to use.
    ///
    /// An explicitly requested file that does not exist is an error; the
    /// standard search paths are optional.
    fn find_config_file(&self) -> Result<Option<PathBuf>, ConfigError> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Ok(Some(path.clone()));
            }
            return Err(ConfigError::ValidationError(format!(
                "config file {} does not exist",
                path.display()
            )));
        }

        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Some(path));
            }
            warn!(?path, "{} points at a missing file, ignoring", CONFIG_ENV_VAR);
        }

        Ok(CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists()))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `ROLEKEEPER_*` overrides read through `lookup`.
pub fn apply_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Database
    if let Some(val) = lookup("ROLEKEEPER_DATABASE_URL") {
        config.database.url = val;
    }
    if let Some(val) = lookup("ROLEKEEPER_DATABASE_MAX_CONNECTIONS") {
        config.database.max_connections = parse_var("ROLEKEEPER_DATABASE_MAX_CONNECTIONS", &val)?;
    }
    if let Some(val) = lookup("ROLEKEEPER_DATABASE_BUSY_TIMEOUT_MS") {
        config.database.busy_timeout_ms = parse_var("ROLEKEEPER_DATABASE_BUSY_TIMEOUT_MS", &val)?;
    }

    // Provisioning
    if let Some(val) = lookup("ROLEKEEPER_PROVISIONING_ENABLED") {
        config.provisioning.enabled = parse_var("ROLEKEEPER_PROVISIONING_ENABLED", &val)?;
    }

    Ok(())
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::EnvError(format!("{key} has invalid value '{value}'")))
}
