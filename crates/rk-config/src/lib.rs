//! RoleKeeper Configuration System
//!
//! TOML-based configuration with environment variable overrides.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::{apply_overrides, ConfigLoader, CONFIG_ENV_VAR};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Environment variable error: {0}")]
    EnvError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub provisioning: ProvisioningConfig,
}

/// Relational storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection URL, e.g. `sqlite://data/rolekeeper.db` or `sqlite::memory:`
    pub url: String,
    /// Maximum pooled connections
    pub max_connections: u32,
    /// How long a statement waits on a locked database before failing
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/rolekeeper.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Well-known resource types, scopes and roles created at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    pub enabled: bool,
    pub resource_types: Vec<ResourceTypeSeed>,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resource_types: vec![ResourceTypeSeed {
                name: "identity/organization".to_string(),
                description: Some("An organization of identities".to_string()),
                scopes: vec![
                    ScopeSeed::new("manage"),
                    ScopeSeed::new("view"),
                ],
                roles: vec![RoleSeed {
                    name: "owner".to_string(),
                    scopes: vec!["manage".to_string(), "view".to_string()],
                }],
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTypeSeed {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub scopes: Vec<ScopeSeed>,
    #[serde(default)]
    pub roles: Vec<RoleSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeSeed {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ScopeSeed {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// A role and the scope names (of its resource type) it grants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSeed {
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        let loader = ConfigLoader::new();
        loader.load()
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError("database.url must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".into(),
            ));
        }

        let mut seen_types = HashSet::new();
        for resource_type in &self.provisioning.resource_types {
            if resource_type.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "resource type name must not be empty".into(),
                ));
            }
            if !seen_types.insert(resource_type.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "resource type '{}' is declared twice",
                    resource_type.name
                )));
            }

            let scopes: HashSet<&str> = resource_type.scopes.iter().map(|s| s.name.as_str()).collect();
            for role in &resource_type.roles {
                if role.name.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "role without a name under resource type '{}'",
                        resource_type.name
                    )));
                }
                if let Some(missing) = role.scopes.iter().find(|s| !scopes.contains(s.as_str())) {
                    return Err(ConfigError::ValidationError(format!(
                        "role '{}' grants scope '{}' which resource type '{}' does not declare",
                        role.name, missing, resource_type.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# RoleKeeper Configuration
# Environment variables override these settings

[database]
url = "sqlite://data/rolekeeper.db"
max_connections = 5
busy_timeout_ms = 5000

[provisioning]
enabled = true

[[provisioning.resource_types]]
name = "identity/organization"
description = "An organization of identities"

[[provisioning.resource_types.scopes]]
name = "manage"

[[provisioning.resource_types.scopes]]
name = "view"

[[provisioning.resource_types.roles]]
name = "owner"
scopes = ["manage", "view"]
"#
        .to_string()
    }
}
