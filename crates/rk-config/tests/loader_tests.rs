//! Config loader tests: file loading and environment overrides.

use std::collections::HashMap;
use std::io::Write;

use rk_config::{apply_overrides, AppConfig, ConfigError, ConfigLoader};

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_load_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rolekeeper.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"
[database]
url = "sqlite://custom.db"
max_connections = 2

[[provisioning.resource_types]]
name = "identity/team"

[[provisioning.resource_types.scopes]]
name = "contribute"

[[provisioning.resource_types.roles]]
name = "contributor"
scopes = ["contribute"]
"#
    )
    .unwrap();

    let config = ConfigLoader::with_path(&path).load().unwrap();
    assert_eq!(config.database.max_connections, 2);
    assert_eq!(config.provisioning.resource_types.len(), 1);
    assert_eq!(config.provisioning.resource_types[0].name, "identity/team");
    config.validate().unwrap();
}

#[test]
fn test_missing_explicit_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ConfigLoader::with_path(dir.path().join("absent.toml")).load();
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[database\nurl = ").unwrap();

    let result = AppConfig::from_file(&path);
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_env_overrides_apply() {
    let mut config = AppConfig::default();
    apply_overrides(
        &mut config,
        env_of(&[
            ("ROLEKEEPER_DATABASE_URL", "sqlite::memory:"),
            ("ROLEKEEPER_DATABASE_MAX_CONNECTIONS", "1"),
            ("ROLEKEEPER_DATABASE_BUSY_TIMEOUT_MS", "250"),
            ("ROLEKEEPER_PROVISIONING_ENABLED", "false"),
        ]),
    )
    .unwrap();

    assert_eq!(config.database.url, "sqlite::memory:");
    assert_eq!(config.database.max_connections, 1);
    assert_eq!(config.database.busy_timeout_ms, 250);
    assert!(!config.provisioning.enabled);
}

#[test]
fn test_env_override_with_bad_number_fails() {
    let mut config = AppConfig::default();
    let result = apply_overrides(
        &mut config,
        env_of(&[("ROLEKEEPER_DATABASE_MAX_CONNECTIONS", "many")]),
    );
    assert!(matches!(result, Err(ConfigError::EnvError(_))));
}

#[test]
fn test_no_overrides_leaves_defaults() {
    let mut config = AppConfig::default();
    apply_overrides(&mut config, env_of(&[])).unwrap();
    assert_eq!(config.database.url, AppConfig::default().database.url);
}
