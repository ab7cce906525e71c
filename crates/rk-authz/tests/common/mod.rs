//! Shared fixtures for the integration tests

#![allow(dead_code)]

use rk_authz::{
    Application, Db, ResourceType, ResourceTypeScope, Role,
};
use rk_config::DatabaseConfig;
use tempfile::TempDir;

/// A migrated database in a temporary directory, removed on drop.
pub struct TestDb {
    pub db: Db,
    _dir: TempDir,
}

pub async fn setup() -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("authz.db").display()),
        max_connections: 4,
        busy_timeout_ms: 5_000,
    };

    let db = Db::connect(&config).await.unwrap();
    db.init_schema().await.unwrap();
    TestDb { db, _dir: dir }
}

pub async fn resource_type(app: &dyn Application, name: &str) -> ResourceType {
    let mut resource_type = ResourceType::new(name);
    app.resource_types().create(&mut resource_type).await.unwrap();
    resource_type
}

pub async fn organization(app: &dyn Application) -> ResourceType {
    resource_type(app, "identity/organization").await
}

pub async fn scope(app: &dyn Application, resource_type: &ResourceType, name: &str) -> ResourceTypeScope {
    let mut scope = ResourceTypeScope::new(resource_type, name);
    app.resource_type_scopes().create(&mut scope).await.unwrap();
    scope
}

pub async fn role(app: &dyn Application, resource_type: &ResourceType, name: &str) -> Role {
    let mut role = Role::new(resource_type, name);
    app.roles().create(&mut role).await.unwrap();
    role
}

pub fn scope_names(scopes: &[ResourceTypeScope]) -> Vec<&str> {
    scopes.iter().map(|s| s.name.as_str()).collect()
}
