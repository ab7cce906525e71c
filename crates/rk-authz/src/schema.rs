//! Authorization Schema
//!
//! Idempotent DDL for the authorization tables. Uniqueness of names is only
//! enforced among live rows, so a soft-deleted role or resource type does not
//! block re-creating one with the same name.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::{AuthzError, Result};

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS resource_type (
        resource_type_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_resource_type_name_live
        ON resource_type(name) WHERE deleted_at IS NULL
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS resource_type_scope (
        resource_type_scope_id TEXT PRIMARY KEY,
        resource_type_id TEXT NOT NULL REFERENCES resource_type(resource_type_id),
        name TEXT NOT NULL,
        description TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_resource_type_scope_name_live
        ON resource_type_scope(resource_type_id, name) WHERE deleted_at IS NULL
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role (
        role_id TEXT PRIMARY KEY,
        resource_type_id TEXT NOT NULL REFERENCES resource_type(resource_type_id),
        name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_role_name_live
        ON role(resource_type_id, name) WHERE deleted_at IS NULL
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role_scope (
        role_id TEXT NOT NULL REFERENCES role(role_id),
        scope_id TEXT NOT NULL REFERENCES resource_type_scope(resource_type_scope_id),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT,
        PRIMARY KEY (role_id, scope_id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_role_scope_scope_id ON role_scope(scope_id)
    "#,
];

/// Create the authorization tables and indexes if they do not exist yet.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| AuthzError::storage("initialize schema", e))?;
    }

    info!(tables = 4, "Authorization schema initialized");
    Ok(())
}
