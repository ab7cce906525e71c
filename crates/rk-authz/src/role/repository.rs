//! Role Repository

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{parse_uuid, AuthzError, Result};
use crate::lifecycle::{select_live, Lifecycle};
use crate::resource::repository::{parse_resource_type, parse_scope};
use crate::resource::ResourceTypeScope;
use crate::role::entity::{Role, RoleScope};
use crate::session::Session;

/// Storage interface for roles and their scope grants.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Returns `Ok(true)` for a live role, `NotFound` otherwise.
    ///
    /// The error is authoritative; the boolean only confirms it.
    async fn exists(&self, id: Uuid) -> Result<bool>;

    /// Load a live role together with its resource type.
    async fn load(&self, id: Uuid) -> Result<Role>;

    /// Persist a new role, assigning an id if it has none.
    async fn create(&self, role: &mut Role) -> Result<()>;

    /// Merge the supplied fields onto the persisted role.
    ///
    /// A non-empty name overwrites. The resource type cannot change: a nil
    /// `resource_type_id` is ignored, a different one is rejected.
    async fn save(&self, role: &Role) -> Result<()>;

    /// Soft-delete a role. Deleting an absent role succeeds.
    async fn delete(&self, id: Uuid) -> Result<()>;

    async fn list(&self) -> Result<Vec<Role>>;

    /// Find a live role by its name and its resource type's name.
    async fn lookup(&self, name: &str, resource_type_name: &str) -> Result<Role>;

    async fn list_scopes(&self, role: &Role) -> Result<Vec<ResourceTypeScope>>;

    /// Grant a scope. Granting the same scope twice fails with a unique
    /// violation (`AuthzError::is_unique_violation`).
    ///
    /// The role and the scope must both be live (`NotFound` otherwise) and
    /// belong to the same resource type (`Internal` otherwise).
    async fn add_scope(&self, role: &Role, scope: &ResourceTypeScope) -> Result<()>;
}

const ROLE_SELECT: &str = "SELECT r.role_id, r.resource_type_id, r.name, \
     r.created_at, r.updated_at, r.deleted_at, \
     rt.resource_type_id AS rt_resource_type_id, rt.name AS rt_name, \
     rt.description AS rt_description, rt.created_at AS rt_created_at, \
     rt.updated_at AS rt_updated_at, rt.deleted_at AS rt_deleted_at \
     FROM role r \
     JOIN resource_type rt ON rt.resource_type_id = r.resource_type_id";

const ROLE_COUNT: &str = "SELECT COUNT(*) AS matches \
     FROM role r \
     JOIN resource_type rt ON rt.resource_type_id = r.resource_type_id";

const GRANTED_SCOPES_SELECT: &str = "SELECT s.resource_type_scope_id, s.resource_type_id, s.name, \
     s.description, s.created_at, s.updated_at, s.deleted_at \
     FROM role_scope rs \
     JOIN role r ON r.role_id = rs.role_id \
     JOIN resource_type_scope s ON s.resource_type_scope_id = rs.scope_id";

/// Live roles whose resource type is live as well.
fn live_roles<'args>(select: &str) -> QueryBuilder<'args, Sqlite> {
    select_live(select, &["r", "rt"])
}

fn parse_role(row: &SqliteRow) -> Result<Role> {
    let get = |name: &str| -> Result<String> {
        row.try_get(name)
            .map_err(|e| AuthzError::storage(format!("decode column {name}"), e))
    };

    let resource_type = parse_resource_type(row, "rt_")?;
    Ok(Role {
        role_id: parse_uuid("role_id", &get("role_id")?)?,
        resource_type_id: parse_uuid("resource_type_id", &get("resource_type_id")?)?,
        resource_type: Some(resource_type),
        name: get("name")?,
        lifecycle: Lifecycle::from_row(row, "")?,
    })
}

/// SQL implementation of [`RoleRepository`].
#[derive(Clone)]
pub struct SqlRoleRepository {
    session: Session,
}

impl SqlRoleRepository {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    async fn fetch_role(&self, mut query: QueryBuilder<'_, Sqlite>, key: &str) -> Result<Role> {
        let mut conn = self.session.acquire().await?;
        let row = query
            .build()
            .fetch_optional(conn.executor()?)
            .await
            .map_err(|e| AuthzError::storage(format!("load role {key}"), e))?
            .ok_or_else(|| AuthzError::not_found("role", key))?;

        parse_role(&row)
    }
}

#[async_trait]
impl RoleRepository for SqlRoleRepository {
    async fn exists(&self, id: Uuid) -> Result<bool> {
        let mut conn = self.session.acquire().await?;
        let mut query = live_roles(ROLE_COUNT);
        query.push(" AND r.role_id = ").push_bind(id.to_string());

        let matches: i64 = query
            .build()
            .fetch_one(conn.executor()?)
            .await
            .and_then(|row| row.try_get::<i64, _>("matches"))
            .map_err(|e| AuthzError::storage(format!("unable to verify if role {id} exists"), e))?;

        if matches == 0 {
            return Err(AuthzError::not_found("role", id.to_string()));
        }
        Ok(true)
    }

    async fn load(&self, id: Uuid) -> Result<Role> {
        let mut query = live_roles(ROLE_SELECT);
        query.push(" AND r.role_id = ").push_bind(id.to_string());
        self.fetch_role(query, &id.to_string()).await
    }

    async fn create(&self, role: &mut Role) -> Result<()> {
        if role.role_id.is_nil() {
            role.role_id = Uuid::new_v4();
        }
        role.lifecycle = Lifecycle::now();

        let mut conn = self.session.acquire().await?;
        let result = sqlx::query(
            "INSERT INTO role (role_id, resource_type_id, name, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(role.role_id.to_string())
        .bind(role.resource_type_id.to_string())
        .bind(&role.name)
        .bind(role.lifecycle.created_at)
        .bind(role.lifecycle.updated_at)
        .execute(conn.executor()?)
        .await;

        if let Err(err) = result {
            error!(
                role_id = %role.role_id,
                resource_type_id = %role.resource_type_id,
                error = %err,
                "unable to create the role"
            );
            return Err(AuthzError::storage(format!("create role {}", role.role_id), err));
        }

        debug!(role_id = %role.role_id, name = %role.name, "Role created");
        Ok(())
    }

    async fn save(&self, role: &Role) -> Result<()> {
        let current = match self.load(role.role_id).await {
            Ok(current) => current,
            Err(err) => {
                error!(role_id = %role.role_id, error = %err, "unable to update role");
                return Err(err);
            }
        };

        if !role.resource_type_id.is_nil() && role.resource_type_id != current.resource_type_id {
            error!(
                role_id = %role.role_id,
                stored = %current.resource_type_id,
                requested = %role.resource_type_id,
                "refusing to change the resource type of a role"
            );
            return Err(AuthzError::internal(format!(
                "resource type of role {} cannot change",
                role.role_id
            )));
        }

        let name = if role.name.is_empty() { &current.name } else { &role.name };

        let mut conn = self.session.acquire().await?;
        let result = sqlx::query(
            "UPDATE role SET name = ?, updated_at = ? \
             WHERE role_id = ? AND deleted_at IS NULL",
        )
        .bind(name)
        .bind(Utc::now())
        .bind(role.role_id.to_string())
        .execute(conn.executor()?)
        .await
        .map_err(|e| AuthzError::storage(format!("save role {}", role.role_id), e))?;

        // Deleted between the load and the update.
        if result.rows_affected() == 0 {
            return Err(AuthzError::not_found("role", role.role_id.to_string()));
        }

        debug!(role_id = %role.role_id, "Role saved");
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let now = Utc::now();
        let mut conn = self.session.acquire().await?;
        let result = sqlx::query(
            "UPDATE role SET deleted_at = ?, updated_at = ? \
             WHERE role_id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .execute(conn.executor()?)
        .await;

        match result {
            Ok(done) => {
                debug!(role_id = %id, deleted = done.rows_affected(), "Role deleted");
                Ok(())
            }
            Err(err) => {
                error!(role_id = %id, error = %err, "unable to delete the role");
                Err(AuthzError::storage(format!("delete role {id}"), err))
            }
        }
    }

    async fn list(&self) -> Result<Vec<Role>> {
        let mut conn = self.session.acquire().await?;
        let mut query = live_roles(ROLE_SELECT);
        query.push(" ORDER BY r.name, r.role_id");

        let rows = query
            .build()
            .fetch_all(conn.executor()?)
            .await
            .map_err(|e| AuthzError::storage("list roles", e))?;

        rows.iter().map(parse_role).collect()
    }

    async fn lookup(&self, name: &str, resource_type_name: &str) -> Result<Role> {
        let mut query = live_roles(ROLE_SELECT);
        query
            .push(" AND r.name = ")
            .push_bind(name.to_string())
            .push(" AND rt.name = ")
            .push_bind(resource_type_name.to_string());
        self.fetch_role(query, &format!("{resource_type_name}/{name}")).await
    }

    async fn list_scopes(&self, role: &Role) -> Result<Vec<ResourceTypeScope>> {
        let mut conn = self.session.acquire().await?;
        let mut query = select_live(GRANTED_SCOPES_SELECT, &["rs", "r", "s"]);
        query
            .push(" AND rs.role_id = ")
            .push_bind(role.role_id.to_string())
            .push(" ORDER BY s.name");

        let rows = query
            .build()
            .fetch_all(conn.executor()?)
            .await
            .map_err(|e| AuthzError::storage(format!("list scopes of role {}", role.role_id), e))?;

        rows.iter().map(parse_scope).collect()
    }

    async fn add_scope(&self, role: &Role, scope: &ResourceTypeScope) -> Result<()> {
        let grant = RoleScope::new(role, scope);
        let mut conn = self.session.acquire().await?;

        // Both ends of the grant must be live and share one resource type.
        let mut live_role = select_live("SELECT r.resource_type_id FROM role r", &["r"]);
        live_role.push(" AND r.role_id = ").push_bind(grant.role_id.to_string());
        let role_type: String = live_role
            .build()
            .fetch_optional(conn.executor()?)
            .await
            .and_then(|row| row.map(|row| row.try_get::<String, _>("resource_type_id")).transpose())
            .map_err(|e| AuthzError::storage(format!("verify role {}", grant.role_id), e))?
            .ok_or_else(|| AuthzError::not_found("role", grant.role_id.to_string()))?;

        let mut live_scope = select_live(
            "SELECT s.resource_type_id FROM resource_type_scope s",
            &["s"],
        );
        live_scope
            .push(" AND s.resource_type_scope_id = ")
            .push_bind(grant.scope_id.to_string());
        let scope_type: String = live_scope
            .build()
            .fetch_optional(conn.executor()?)
            .await
            .and_then(|row| row.map(|row| row.try_get::<String, _>("resource_type_id")).transpose())
            .map_err(|e| AuthzError::storage(format!("verify scope {}", grant.scope_id), e))?
            .ok_or_else(|| AuthzError::not_found("resource_type_scope", grant.scope_id.to_string()))?;

        let role_type = parse_uuid("resource_type_id", &role_type)?;
        let scope_type = parse_uuid("resource_type_id", &scope_type)?;
        if role_type != scope_type {
            error!(
                role_id = %grant.role_id,
                scope_id = %grant.scope_id,
                role_resource_type = %role_type,
                scope_resource_type = %scope_type,
                "refusing to grant a scope of another resource type"
            );
            return Err(AuthzError::internal(format!(
                "scope {} belongs to resource type {}, role {} to {}",
                grant.scope_id, scope_type, grant.role_id, role_type
            )));
        }

        let result = sqlx::query(
            "INSERT INTO role_scope (role_id, scope_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(grant.role_id.to_string())
        .bind(grant.scope_id.to_string())
        .bind(grant.lifecycle.created_at)
        .bind(grant.lifecycle.updated_at)
        .execute(conn.executor()?)
        .await;

        if let Err(err) = result {
            error!(
                role_id = %grant.role_id,
                scope_id = %grant.scope_id,
                error = %err,
                "unable to create the role scope"
            );
            return Err(AuthzError::storage(
                format!("grant scope {} to role {}", grant.scope_id, grant.role_id),
                err,
            ));
        }

        debug!(role_id = %grant.role_id, scope_id = %grant.scope_id, "Role scope created");
        Ok(())
    }
}
