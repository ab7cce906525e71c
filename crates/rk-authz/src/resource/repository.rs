//! Resource Type and Scope Repositories

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{parse_uuid, AuthzError, Result};
use crate::lifecycle::{select_live, Lifecycle};
use crate::resource::entity::{ResourceType, ResourceTypeScope};
use crate::session::Session;

/// Storage interface for resource types.
#[async_trait]
pub trait ResourceTypeRepository: Send + Sync {
    /// Persist a new resource type, assigning an id if it has none.
    async fn create(&self, resource_type: &mut ResourceType) -> Result<()>;

    async fn load(&self, id: Uuid) -> Result<ResourceType>;

    /// Find a live resource type by its unique name.
    async fn lookup(&self, name: &str) -> Result<ResourceType>;

    async fn list(&self) -> Result<Vec<ResourceType>>;
}

/// Storage interface for resource type scopes.
#[async_trait]
pub trait ResourceTypeScopeRepository: Send + Sync {
    async fn create(&self, scope: &mut ResourceTypeScope) -> Result<()>;

    async fn load(&self, id: Uuid) -> Result<ResourceTypeScope>;

    /// Find a live scope by its resource type's name and its own name.
    async fn lookup(&self, resource_type_name: &str, name: &str) -> Result<ResourceTypeScope>;

    async fn list_by_resource_type(&self, resource_type_id: Uuid) -> Result<Vec<ResourceTypeScope>>;
}

const RESOURCE_TYPE_SELECT: &str = "SELECT rt.resource_type_id, rt.name, rt.description, \
     rt.created_at, rt.updated_at, rt.deleted_at \
     FROM resource_type rt";

const SCOPE_SELECT: &str = "SELECT s.resource_type_scope_id, s.resource_type_id, s.name, s.description, \
     s.created_at, s.updated_at, s.deleted_at \
     FROM resource_type_scope s \
     JOIN resource_type rt ON rt.resource_type_id = s.resource_type_id";

/// Read a resource type from columns named `{prefix}resource_type_id`, ...
pub(crate) fn parse_resource_type(row: &SqliteRow, prefix: &str) -> Result<ResourceType> {
    let get = |name: &str| -> Result<Option<String>> {
        row.try_get(format!("{prefix}{name}").as_str())
            .map_err(|e| AuthzError::storage(format!("decode column {prefix}{name}"), e))
    };

    let id = get("resource_type_id")?.unwrap_or_default();
    Ok(ResourceType {
        resource_type_id: parse_uuid("resource_type_id", &id)?,
        name: get("name")?.unwrap_or_default(),
        description: get("description")?,
        lifecycle: Lifecycle::from_row(row, prefix)?,
    })
}

/// Read a scope from an unprefixed `resource_type_scope` row.
pub(crate) fn parse_scope(row: &SqliteRow) -> Result<ResourceTypeScope> {
    let get = |name: &str| -> Result<Option<String>> {
        row.try_get(name)
            .map_err(|e| AuthzError::storage(format!("decode column {name}"), e))
    };

    let id = get("resource_type_scope_id")?.unwrap_or_default();
    let resource_type_id = get("resource_type_id")?.unwrap_or_default();
    Ok(ResourceTypeScope {
        resource_type_scope_id: parse_uuid("resource_type_scope_id", &id)?,
        resource_type_id: parse_uuid("resource_type_id", &resource_type_id)?,
        name: get("name")?.unwrap_or_default(),
        description: get("description")?,
        lifecycle: Lifecycle::from_row(row, "")?,
    })
}

/// SQL implementation of [`ResourceTypeRepository`].
#[derive(Clone)]
pub struct SqlResourceTypeRepository {
    session: Session,
}

impl SqlResourceTypeRepository {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl ResourceTypeRepository for SqlResourceTypeRepository {
    async fn create(&self, resource_type: &mut ResourceType) -> Result<()> {
        if resource_type.resource_type_id.is_nil() {
            resource_type.resource_type_id = Uuid::new_v4();
        }
        resource_type.lifecycle = Lifecycle::now();

        let mut conn = self.session.acquire().await?;
        let result = sqlx::query(
            "INSERT INTO resource_type (resource_type_id, name, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(resource_type.resource_type_id.to_string())
        .bind(&resource_type.name)
        .bind(&resource_type.description)
        .bind(resource_type.lifecycle.created_at)
        .bind(resource_type.lifecycle.updated_at)
        .execute(conn.executor()?)
        .await;

        if let Err(err) = result {
            error!(
                resource_type_id = %resource_type.resource_type_id,
                name = %resource_type.name,
                error = %err,
                "unable to create the resource type"
            );
            return Err(AuthzError::storage(
                format!("create resource type {}", resource_type.name),
                err,
            ));
        }

        debug!(
            resource_type_id = %resource_type.resource_type_id,
            name = %resource_type.name,
            "Resource type created"
        );
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<ResourceType> {
        let mut conn = self.session.acquire().await?;
        let mut query = select_live(RESOURCE_TYPE_SELECT, &["rt"]);
        query.push(" AND rt.resource_type_id = ").push_bind(id.to_string());

        let row = query
            .build()
            .fetch_optional(conn.executor()?)
            .await
            .map_err(|e| AuthzError::storage(format!("load resource type {id}"), e))?
            .ok_or_else(|| AuthzError::not_found("resource_type", id.to_string()))?;

        parse_resource_type(&row, "")
    }

    async fn lookup(&self, name: &str) -> Result<ResourceType> {
        let mut conn = self.session.acquire().await?;
        let mut query = select_live(RESOURCE_TYPE_SELECT, &["rt"]);
        query.push(" AND rt.name = ").push_bind(name.to_string());

        let row = query
            .build()
            .fetch_optional(conn.executor()?)
            .await
            .map_err(|e| AuthzError::storage(format!("lookup resource type {name}"), e))?
            .ok_or_else(|| AuthzError::not_found("resource_type", name))?;

        parse_resource_type(&row, "")
    }

    async fn list(&self) -> Result<Vec<ResourceType>> {
        let mut conn = self.session.acquire().await?;
        let mut query = select_live(RESOURCE_TYPE_SELECT, &["rt"]);
        query.push(" ORDER BY rt.name");

        let rows = query
            .build()
            .fetch_all(conn.executor()?)
            .await
            .map_err(|e| AuthzError::storage("list resource types", e))?;

        rows.iter().map(|row| parse_resource_type(row, "")).collect()
    }
}

/// SQL implementation of [`ResourceTypeScopeRepository`].
#[derive(Clone)]
pub struct SqlResourceTypeScopeRepository {
    session: Session,
}

impl SqlResourceTypeScopeRepository {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl ResourceTypeScopeRepository for SqlResourceTypeScopeRepository {
    async fn create(&self, scope: &mut ResourceTypeScope) -> Result<()> {
        if scope.resource_type_scope_id.is_nil() {
            scope.resource_type_scope_id = Uuid::new_v4();
        }
        scope.lifecycle = Lifecycle::now();

        let mut conn = self.session.acquire().await?;
        let result = sqlx::query(
            "INSERT INTO resource_type_scope \
             (resource_type_scope_id, resource_type_id, name, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(scope.resource_type_scope_id.to_string())
        .bind(scope.resource_type_id.to_string())
        .bind(&scope.name)
        .bind(&scope.description)
        .bind(scope.lifecycle.created_at)
        .bind(scope.lifecycle.updated_at)
        .execute(conn.executor()?)
        .await;

        if let Err(err) = result {
            error!(
                resource_type_scope_id = %scope.resource_type_scope_id,
                resource_type_id = %scope.resource_type_id,
                error = %err,
                "unable to create the resource type scope"
            );
            return Err(AuthzError::storage(
                format!("create scope {} for resource type {}", scope.name, scope.resource_type_id),
                err,
            ));
        }

        debug!(
            resource_type_scope_id = %scope.resource_type_scope_id,
            name = %scope.name,
            "Resource type scope created"
        );
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<ResourceTypeScope> {
        let mut conn = self.session.acquire().await?;
        let mut query = select_live(SCOPE_SELECT, &["s", "rt"]);
        query.push(" AND s.resource_type_scope_id = ").push_bind(id.to_string());

        let row = query
            .build()
            .fetch_optional(conn.executor()?)
            .await
            .map_err(|e| AuthzError::storage(format!("load scope {id}"), e))?
            .ok_or_else(|| AuthzError::not_found("resource_type_scope", id.to_string()))?;

        parse_scope(&row)
    }

    async fn lookup(&self, resource_type_name: &str, name: &str) -> Result<ResourceTypeScope> {
        let mut conn = self.session.acquire().await?;
        let mut query = select_live(SCOPE_SELECT, &["s", "rt"]);
        query
            .push(" AND rt.name = ")
            .push_bind(resource_type_name.to_string())
            .push(" AND s.name = ")
            .push_bind(name.to_string());

        let row = query
            .build()
            .fetch_optional(conn.executor()?)
            .await
            .map_err(|e| {
                AuthzError::storage(format!("lookup scope {resource_type_name}/{name}"), e)
            })?
            .ok_or_else(|| {
                AuthzError::not_found("resource_type_scope", format!("{resource_type_name}/{name}"))
            })?;

        parse_scope(&row)
    }

    async fn list_by_resource_type(&self, resource_type_id: Uuid) -> Result<Vec<ResourceTypeScope>> {
        let mut conn = self.session.acquire().await?;
        let mut query = select_live(SCOPE_SELECT, &["s", "rt"]);
        query
            .push(" AND s.resource_type_id = ")
            .push_bind(resource_type_id.to_string())
            .push(" ORDER BY s.name");

        let rows = query
            .build()
            .fetch_all(conn.executor()?)
            .await
            .map_err(|e| {
                AuthzError::storage(format!("list scopes of resource type {resource_type_id}"), e)
            })?;

        rows.iter().map(parse_scope).collect()
    }
}
