//! Role and RoleScope Entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::Lifecycle;
use crate::resource::{ResourceType, ResourceTypeScope};

/// A named permission bundle scoped to one resource type.
///
/// The resource type reference is fixed at creation. `(name, resource type)`
/// identifies at most one live role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Nil until the repository assigns one on create
    pub role_id: Uuid,

    /// Foreign key to the resource type this role applies to
    pub resource_type_id: Uuid,

    /// The resolved resource type, populated on every read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<ResourceType>,

    pub name: String,

    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

impl Role {
    pub fn new(resource_type: &ResourceType, name: impl Into<String>) -> Self {
        Self {
            role_id: Uuid::nil(),
            resource_type_id: resource_type.resource_type_id,
            resource_type: Some(resource_type.clone()),
            name: name.into(),
            lifecycle: Lifecycle::now(),
        }
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.lifecycle.updated_at
    }

    /// Name of the resolved resource type, if it was loaded.
    pub fn resource_type_name(&self) -> Option<&str> {
        self.resource_type.as_ref().map(|rt| rt.name.as_str())
    }
}

/// Grant record: this role confers this scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleScope {
    pub role_id: Uuid,
    pub scope_id: Uuid,

    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

impl RoleScope {
    pub fn new(role: &Role, scope: &ResourceTypeScope) -> Self {
        Self {
            role_id: role.role_id,
            scope_id: scope.resource_type_scope_id,
            lifecycle: Lifecycle::now(),
        }
    }
}
