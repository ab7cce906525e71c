//! Resource Type and Scope Entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::Lifecycle;

/// A category of protectable resource, e.g. `identity/organization`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceType {
    /// Nil until the repository assigns one on create
    pub resource_type_id: Uuid,

    /// Unique among live resource types
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

impl ResourceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            resource_type_id: Uuid::nil(),
            name: name.into(),
            description: None,
            lifecycle: Lifecycle::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.lifecycle.updated_at
    }
}

/// A single permission defined on one resource type, e.g. `manage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTypeScope {
    pub resource_type_scope_id: Uuid,

    pub resource_type_id: Uuid,

    /// Unique per resource type among live scopes
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

impl ResourceTypeScope {
    pub fn new(resource_type: &ResourceType, name: impl Into<String>) -> Self {
        Self {
            resource_type_scope_id: Uuid::nil(),
            resource_type_id: resource_type.resource_type_id,
            name: name.into(),
            description: None,
            lifecycle: Lifecycle::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.lifecycle.updated_at
    }
}
