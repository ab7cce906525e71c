//! Role Aggregate
//!
//! Roles bound to a resource type, and the scopes each role grants.

pub mod entity;
pub mod repository;

pub use entity::{Role, RoleScope};
pub use repository::{RoleRepository, SqlRoleRepository};
