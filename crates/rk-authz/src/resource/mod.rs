//! Resource Types and their Scopes
//!
//! Categories of protectable resources and the permissions defined on them.

pub mod entity;
pub mod repository;

pub use entity::{ResourceType, ResourceTypeScope};
pub use repository::{
    ResourceTypeRepository, ResourceTypeScopeRepository, SqlResourceTypeRepository,
    SqlResourceTypeScopeRepository,
};
