//! RoleKeeper Authorization Store
//!
//! Roles, the resource types they apply to, the scopes they grant, and the
//! transactional persistence behind them.
//!
//! - [`Db`] / [`Transaction`]: units of work handing out repositories
//! - [`RoleRepository`], [`ResourceTypeRepository`], [`ResourceTypeScopeRepository`]
//! - [`Provisioner`]: creates the well-known roles from configuration
//!
//! Every read filters out soft-deleted rows.

pub mod application;
pub mod error;
pub mod instrumentation;
pub mod lifecycle;
pub mod provisioning;
pub mod resource;
pub mod role;
pub mod schema;
pub mod session;

pub use application::{Application, Db, Transaction};
pub use error::{AuthzError, Result};
pub use instrumentation::Instrumented;
pub use lifecycle::Lifecycle;
pub use provisioning::{ProvisionReport, Provisioner};
pub use resource::{
    ResourceType, ResourceTypeRepository, ResourceTypeScope, ResourceTypeScopeRepository,
    SqlResourceTypeRepository, SqlResourceTypeScopeRepository,
};
pub use role::{Role, RoleRepository, RoleScope, SqlRoleRepository};
pub use session::Session;
