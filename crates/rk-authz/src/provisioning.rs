//! Well-known role provisioning
//!
//! Creates the resource types, scopes, roles and grants described by
//! [`ProvisioningConfig`]. Existing records are reused, so provisioning the
//! same configuration again creates nothing.

use std::collections::{HashMap, HashSet};
use std::fmt;

use rk_config::{ProvisioningConfig, ResourceTypeSeed};
use serde::Serialize;
use tracing::info;

use crate::application::{Application, Db};
use crate::error::{AuthzError, Result};
use crate::resource::{ResourceType, ResourceTypeScope};
use crate::role::Role;

/// What a provisioning run created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub resource_types: usize,
    pub scopes: usize,
    pub roles: usize,
    pub grants: usize,
}

impl ProvisionReport {
    /// True when the run found everything already in place.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for ProvisionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} resource types, {} scopes, {} roles, {} grants",
            self.resource_types, self.scopes, self.roles, self.grants
        )
    }
}

pub struct Provisioner;

impl Provisioner {
    /// Provision `config` in a single transaction. On failure nothing is kept.
    pub async fn provision(db: &Db, config: &ProvisioningConfig) -> Result<ProvisionReport> {
        if !config.enabled {
            info!("Provisioning disabled, skipping");
            return Ok(ProvisionReport::default());
        }

        let config = config.clone();
        let report = db
            .transactional(move |tx| Box::pin(async move { Self::provision_in(tx, &config).await }))
            .await?;

        info!(%report, "Provisioning complete");
        Ok(report)
    }

    /// Provision `config` against an existing unit of work without finishing
    /// it. The caller decides whether to commit.
    pub async fn provision_in(
        app: &dyn Application,
        config: &ProvisioningConfig,
    ) -> Result<ProvisionReport> {
        let mut report = ProvisionReport::default();
        for seed in &config.resource_types {
            Self::provision_resource_type(app, seed, &mut report).await?;
        }
        Ok(report)
    }

    async fn provision_resource_type(
        app: &dyn Application,
        seed: &ResourceTypeSeed,
        report: &mut ProvisionReport,
    ) -> Result<()> {
        let resource_types = app.resource_types();
        let resource_type = match resource_types.lookup(&seed.name).await {
            Ok(existing) => existing,
            Err(err) if err.is_not_found() => {
                let mut resource_type = ResourceType::new(&seed.name);
                resource_type.description = seed.description.clone();
                resource_types.create(&mut resource_type).await?;
                report.resource_types += 1;
                info!(name = %resource_type.name, "Created resource type");
                resource_type
            }
            Err(err) => return Err(err),
        };

        let scope_repo = app.resource_type_scopes();
        let mut scopes: HashMap<&str, ResourceTypeScope> = HashMap::new();
        for scope_seed in &seed.scopes {
            let scope = match scope_repo.lookup(&resource_type.name, &scope_seed.name).await {
                Ok(existing) => existing,
                Err(err) if err.is_not_found() => {
                    let mut scope = ResourceTypeScope::new(&resource_type, &scope_seed.name);
                    scope.description = scope_seed.description.clone();
                    scope_repo.create(&mut scope).await?;
                    report.scopes += 1;
                    info!(
                        resource_type = %resource_type.name,
                        scope = %scope.name,
                        "Created scope"
                    );
                    scope
                }
                Err(err) => return Err(err),
            };
            scopes.insert(scope_seed.name.as_str(), scope);
        }

        let roles = app.roles();
        for role_seed in &seed.roles {
            let role = match roles.lookup(&role_seed.name, &resource_type.name).await {
                Ok(existing) => existing,
                Err(err) if err.is_not_found() => {
                    let mut role = Role::new(&resource_type, &role_seed.name);
                    roles.create(&mut role).await?;
                    report.roles += 1;
                    info!(resource_type = %resource_type.name, role = %role.name, "Created role");
                    role
                }
                Err(err) => return Err(err),
            };

            let granted: HashSet<_> = roles
                .list_scopes(&role)
                .await?
                .into_iter()
                .map(|scope| scope.resource_type_scope_id)
                .collect();

            for scope_name in &role_seed.scopes {
                let scope = scopes.get(scope_name.as_str()).ok_or_else(|| {
                    AuthzError::internal(format!(
                        "role {} grants scope {} which resource type {} does not declare",
                        role_seed.name, scope_name, resource_type.name
                    ))
                })?;
                if granted.contains(&scope.resource_type_scope_id) {
                    continue;
                }

                roles.add_scope(&role, scope).await?;
                report.grants += 1;
                info!(role = %role.name, scope = %scope.name, "Granted scope");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display_and_empty() {
        let mut report = ProvisionReport::default();
        assert!(report.is_empty());

        report.roles = 1;
        report.grants = 2;
        assert!(!report.is_empty());
        assert_eq!(
            report.to_string(),
            "0 resource types, 0 scopes, 1 roles, 2 grants"
        );
    }
}
