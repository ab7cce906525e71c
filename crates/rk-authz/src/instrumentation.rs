//! Repository instrumentation
//!
//! [`Instrumented`] wraps any repository and records, per call:
//! - a `tracing` span carrying `repository` and `operation`
//! - `rk.repository.duration_seconds` histogram
//! - `rk.repository.errors_total` counter, labelled with the error kind

use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use tracing::{debug_span, Instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::resource::{
    ResourceType, ResourceTypeRepository, ResourceTypeScope, ResourceTypeScopeRepository,
};
use crate::role::{Role, RoleRepository};

/// Decorator adding spans and metrics around a repository.
pub struct Instrumented<R> {
    inner: R,
    repository: &'static str,
}

impl<R> Instrumented<R> {
    pub fn new(inner: R, repository: &'static str) -> Self {
        Self { inner, repository }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    async fn observe<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let span = debug_span!("repository", repository = self.repository, operation);
        let started = Instant::now();
        let result = call.instrument(span).await;

        histogram!(
            "rk.repository.duration_seconds",
            "repository" => self.repository,
            "operation" => operation
        )
        .record(started.elapsed().as_secs_f64());

        if let Err(err) = &result {
            counter!(
                "rk.repository.errors_total",
                "repository" => self.repository,
                "operation" => operation,
                "kind" => err.kind()
            )
            .increment(1);
        }

        result
    }
}

#[async_trait]
impl<R: RoleRepository> RoleRepository for Instrumented<R> {
    async fn exists(&self, id: Uuid) -> Result<bool> {
        self.observe("exists", self.inner.exists(id)).await
    }

    async fn load(&self, id: Uuid) -> Result<Role> {
        self.observe("load", self.inner.load(id)).await
    }

    async fn create(&self, role: &mut Role) -> Result<()> {
        self.observe("create", self.inner.create(role)).await
    }

    async fn save(&self, role: &Role) -> Result<()> {
        self.observe("save", self.inner.save(role)).await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.observe("delete", self.inner.delete(id)).await
    }

    async fn list(&self) -> Result<Vec<Role>> {
        self.observe("list", self.inner.list()).await
    }

    async fn lookup(&self, name: &str, resource_type_name: &str) -> Result<Role> {
        self.observe("lookup", self.inner.lookup(name, resource_type_name))
            .await
    }

    async fn list_scopes(&self, role: &Role) -> Result<Vec<ResourceTypeScope>> {
        self.observe("list_scopes", self.inner.list_scopes(role)).await
    }

    async fn add_scope(&self, role: &Role, scope: &ResourceTypeScope) -> Result<()> {
        self.observe("add_scope", self.inner.add_scope(role, scope)).await
    }
}

#[async_trait]
impl<R: ResourceTypeRepository> ResourceTypeRepository for Instrumented<R> {
    async fn create(&self, resource_type: &mut ResourceType) -> Result<()> {
        self.observe("create", self.inner.create(resource_type)).await
    }

    async fn load(&self, id: Uuid) -> Result<ResourceType> {
        self.observe("load", self.inner.load(id)).await
    }

    async fn lookup(&self, name: &str) -> Result<ResourceType> {
        self.observe("lookup", self.inner.lookup(name)).await
    }

    async fn list(&self) -> Result<Vec<ResourceType>> {
        self.observe("list", self.inner.list()).await
    }
}

#[async_trait]
impl<R: ResourceTypeScopeRepository> ResourceTypeScopeRepository for Instrumented<R> {
    async fn create(&self, scope: &mut ResourceTypeScope) -> Result<()> {
        self.observe("create", self.inner.create(scope)).await
    }

    async fn load(&self, id: Uuid) -> Result<ResourceTypeScope> {
        self.observe("load", self.inner.load(id)).await
    }

    async fn lookup(&self, resource_type_name: &str, name: &str) -> Result<ResourceTypeScope> {
        self.observe("lookup", self.inner.lookup(resource_type_name, name))
            .await
    }

    async fn list_by_resource_type(&self, resource_type_id: Uuid) -> Result<Vec<ResourceTypeScope>> {
        self.observe(
            "list_by_resource_type",
            self.inner.list_by_resource_type(resource_type_id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthzError;
    use metrics_exporter_prometheus::PrometheusBuilder;

    struct FixedResourceTypes {
        known: ResourceType,
    }

    #[async_trait]
    impl ResourceTypeRepository for FixedResourceTypes {
        async fn create(&self, _resource_type: &mut ResourceType) -> Result<()> {
            Err(AuthzError::internal("read only"))
        }

        async fn load(&self, id: Uuid) -> Result<ResourceType> {
            if id == self.known.resource_type_id {
                Ok(self.known.clone())
            } else {
                Err(AuthzError::not_found("resource_type", id.to_string()))
            }
        }

        async fn lookup(&self, name: &str) -> Result<ResourceType> {
            if name == self.known.name {
                Ok(self.known.clone())
            } else {
                Err(AuthzError::not_found("resource_type", name))
            }
        }

        async fn list(&self) -> Result<Vec<ResourceType>> {
            Ok(vec![self.known.clone()])
        }
    }

    fn repository() -> Instrumented<FixedResourceTypes> {
        let mut known = ResourceType::new("identity/organization");
        known.resource_type_id = Uuid::new_v4();
        Instrumented::new(FixedResourceTypes { known }, "resource_type")
    }

    #[tokio::test]
    async fn test_results_pass_through() {
        let repo = repository();
        let id = repo.inner().known.resource_type_id;

        assert_eq!(repo.load(id).await.unwrap().name, "identity/organization");
        assert_eq!(repo.list().await.unwrap().len(), 1);
        assert_eq!(
            repo.lookup("identity/organization").await.unwrap().resource_type_id,
            id
        );
    }

    #[tokio::test]
    async fn test_errors_keep_their_kind() {
        let repo = repository();

        let missing = repo.lookup("identity/team").await.unwrap_err();
        assert!(missing.is_not_found());

        let mut resource_type = ResourceType::new("identity/team");
        let failed = repo.create(&mut resource_type).await.unwrap_err();
        assert_eq!(failed.kind(), "internal");
    }

    #[test]
    fn test_calls_are_timed_and_errors_counted_by_kind() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let repo = repository();

        metrics::with_local_recorder(&recorder, || {
            futures::executor::block_on(async {
                repo.lookup("identity/organization").await.unwrap();
                repo.lookup("identity/team").await.unwrap_err();
                repo.lookup("identity/project").await.unwrap_err();
            })
        });

        let rendered = handle.render();
        let errors: Vec<&str> = rendered
            .lines()
            .filter(|line| line.starts_with("rk_repository_errors_total{"))
            .collect();
        assert_eq!(errors.len(), 1, "{rendered}");
        assert!(errors[0].contains(r#"repository="resource_type""#));
        assert!(errors[0].contains(r#"operation="lookup""#));
        assert!(errors[0].contains(r#"kind="not_found""#));
        assert!(errors[0].ends_with(" 2"));

        assert!(rendered.contains("rk_repository_duration_seconds_count{"));
        assert!(!rendered.contains(r#"kind="internal""#));
    }
}
