//! Application, Db and Transaction (Unit of Work)
//!
//! [`Application`] is the set of repositories a caller works against. [`Db`]
//! hands out repositories that autocommit each statement; a [`Transaction`]
//! hands out repositories that share one database transaction and become
//! visible together on [`Transaction::commit`].
//!
//! ```ignore
//! let db = Db::connect(&config.database).await?;
//! db.init_schema().await?;
//!
//! let owner = db
//!     .transactional(|tx| {
//!         Box::pin(async move {
//!             let organization = tx.resource_types().lookup("identity/organization").await?;
//!             let mut owner = Role::new(&organization, "owner");
//!             tx.roles().create(&mut owner).await?;
//!             Ok(owner)
//!         })
//!     })
//!     .await?;
//! ```

use std::str::FromStr;
use std::time::Duration;

use futures::future::BoxFuture;
use rk_config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{AuthzError, Result};
use crate::instrumentation::Instrumented;
use crate::resource::{
    ResourceTypeRepository, ResourceTypeScopeRepository, SqlResourceTypeRepository,
    SqlResourceTypeScopeRepository,
};
use crate::role::{RoleRepository, SqlRoleRepository};
use crate::schema;
use crate::session::Session;

/// Access to the authorization repositories.
///
/// Every repository returned by one `Application` runs against the same
/// session.
pub trait Application: Send + Sync {
    fn roles(&self) -> Box<dyn RoleRepository>;

    fn resource_types(&self) -> Box<dyn ResourceTypeRepository>;

    fn resource_type_scopes(&self) -> Box<dyn ResourceTypeScopeRepository>;
}

fn roles_for(session: &Session) -> Box<dyn RoleRepository> {
    Box::new(Instrumented::new(SqlRoleRepository::new(session.clone()), "role"))
}

fn resource_types_for(session: &Session) -> Box<dyn ResourceTypeRepository> {
    Box::new(Instrumented::new(
        SqlResourceTypeRepository::new(session.clone()),
        "resource_type",
    ))
}

fn resource_type_scopes_for(session: &Session) -> Box<dyn ResourceTypeScopeRepository> {
    Box::new(Instrumented::new(
        SqlResourceTypeScopeRepository::new(session.clone()),
        "resource_type_scope",
    ))
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// The non-transactional root of the repository set.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
    session: Session,
}

impl Db {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            session: Session::autocommit(pool.clone()),
            pool,
        }
    }

    /// Open a pool for the configured database, creating the file and its
    /// parent directory when missing.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| AuthzError::storage(format!("parse database url {}", config.url), e))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(busy_timeout);

        let memory = is_memory_url(&config.url);
        let (options, pool_options) = if memory {
            if config.max_connections > 1 {
                warn!(
                    url = %config.url,
                    max_connections = config.max_connections,
                    "In-memory SQLite is private to one connection; limiting the pool to 1"
                );
            }
            // The database lives as long as its only connection. While a
            // transaction holds it, other callers fail after the busy timeout.
            let pool_options = SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .acquire_timeout(busy_timeout);
            (options, pool_options)
        } else {
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        AuthzError::internal(format!(
                            "create database directory {}: {e}",
                            parent.display()
                        ))
                    })?;
                }
            }
            (
                options.journal_mode(SqliteJournalMode::Wal),
                SqlitePoolOptions::new().max_connections(config.max_connections),
            )
        };

        let max_connections = pool_options.get_max_connections();
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AuthzError::storage(format!("connect to {}", config.url), e))?;

        info!(url = %config.url, max_connections, "Connected to authorization database");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn init_schema(&self) -> Result<()> {
        schema::init_schema(&self.pool).await
    }

    /// Open a database transaction. Drop it, or call `rollback`, to discard
    /// everything done through it.
    pub async fn begin_transaction(&self) -> Result<Transaction> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AuthzError::storage("begin transaction", e))?;

        debug!("Transaction started");
        Ok(Transaction {
            session: Session::transaction(tx),
        })
    }

    /// Run `work` in a transaction: commit when it returns `Ok`, roll back
    /// when it returns `Err`.
    pub async fn transactional<T, F>(&self, work: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t Transaction) -> BoxFuture<'t, Result<T>>,
    {
        let tx = self.begin_transaction().await?;
        let outcome = work(&tx).await;
        match outcome {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed unit of work also failed");
                }
                Err(err)
            }
        }
    }
}

impl Application for Db {
    fn roles(&self) -> Box<dyn RoleRepository> {
        roles_for(&self.session)
    }

    fn resource_types(&self) -> Box<dyn ResourceTypeRepository> {
        resource_types_for(&self.session)
    }

    fn resource_type_scopes(&self) -> Box<dyn ResourceTypeScopeRepository> {
        resource_type_scopes_for(&self.session)
    }
}

/// An open unit of work.
///
/// Exactly one of `commit` or `rollback` finishes it; a transaction that is
/// dropped unfinished is rolled back. Repositories obtained from it fail with
/// "transaction already completed" once it is finished.
pub struct Transaction {
    session: Session,
}

impl Transaction {
    pub async fn commit(self) -> Result<()> {
        let tx = self.session.take_transaction().await?;
        tx.commit()
            .await
            .map_err(|e| AuthzError::storage("commit transaction", e))?;
        debug!("Transaction committed");
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        let tx = self.session.take_transaction().await?;
        tx.rollback()
            .await
            .map_err(|e| AuthzError::storage("rollback transaction", e))?;
        debug!("Transaction rolled back");
        Ok(())
    }
}

impl Application for Transaction {
    fn roles(&self) -> Box<dyn RoleRepository> {
        roles_for(&self.session)
    }

    fn resource_types(&self) -> Box<dyn ResourceTypeRepository> {
        resource_types_for(&self.session)
    }

    fn resource_type_scopes(&self) -> Box<dyn ResourceTypeScopeRepository> {
        resource_type_scopes_for(&self.session)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        // sqlx rolls the transaction back when it is dropped.
        if let Some(tx) = self.session.try_take_transaction() {
            warn!("Transaction dropped without commit or rollback; rolling back");
            drop(tx);
        }
    }
}
