//! Storage sessions.
//!
//! A [`Session`] is either an autocommit pool (each statement runs on its own
//! pooled connection and commits immediately) or one open database
//! transaction shared by every repository created from the same
//! [`Transaction`](crate::Transaction).

use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction as SqlxTransaction};
use tokio::sync::{Mutex, MutexGuard};

use crate::error::{AuthzError, Result};

type SharedTransaction = Arc<Mutex<Option<SqlxTransaction<'static, Sqlite>>>>;

#[derive(Clone)]
pub struct Session {
    kind: SessionKind,
}

#[derive(Clone)]
enum SessionKind {
    Autocommit(SqlitePool),
    Transaction(SharedTransaction),
}

/// A connection checked out of a session for the duration of one operation.
///
/// For a transactional session this holds the transaction lock, so
/// statements from concurrent callers of the same transaction are serialised.
pub(crate) enum SessionConnection<'a> {
    Pooled(PoolConnection<Sqlite>),
    Transaction(MutexGuard<'a, Option<SqlxTransaction<'static, Sqlite>>>),
}

impl SessionConnection<'_> {
    pub(crate) fn executor(&mut self) -> Result<&mut SqliteConnection> {
        match self {
            SessionConnection::Pooled(conn) => Ok(&mut **conn),
            SessionConnection::Transaction(guard) => guard
                .as_mut()
                .map(|tx| &mut **tx)
                .ok_or_else(transaction_completed),
        }
    }
}

impl Session {
    pub fn autocommit(pool: SqlitePool) -> Self {
        Self {
            kind: SessionKind::Autocommit(pool),
        }
    }

    pub(crate) fn transaction(tx: SqlxTransaction<'static, Sqlite>) -> Self {
        Self {
            kind: SessionKind::Transaction(Arc::new(Mutex::new(Some(tx)))),
        }
    }

    pub fn is_transactional(&self) -> bool {
        matches!(self.kind, SessionKind::Transaction(_))
    }

    pub(crate) async fn acquire(&self) -> Result<SessionConnection<'_>> {
        match &self.kind {
            SessionKind::Autocommit(pool) => pool
                .acquire()
                .await
                .map(SessionConnection::Pooled)
                .map_err(|e| AuthzError::storage("acquire connection", e)),
            SessionKind::Transaction(shared) => {
                let guard = shared.lock().await;
                if guard.is_none() {
                    return Err(transaction_completed());
                }
                Ok(SessionConnection::Transaction(guard))
            }
        }
    }

    /// Detach the open transaction so it can be committed or rolled back.
    /// Every repository still holding this session fails from now on.
    pub(crate) async fn take_transaction(&self) -> Result<SqlxTransaction<'static, Sqlite>> {
        match &self.kind {
            SessionKind::Autocommit(_) => Err(AuthzError::internal(
                "autocommit session has no transaction to finish",
            )),
            SessionKind::Transaction(shared) => {
                shared.lock().await.take().ok_or_else(transaction_completed)
            }
        }
    }

    /// Non-blocking variant used from `Drop`.
    pub(crate) fn try_take_transaction(&self) -> Option<SqlxTransaction<'static, Sqlite>> {
        match &self.kind {
            SessionKind::Autocommit(_) => None,
            SessionKind::Transaction(shared) => shared.try_lock().ok().and_then(|mut guard| guard.take()),
        }
    }
}

fn transaction_completed() -> AuthzError {
    AuthzError::internal("transaction already completed")
}
