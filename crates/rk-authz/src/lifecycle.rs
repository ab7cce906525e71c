//! Lifecycle timestamps and soft-delete filtering.
//!
//! Every table carries `created_at`, `updated_at` and a nullable
//! `deleted_at`. A row with `deleted_at` set is logically absent, and every
//! read path builds its query through [`select_live`] so that no lookup can
//! forget the filter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::error::{AuthzError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lifecycle {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Lifecycle {
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Read the lifecycle columns, optionally prefixed (`rt_created_at`, ...).
    pub(crate) fn from_row(row: &SqliteRow, prefix: &str) -> Result<Self> {
        let column = |name: &str| format!("{prefix}{name}");
        let decode = |name: &str, err: sqlx::Error| {
            AuthzError::storage(format!("decode column {prefix}{name}"), err)
        };

        Ok(Self {
            created_at: row
                .try_get(column("created_at").as_str())
                .map_err(|e| decode("created_at", e))?,
            updated_at: row
                .try_get(column("updated_at").as_str())
                .map_err(|e| decode("updated_at", e))?,
            deleted_at: row
                .try_get(column("deleted_at").as_str())
                .map_err(|e| decode("deleted_at", e))?,
        })
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::now()
    }
}

/// Predicate matching rows of `alias` that are not soft-deleted.
pub(crate) fn live(alias: &str) -> String {
    format!("{alias}.deleted_at IS NULL")
}

/// Start a query from `select` restricted to live rows of every alias.
///
/// The returned builder ends inside the WHERE clause, so callers append
/// further conditions with `AND`.
pub(crate) fn select_live<'args>(select: &str, aliases: &[&str]) -> QueryBuilder<'args, Sqlite> {
    let mut query = QueryBuilder::new(select);
    query.push(" WHERE ");
    if aliases.is_empty() {
        query.push("1 = 1");
    }
    for (index, alias) in aliases.iter().enumerate() {
        if index > 0 {
            query.push(" AND ");
        }
        query.push(live(alias));
    }
    query
}
