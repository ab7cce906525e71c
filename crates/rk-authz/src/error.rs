//! Authorization Store Error Types

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by every repository and unit-of-work operation.
///
/// `NotFound` means no live record matches the requested key. Everything
/// else the caller cannot act on directly is `Internal`.
#[derive(Error, Debug)]
pub enum AuthzError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },
}

impl AuthzError {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a storage failure with the operation that hit it.
    pub fn storage(context: impl Into<String>, err: sqlx::Error) -> Self {
        Self::Internal {
            message: format!("{}: {}", context.into(), err),
            source: Some(err),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True when the storage layer rejected a write on a unique or primary
    /// key constraint, e.g. a scope that is already granted to a role.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Internal { source: Some(sqlx::Error::Database(db_err)), .. } => {
                db_err.is_unique_violation()
            }
            _ => false,
        }
    }

    /// Metric label for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Internal { .. } => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthzError>;

/// Parse a UUID stored as hyphenated text.
pub(crate) fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| AuthzError::internal(format!("invalid UUID in column {column}: {e}")))
}
