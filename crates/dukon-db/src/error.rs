//! # Database Error Types
//!
//! Error types for database operations and settlement transactions.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Domain Error (CoreError)          │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ← one type surfaced by every db operation       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  API layer maps to machine-readable kind + message                     │
//! │                                                                         │
//! │  Special case: DbError::Conflict is the ONLY retryable kind.           │
//! │  Nothing was persisted (the transaction aborted), so the caller        │
//! │  may resubmit the same request with backoff.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use dukon_core::CoreError;
use thiserror::Error;

/// Database operation errors.
///
/// These wrap sqlx errors with context and carry domain errors out of
/// settlement transactions unchanged.
#[derive(Debug, Error)]
pub enum DbError {
    /// Business rule violation from dukon-core (overpayment,
    /// insufficient stock, missing exchange rate, ...).
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate product SKU
    /// - Duplicate debtor phone number
    /// - Second merchant debt for the same batch
    #[error("Duplicate value: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Lock or version contention; the transaction aborted with no
    /// side effect and the whole operation is safe to retry.
    #[error("Retryable conflict: {0}")]
    Conflict(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether the failed operation may be retried from scratch.
    ///
    /// Only lock/contention conflicts qualify; every other kind needs
    /// corrected input or operator attention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Conflict(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                use sqlx::error::ErrorKind;
                match db.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation(db.message().to_string()),
                    ErrorKind::ForeignKeyViolation => {
                        DbError::ForeignKeyViolation(db.message().to_string())
                    }
                    // A CHECK trip means a guard raced; nothing committed
                    ErrorKind::CheckViolation => DbError::Conflict(db.message().to_string()),
                    _ => {
                        let message = db.message();
                        // SQLITE_BUSY / SQLITE_LOCKED surface as plain
                        // database errors with these messages
                        if message.contains("database is locked")
                            || message.contains("database table is locked")
                        {
                            DbError::Conflict(message.to_string())
                        } else {
                            DbError::QueryFailed(message.to_string())
                        }
                    }
                }
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            sqlx::Error::Io(io) => DbError::ConnectionFailed(io.to_string()),
            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Internal(format!("payload serialization: {err}"))
    }
}

/// Convenience type alias for Results with DbError.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = DbError::not_found("Product", "p-123");
        assert_eq!(err.to_string(), "Product not found: p-123");
    }

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(DbError::Conflict("batch contention".into()).is_retryable());
        assert!(!DbError::not_found("Sale", "s1").is_retryable());
        assert!(!DbError::PoolExhausted.is_retryable());
        assert!(!DbError::Domain(CoreError::MissingExchangeRate).is_retryable());
    }

    #[test]
    fn test_domain_error_is_transparent() {
        let err: DbError = CoreError::Overpayment {
            paid: 1_100,
            due: 1_000,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Overpayment: paid 1100 so'm against 1000 so'm due"
        );
    }
}
