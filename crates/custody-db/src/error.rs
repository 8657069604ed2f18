//! Persistence error types

use thiserror::Error;

/// Persistence operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[cfg(feature = "postgres")]
    #[error("query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("key already claimed: {0}")]
    Duplicate(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::Serialization(e.to_string())
    }
}

impl From<DbError> for custody_types::CustodyError {
    fn from(err: DbError) -> Self {
        use custody_types::CustodyError;
        match err {
            DbError::Connection(reason) => CustodyError::ConcurrencyConflict { reason },
            DbError::Migration(reason) => CustodyError::internal(reason),
            #[cfg(feature = "postgres")]
            DbError::Query(e) => CustodyError::ConcurrencyConflict { reason: e.to_string() },
            DbError::NotFound(what) => CustodyError::not_found(what),
            DbError::Duplicate(reason) => CustodyError::ConcurrencyConflict { reason },
            DbError::Serialization(reason) => CustodyError::internal(reason),
        }
    }
}

/// Result type for persistence operations.
pub type DbResult<T> = Result<T, DbError>;
