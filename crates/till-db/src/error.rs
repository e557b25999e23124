//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! SQLite Error (sqlx::Error)
//!      │
//!      ▼
//! DbError (this module)     ← adds context and categorization
//!      │
//!      ▼
//! StorageError (till-engine) ← what the sale engine branches on
//! ```

use thiserror::Error;

use till_engine::StorageError;

/// Database operation errors.
///
/// These wrap sqlx errors and add the context a caller needs for precise
/// handling (which entity, which constraint).
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Optimistic version check failed: the row changed under us.
    #[error("{entity} {id} was modified concurrently")]
    StaleVersion { entity: String, id: String },

    /// Unique constraint violation.
    #[error("Duplicate {field}: already exists")]
    UniqueViolation { field: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

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

    /// Creates a StaleVersion error for a given entity type and ID.
    pub fn stale(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::StaleVersion {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// SQLite reports constraint failures as message text, so categorization
/// parses the message:
/// - `UNIQUE constraint failed: <table>.<column>`
/// - `FOREIGN KEY constraint failed`
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation { field }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Bridge into the engine's storage taxonomy.
///
/// Stale versions and unique violations are races the engine may retry;
/// availability problems are reported as such; everything else is opaque.
impl From<DbError> for StorageError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::StaleVersion { .. } | DbError::UniqueViolation { .. } => {
                StorageError::Conflict(err.to_string())
            }
            DbError::PoolExhausted | DbError::ConnectionFailed(_) => {
                StorageError::Unavailable(err.to_string())
            }
            other => StorageError::Backend(other.to_string()),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
