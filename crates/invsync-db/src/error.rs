//! Error types for the invsync-db crate.
//!
//! Provides a unified error type that wraps `SQLx` errors with additional context.

use invsync_core::StoreError;
use thiserror::Error;

/// Database operation errors.
///
/// # Example
///
/// ```rust
/// use invsync_db::DbError;
///
/// fn handle_error(err: DbError) {
///     match err {
///         DbError::ConnectionFailed(e) => eprintln!("Cannot connect: {}", e),
///         DbError::MigrationFailed(e) => eprintln!("Migration error: {}", e),
///         DbError::QueryFailed(e) => eprintln!("Query error: {}", e),
///         DbError::InvalidRow(msg) => eprintln!("Bad row: {}", msg),
///         DbError::ConfigMissing { var } => eprintln!("Missing {}", var),
///         DbError::ConfigInvalid { var, reason } => eprintln!("{}: {}", var, reason),
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a database connection.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A database query failed to execute.
    #[error("Query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    /// A stored row could not be mapped onto a record.
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// Required environment variable is not set.
    #[error("Missing configuration: {var}")]
    ConfigMissing { var: String },

    /// Environment variable has an unusable value.
    #[error("Invalid configuration {var}: {reason}")]
    ConfigInvalid { var: String, reason: String },
}

impl DbError {
    /// Check if this error indicates a connection problem.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DbError::ConnectionFailed(_))
    }

    /// Check if this error indicates a migration problem.
    #[must_use]
    pub fn is_migration_error(&self) -> bool {
        matches!(self, DbError::MigrationFailed(_))
    }

    /// Check if this error indicates a query problem.
    #[must_use]
    pub fn is_query_error(&self) -> bool {
        matches!(self, DbError::QueryFailed(_))
    }

    /// Check if this error indicates a configuration problem.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            DbError::ConfigMissing { .. } | DbError::ConfigInvalid { .. }
        )
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::QueryFailed(err)
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ConnectionFailed(_) => StoreError::transaction(err.to_string()),
            _ => StoreError::query(err.to_string()),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
