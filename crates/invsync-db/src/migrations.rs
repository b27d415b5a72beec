//! Embedded schema migrations.
//!
//! `migrations/001_inventory_records.sql` creates the record table and
//! `002_record_relationships.sql` the edge table.

use sqlx::migrate::Migrator;

use crate::error::{DbError, DbResult};
use crate::pool::DbPool;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply every pending migration in filename order.
///
/// ```rust,ignore
/// use invsync_db::{DbPool, run_migrations};
///
/// let pool = DbPool::connect("postgres://localhost/invsync").await?;
/// run_migrations(&pool).await?;
/// ```
///
/// # Errors
///
/// Returns `DbError::MigrationFailed` if any migration fails to apply.
pub async fn run_migrations(pool: &DbPool) -> DbResult<()> {
    tracing::info!(available = MIGRATOR.iter().count(), "Applying inventory schema");

    MIGRATOR
        .run(pool.inner())
        .await
        .map_err(DbError::MigrationFailed)?;

    tracing::info!("Inventory schema up to date");
    Ok(())
}

/// Versions of the embedded migrations.
#[must_use]
pub fn embedded_versions() -> Vec<i64> {
    MIGRATOR.iter().map(|migration| migration.version).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_migrations_are_ordered() {
        assert_eq!(embedded_versions(), vec![1, 2]);
    }
}
