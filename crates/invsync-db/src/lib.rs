//! # invsync-db
//!
//! PostgreSQL persistence collaborators for the invsync refresh engine.
//!
//! - [`PgRecordStore`] implements [`invsync_core::RecordStore`] on
//!   `inventory_records`
//! - [`PgStoreTransaction`] implements [`invsync_core::StoreTransaction`] on
//!   `record_relationships`
//! - [`run_migrations`] applies the embedded schema
//!
//! ```rust,ignore
//! use invsync_db::{DbConfig, DbPool, PgRecordStore, run_migrations};
//!
//! let pool = DbPool::connect_with(&DbConfig::from_env()?).await?;
//! run_migrations(&pool).await?;
//! let store = PgRecordStore::new(pool);
//! ```

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod store;

pub use error::{DbError, DbResult};
pub use migrations::run_migrations;
pub use pool::{DbConfig, DbPool};
pub use store::{PgRecordStore, PgStoreTransaction};
