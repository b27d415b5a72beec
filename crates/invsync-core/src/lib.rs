//! invsync Core Library
//!
//! Shared record model and persistence traits for invsync.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (`RecordId`, `RunId`)
//! - [`model`] - Persisted records, model classes and relationship kinds
//! - [`query`] - Record filters understood by every store
//! - [`traits`] - Persistence collaborators (`RecordStore`, `StoreTransaction`)
//! - [`memory`] - In-memory store used by tests and dry runs
//! - [`error`] - Store error type (`StoreError`)
//!
//! # Example
//!
//! ```
//! use invsync_core::{MemoryStore, ModelClass, PersistedRecord, RecordStore};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = MemoryStore::new();
//! let host = PersistedRecord::new(&ModelClass::with_base("VmwareHost", "Host"));
//! store.save(&host).await.unwrap();
//!
//! let found = store.find_by_ids("Host", &[host.id]).await.unwrap();
//! assert_eq!(found.len(), 1);
//! # }
//! ```

pub mod error;
pub mod ids;
pub mod memory;
pub mod model;
pub mod query;
pub mod traits;

// Re-export main types for convenient access
pub use error::{StoreError, StoreResult};
pub use ids::{ParseIdError, RecordId, RunId};
pub use memory::{MemoryStore, OperationCounts};
pub use model::{ModelClass, PersistedRecord, RecordRef, RelationshipKind, PROTECTED_ATTRIBUTES};
pub use query::{AttributeFilter, OwnerFilter, RecordQuery, TypeFilter};
pub use traits::{RecordStore, StoreTransaction};
