//! # invsync Refresh
//!
//! Reconciles a freshly collected inventory snapshot against persisted
//! records for one managed system.
//!
//! ## Overview
//!
//! A pass is described by a set of [`InventoryCollection`]s, one per entity
//! kind. Each collection carries its natural key (`manager_ref`), parent
//! collections, attribute filters and optional strategies. The
//! [`Persister`] saves them in dependency order:
//!
//! 1. Build the pending index (record key to object, plus the attribute
//!    hash to write), resolving [`LazyRef`]s to persisted ids.
//! 2. Run the collection's [`ReconnectStrategy`], e.g. the
//!    [`OrphanReconnector`] for hosts and vms, which re-attaches unowned
//!    records instead of creating duplicates.
//! 3. Update matching records only when they changed, create the rest and
//!    delete unseen records of complete collections ([`DefaultSaver`]).
//! 4. Relationship collections ([`RelationshipSaver`],
//!    [`RootRelationshipSaver`]) diff the desired hierarchy against stored
//!    edges and apply the delta in one transaction.
//!
//! ## Usage
//!
//! ```
//! use invsync_core::{MemoryStore, ModelClass, PersistedRecord};
//! use invsync_refresh::{infra, InventoryObject, LazyRef, Persister, RefreshConfig};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = MemoryStore::new();
//! let ems = PersistedRecord::new(&ModelClass::new("ExtManagementSystem"));
//! let mut persister = Persister::new(ems, RefreshConfig::default());
//!
//! persister
//!     .add_collection(
//!         infra::ems_folders()
//!             .with_objects(vec![
//!                 InventoryObject::new().with("uid_ems", "group-d1"),
//!                 InventoryObject::new()
//!                     .with("uid_ems", "group-h1")
//!                     .with("parent", LazyRef::to("ems_folders", "group-d1")),
//!             ])
//!             .unwrap(),
//!     )
//!     .unwrap();
//! persister
//!     .add_collection(infra::root_folder_relationship().collection())
//!     .unwrap();
//!
//! let stats = persister.persist(&store).await.unwrap();
//! assert_eq!(stats.collection("ems_folders").unwrap().created, 2);
//! assert_eq!(stats.collection("root_folder_relationship").unwrap().relationships_added, 1);
//! # }
//! ```

pub mod builder;
pub mod collection;
pub mod config;
pub mod error;
pub mod graph;
pub mod index;
pub mod object;
pub mod persister;
pub mod reconnect;
pub mod relationship;
pub mod saver;
pub mod statistics;
pub mod strategy;
pub mod value;

// Re-export main types for convenient access
pub use builder::{infra, CollectionBuilder};
pub use collection::{CollectionConfig, CollectionSet, InventoryCollection, DEFAULT_MANAGER_REF};
pub use config::{RefreshConfig, DEFAULT_ORPHAN_BATCH_SIZE};
pub use error::{RefreshError, RefreshResult};
pub use index::{DuplicateKey, IdentityIndex, PendingIndex};
pub use object::InventoryObject;
pub use persister::Persister;
pub use reconnect::OrphanReconnector;
pub use relationship::{DesiredEdges, RelationshipSaver, RootRelationshipSaver};
pub use saver::DefaultSaver;
pub use statistics::{CollectionStatistics, RefreshStatistics};
pub use strategy::{ReconnectStrategy, RefreshContext, SaveStrategy};
pub use value::{AttributeValue, LazyRef, NaturalKey};
