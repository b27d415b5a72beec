//! Per-collection strategy seams.
//!
//! A collection saves through the default path (pending index, optional
//! reconnect, default saver) unless it declares a [`SaveStrategy`]. A
//! [`ReconnectStrategy`] plugs into the default path before the saver runs.

use async_trait::async_trait;
use invsync_core::{PersistedRecord, RecordStore};
use std::fmt;

use crate::collection::{CollectionSet, InventoryCollection};
use crate::config::RefreshConfig;
use crate::error::RefreshResult;
use crate::index::PendingIndex;
use crate::statistics::CollectionStatistics;

/// Everything a strategy may touch outside its own collection.
#[derive(Clone, Copy)]
pub struct RefreshContext<'a> {
    pub store: &'a dyn RecordStore,
    /// The managed system that owns this pass.
    pub owner: &'a PersistedRecord,
    pub config: &'a RefreshConfig,
}

impl fmt::Debug for RefreshContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshContext")
            .field("owner", &self.owner.record_ref())
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}

/// Resolves pending objects against existing records before the default
/// saver creates anything.
#[async_trait]
pub trait ReconnectStrategy: Send + Sync + fmt::Debug {
    /// Check the collection declares what this strategy needs.
    fn validate(&self, _collection: &InventoryCollection) -> RefreshResult<()> {
        Ok(())
    }

    /// Remove resolved entries from `pending` and assign their ids onto the
    /// collection's objects.
    async fn reconnect(
        &self,
        ctx: &RefreshContext<'_>,
        collection: &mut InventoryCollection,
        pending: &mut PendingIndex,
        stats: &mut CollectionStatistics,
    ) -> RefreshResult<()>;
}

/// Replaces the default save path for a collection.
#[async_trait]
pub trait SaveStrategy: Send + Sync + fmt::Debug {
    /// Attributes of dependency collections this strategy reads as
    /// relationship keys. They are never written as record attributes.
    fn relationship_keys(&self) -> Vec<String> {
        Vec::new()
    }

    async fn save(
        &self,
        ctx: &RefreshContext<'_>,
        collection: &InventoryCollection,
        collections: &CollectionSet,
        stats: &mut CollectionStatistics,
    ) -> RefreshResult<()>;
}
