//! Persistence collaborator traits.
//!
//! The refresh engine never talks to a database directly. It reads and
//! writes records through [`RecordStore`] and mutates hierarchy edges through
//! an explicit [`StoreTransaction`] handle obtained from [`RecordStore::begin`].
//!
//! Both traits are object safe so the engine can hold `&dyn RecordStore`.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::ids::RecordId;
use crate::model::{PersistedRecord, RecordRef, RelationshipKind};
use crate::query::RecordQuery;

/// Record lookup, save and transaction boundary.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load records of a base model by primary id. Missing ids are skipped.
    async fn find_by_ids(&self, model: &str, ids: &[RecordId])
        -> StoreResult<Vec<PersistedRecord>>;

    /// Load records of a base model matching `query`.
    ///
    /// Callers are responsible for keeping `query` bounded.
    async fn find_where(&self, model: &str, query: &RecordQuery)
        -> StoreResult<Vec<PersistedRecord>>;

    /// Count records of a base model matching `query`.
    async fn count_where(&self, model: &str, query: &RecordQuery) -> StoreResult<u64> {
        let records = self.find_where(model, query).await?;
        Ok(records.len() as u64)
    }

    /// Insert or update a record by id.
    async fn save(&self, record: &PersistedRecord) -> StoreResult<()>;

    /// Delete records of a base model. Returns the number of rows removed.
    async fn delete(&self, model: &str, ids: &[RecordId]) -> StoreResult<u64>;

    /// Children currently attached under `parent` for `kind`.
    async fn children(&self, parent: &RecordRef, kind: &RelationshipKind)
        -> StoreResult<Vec<RecordRef>>;

    /// Open a transaction for relationship changes.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}

/// Relationship storage scoped to one transaction.
///
/// Dropping a handle without calling [`commit`](StoreTransaction::commit)
/// discards its changes.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Load records of a base model by primary id inside the transaction.
    async fn find_by_ids(
        &mut self,
        model: &str,
        ids: &[RecordId],
    ) -> StoreResult<Vec<PersistedRecord>>;

    /// The parent of `child` for `kind` whose base model is `parent_model`.
    async fn current_parent(
        &mut self,
        child: &RecordRef,
        kind: &RelationshipKind,
        parent_model: &str,
    ) -> StoreResult<Option<RecordRef>>;

    /// Attach `children` under `parent` in one bulk write.
    async fn add_children(
        &mut self,
        parent: &RecordRef,
        kind: &RelationshipKind,
        children: &[RecordRef],
    ) -> StoreResult<()>;

    /// Detach `children` from `parent` in one bulk write.
    async fn remove_children(
        &mut self,
        parent: &RecordRef,
        kind: &RelationshipKind,
        children: &[RecordRef],
    ) -> StoreResult<()>;

    /// Make every change visible atomically.
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discard every change.
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
