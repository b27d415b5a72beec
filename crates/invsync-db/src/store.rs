//! PostgreSQL record store.
//!
//! Implements the shared persistence collaborators on top of
//! `inventory_records` and `record_relationships`.

use async_trait::async_trait;
use invsync_core::{
    PersistedRecord, RecordId, RecordQuery, RecordRef, RecordStore, RelationshipKind, StoreError,
    StoreResult, StoreTransaction,
};
use sqlx::{Postgres, Transaction};
use tracing::instrument;

use crate::error::{DbError, DbResult};
use crate::models::{InventoryRecordRow, RecordRelationshipRow};
use crate::pool::DbPool;

fn into_records(rows: Vec<InventoryRecordRow>) -> StoreResult<Vec<PersistedRecord>> {
    rows.into_iter()
        .map(InventoryRecordRow::into_record)
        .collect::<DbResult<Vec<_>>>()
        .map_err(StoreError::from)
}

/// Record store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: DbPool,
}

impl PgRecordStore {
    /// Create a new store over `pool`.
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// The pool this store writes to.
    #[must_use]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    async fn find_by_ids(
        &self,
        model: &str,
        ids: &[RecordId],
    ) -> StoreResult<Vec<PersistedRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = InventoryRecordRow::find_by_ids(self.pool.inner(), model, ids).await?;
        into_records(rows)
    }

    #[instrument(skip(self, query))]
    async fn find_where(
        &self,
        model: &str,
        query: &RecordQuery,
    ) -> StoreResult<Vec<PersistedRecord>> {
        let rows = InventoryRecordRow::find_where(self.pool.inner(), model, query).await?;
        into_records(rows)
    }

    #[instrument(skip(self, query))]
    async fn count_where(&self, model: &str, query: &RecordQuery) -> StoreResult<u64> {
        let count = InventoryRecordRow::count_where(self.pool.inner(), model, query).await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    #[instrument(skip(self, record), fields(model = %record.model, id = %record.id))]
    async fn save(&self, record: &PersistedRecord) -> StoreResult<()> {
        InventoryRecordRow::upsert(self.pool.inner(), record)
            .await
            .map_err(|e| StoreError::save(&record.model, record.id, e.to_string()))
    }

    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    async fn delete(&self, model: &str, ids: &[RecordId]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut tx = self
            .pool
            .inner()
            .begin()
            .await
            .map_err(DbError::ConnectionFailed)?;
        RecordRelationshipRow::delete_for_records(&mut *tx, model, ids).await?;
        let removed = InventoryRecordRow::delete(&mut *tx, model, ids).await?;
        tx.commit()
            .await
            .map_err(|e| StoreError::transaction(e.to_string()))?;
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn children(
        &self,
        parent: &RecordRef,
        kind: &RelationshipKind,
    ) -> StoreResult<Vec<RecordRef>> {
        let rows = RecordRelationshipRow::find_children(self.pool.inner(), kind, parent).await?;
        Ok(rows.iter().map(RecordRelationshipRow::child).collect())
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self
            .pool
            .inner()
            .begin()
            .await
            .map_err(DbError::ConnectionFailed)?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }
}

/// Relationship transaction over one pooled connection.
///
/// Dropping the handle rolls the transaction back.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn find_by_ids(
        &mut self,
        model: &str,
        ids: &[RecordId],
    ) -> StoreResult<Vec<PersistedRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = InventoryRecordRow::find_by_ids(&mut *self.tx, model, ids).await?;
        into_records(rows)
    }

    async fn current_parent(
        &mut self,
        child: &RecordRef,
        kind: &RelationshipKind,
        parent_model: &str,
    ) -> StoreResult<Option<RecordRef>> {
        let row =
            RecordRelationshipRow::find_parent(&mut *self.tx, kind, child, parent_model).await?;
        Ok(row.as_ref().map(RecordRelationshipRow::parent))
    }

    #[instrument(skip(self, parent, children), fields(parent = %parent, count = children.len()))]
    async fn add_children(
        &mut self,
        parent: &RecordRef,
        kind: &RelationshipKind,
        children: &[RecordRef],
    ) -> StoreResult<()> {
        RecordRelationshipRow::insert_children(&mut *self.tx, kind, parent, children).await?;
        Ok(())
    }

    #[instrument(skip(self, parent, children), fields(parent = %parent, count = children.len()))]
    async fn remove_children(
        &mut self,
        parent: &RecordRef,
        kind: &RelationshipKind,
        children: &[RecordRef],
    ) -> StoreResult<()> {
        RecordRelationshipRow::delete_children(&mut *self.tx, kind, parent, children).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::transaction(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StoreError::transaction(e.to_string()))
    }
}
