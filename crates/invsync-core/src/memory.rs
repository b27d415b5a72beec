//! In-memory persistence collaborator.
//!
//! `MemoryStore` keeps records and edges behind a `tokio::sync::Mutex` and
//! counts every call, which makes write amplification directly observable in
//! tests. Transactions work on a private copy of the state and swap it in on
//! commit.
//!
//! Failures can be injected per operation class to exercise error paths.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::ids::RecordId;
use crate::model::{PersistedRecord, RecordRef, RelationshipKind};
use crate::query::RecordQuery;
use crate::traits::{RecordStore, StoreTransaction};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    records: BTreeMap<(String, RecordId), PersistedRecord>,
    /// (kind, parent, child)
    edges: BTreeSet<(RelationshipKind, RecordRef, RecordRef)>,
}

impl MemoryState {
    fn find_by_ids(&self, model: &str, ids: &[RecordId]) -> Vec<PersistedRecord> {
        let wanted: BTreeSet<&RecordId> = ids.iter().collect();
        wanted
            .into_iter()
            .filter_map(|id| self.records.get(&(model.to_string(), *id)).cloned())
            .collect()
    }

    fn current_parent(
        &self,
        child: &RecordRef,
        kind: &RelationshipKind,
        parent_model: &str,
    ) -> Option<RecordRef> {
        self.edges
            .iter()
            .find(|(k, parent, c)| k == kind && c == child && parent.model == parent_model)
            .map(|(_, parent, _)| parent.clone())
    }
}

/// Operation counters.
#[derive(Debug, Default)]
struct Counters {
    queries: AtomicUsize,
    saves: AtomicUsize,
    deletes: AtomicUsize,
    edge_adds: AtomicUsize,
    edge_removes: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

#[derive(Debug, Default)]
struct Faults {
    fail_queries: AtomicBool,
    /// Saves allowed before every further save fails. `usize::MAX` = never.
    saves_before_failure: AtomicUsize,
    fail_edges: AtomicBool,
}

/// Snapshot of the operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationCounts {
    /// `find_by_ids`, `find_where` and `count_where` calls.
    pub queries: usize,
    /// Successful `save` calls.
    pub saves: usize,
    /// Records removed by `delete`.
    pub deletes: usize,
    /// Bulk `add_children` calls.
    pub edge_adds: usize,
    /// Bulk `remove_children` calls.
    pub edge_removes: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

impl OperationCounts {
    /// Record and edge writes, excluding reads and transaction control.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.saves + self.deletes + self.edge_adds + self.edge_removes
    }
}

/// Shared, cloneable in-memory store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    counters: Arc<Counters>,
    faults: Arc<Faults>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        let faults = Faults::default();
        faults.saves_before_failure.store(usize::MAX, Ordering::SeqCst);
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            counters: Arc::new(Counters::default()),
            faults: Arc::new(faults),
        }
    }

    /// Insert a record directly, bypassing counters.
    pub async fn insert(&self, record: PersistedRecord) {
        let mut state = self.state.lock().await;
        state
            .records
            .insert((record.model.clone(), record.id), record);
    }

    /// Insert an edge directly, bypassing counters.
    pub async fn insert_edge(&self, kind: RelationshipKind, parent: RecordRef, child: RecordRef) {
        self.state.lock().await.edges.insert((kind, parent, child));
    }

    /// Fetch one record directly, bypassing counters.
    pub async fn get(&self, model: &str, id: RecordId) -> Option<PersistedRecord> {
        self.state
            .lock()
            .await
            .records
            .get(&(model.to_string(), id))
            .cloned()
    }

    /// All records of a base model, bypassing counters.
    pub async fn records_of(&self, model: &str) -> Vec<PersistedRecord> {
        self.state
            .lock()
            .await
            .records
            .values()
            .filter(|record| record.model == model)
            .cloned()
            .collect()
    }

    /// Every parent of `child` for `kind`, bypassing counters.
    pub async fn parents_of(&self, child: &RecordRef, kind: &RelationshipKind) -> Vec<RecordRef> {
        self.state
            .lock()
            .await
            .edges
            .iter()
            .filter(|(k, _, c)| k == kind && c == child)
            .map(|(_, parent, _)| parent.clone())
            .collect()
    }

    #[must_use]
    pub fn counts(&self) -> OperationCounts {
        let c = &self.counters;
        OperationCounts {
            queries: c.queries.load(Ordering::SeqCst),
            saves: c.saves.load(Ordering::SeqCst),
            deletes: c.deletes.load(Ordering::SeqCst),
            edge_adds: c.edge_adds.load(Ordering::SeqCst),
            edge_removes: c.edge_removes.load(Ordering::SeqCst),
            commits: c.commits.load(Ordering::SeqCst),
            rollbacks: c.rollbacks.load(Ordering::SeqCst),
        }
    }

    /// Zero every counter.
    pub fn reset_counts(&self) {
        let c = &self.counters;
        for counter in [
            &c.queries,
            &c.saves,
            &c.deletes,
            &c.edge_adds,
            &c.edge_removes,
            &c.commits,
            &c.rollbacks,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    /// Make every read fail.
    pub fn fail_queries(&self, fail: bool) {
        self.faults.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Let `allowed` more saves succeed, then fail every save.
    pub fn fail_saves_after(&self, allowed: usize) {
        self.faults
            .saves_before_failure
            .store(allowed, Ordering::SeqCst);
    }

    /// Make `add_children` and `remove_children` fail.
    pub fn fail_edges(&self, fail: bool) {
        self.faults.fail_edges.store(fail, Ordering::SeqCst);
    }

    fn check_query(&self) -> StoreResult<()> {
        self.counters.queries.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_queries.load(Ordering::SeqCst) {
            return Err(StoreError::query("injected query failure"));
        }
        Ok(())
    }

    fn check_save(&self, record: &PersistedRecord) -> StoreResult<()> {
        let remaining = self.faults.saves_before_failure.load(Ordering::SeqCst);
        if remaining == 0 {
            return Err(StoreError::save(
                &record.model,
                record.id,
                "injected save failure",
            ));
        }
        if remaining != usize::MAX {
            self.faults
                .saves_before_failure
                .store(remaining - 1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_by_ids(
        &self,
        model: &str,
        ids: &[RecordId],
    ) -> StoreResult<Vec<PersistedRecord>> {
        self.check_query()?;
        Ok(self.state.lock().await.find_by_ids(model, ids))
    }

    async fn find_where(
        &self,
        model: &str,
        query: &RecordQuery,
    ) -> StoreResult<Vec<PersistedRecord>> {
        self.check_query()?;
        let state = self.state.lock().await;
        Ok(state
            .records
            .values()
            .filter(|record| record.model == model && query.matches(record))
            .cloned()
            .collect())
    }

    async fn count_where(&self, model: &str, query: &RecordQuery) -> StoreResult<u64> {
        self.check_query()?;
        let state = self.state.lock().await;
        let count = state
            .records
            .values()
            .filter(|record| record.model == model && query.matches(record))
            .count();
        Ok(count as u64)
    }

    async fn save(&self, record: &PersistedRecord) -> StoreResult<()> {
        self.check_save(record)?;
        self.counters.saves.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        state
            .records
            .insert((record.model.clone(), record.id), record.clone());
        Ok(())
    }

    async fn delete(&self, model: &str, ids: &[RecordId]) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        let mut removed = 0;
        for id in ids {
            if state.records.remove(&(model.to_string(), *id)).is_some() {
                removed += 1;
            }
        }
        state
            .edges
            .retain(|(_, parent, child)| {
                let child_gone = child.model == model && ids.contains(&child.id);
                let parent_gone = parent.model == model && ids.contains(&parent.id);
                !(child_gone || parent_gone)
            });
        self.counters.deletes.fetch_add(removed, Ordering::SeqCst);
        Ok(removed as u64)
    }

    async fn children(
        &self,
        parent: &RecordRef,
        kind: &RelationshipKind,
    ) -> StoreResult<Vec<RecordRef>> {
        self.check_query()?;
        let state = self.state.lock().await;
        Ok(state
            .edges
            .iter()
            .filter(|(k, p, _)| k == kind && p == parent)
            .map(|(_, _, child)| child.clone())
            .collect())
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let staged = self.state.lock().await.clone();
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            staged,
        }))
    }
}

/// Transaction over a private copy of the store state.
#[derive(Debug)]
pub struct MemoryTransaction {
    store: MemoryStore,
    staged: MemoryState,
}

impl MemoryTransaction {
    fn check_edges(&self) -> StoreResult<()> {
        if self.store.faults.fail_edges.load(Ordering::SeqCst) {
            return Err(StoreError::query("injected relationship failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn find_by_ids(
        &mut self,
        model: &str,
        ids: &[RecordId],
    ) -> StoreResult<Vec<PersistedRecord>> {
        self.store.check_query()?;
        Ok(self.staged.find_by_ids(model, ids))
    }

    async fn current_parent(
        &mut self,
        child: &RecordRef,
        kind: &RelationshipKind,
        parent_model: &str,
    ) -> StoreResult<Option<RecordRef>> {
        self.store.check_query()?;
        Ok(self.staged.current_parent(child, kind, parent_model))
    }

    async fn add_children(
        &mut self,
        parent: &RecordRef,
        kind: &RelationshipKind,
        children: &[RecordRef],
    ) -> StoreResult<()> {
        self.check_edges()?;
        self.store.counters.edge_adds.fetch_add(1, Ordering::SeqCst);
        for child in children {
            self.staged
                .edges
                .insert((kind.clone(), parent.clone(), child.clone()));
        }
        Ok(())
    }

    async fn remove_children(
        &mut self,
        parent: &RecordRef,
        kind: &RelationshipKind,
        children: &[RecordRef],
    ) -> StoreResult<()> {
        self.check_edges()?;
        self.store
            .counters
            .edge_removes
            .fetch_add(1, Ordering::SeqCst);
        for child in children {
            self.staged
                .edges
                .remove(&(kind.clone(), parent.clone(), child.clone()));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTransaction { store, staged } = *self;
        let mut state = store.state.lock().await;
        // Records are written outside transactions; only edges are staged here.
        state.edges = staged.edges;
        store.counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.store
            .counters
            .rollbacks
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
