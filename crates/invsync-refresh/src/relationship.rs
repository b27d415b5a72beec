//! Relationship resolution.
//!
//! [`RelationshipSaver`] computes the desired parent of every object in its
//! dependency collections, diffs that against the stored edges of one
//! relationship kind and applies the delta as bulk add/remove calls per
//! parent inside one transaction. [`RootRelationshipSaver`] attaches the
//! single unparented object to the managed system itself.

use async_trait::async_trait;
use invsync_core::{ModelClass, RecordId, RecordRef, RelationshipKind, StoreTransaction};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument, warn};

use crate::collection::{CollectionSet, InventoryCollection};
use crate::error::{RefreshError, RefreshResult};
use crate::statistics::CollectionStatistics;
use crate::strategy::{RefreshContext, SaveStrategy};

/// Edges the snapshot asks for, keyed both ways.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredEdges {
    pub children_by_parent: BTreeMap<RecordRef, Vec<RecordRef>>,
    pub parent_by_child: BTreeMap<RecordRef, RecordRef>,
}

impl DesiredEdges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parent_by_child.is_empty()
    }

    /// Child ids grouped by base model.
    #[must_use]
    pub fn children_by_model(&self) -> BTreeMap<&str, Vec<RecordId>> {
        let mut grouped: BTreeMap<&str, Vec<RecordId>> = BTreeMap::new();
        for child in self.parent_by_child.keys() {
            grouped.entry(child.model.as_str()).or_default().push(child.id);
        }
        grouped
    }

    fn insert(
        &mut self,
        kind: &RelationshipKind,
        child: RecordRef,
        parent: RecordRef,
    ) -> RefreshResult<()> {
        match self.parent_by_child.entry(child) {
            Entry::Vacant(entry) => {
                self.children_by_parent
                    .entry(parent.clone())
                    .or_default()
                    .push(entry.key().clone());
                entry.insert(parent);
                Ok(())
            }
            Entry::Occupied(entry) if *entry.get() == parent => Ok(()),
            Entry::Occupied(entry) => Err(RefreshError::ambiguity(
                kind,
                format!(
                    "{} resolves to both {} and {parent}",
                    entry.key(),
                    entry.get()
                ),
            )),
        }
    }

    /// Fail if following parents from any child leads back to it.
    fn check_forest(&self, kind: &RelationshipKind) -> RefreshResult<()> {
        for child in self.parent_by_child.keys() {
            let mut seen = BTreeSet::new();
            let mut current = child;
            while let Some(parent) = self.parent_by_child.get(current) {
                if parent == child {
                    return Err(RefreshError::RelationshipCycle {
                        kind: kind.clone(),
                        child: child.clone(),
                    });
                }
                if !seen.insert(parent) {
                    break;
                }
                current = parent;
            }
        }
        Ok(())
    }
}

/// Parent/child edges of one kind, read from a relationship key on the
/// objects of the dependency collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipSaver {
    relationship_key: String,
    kind: RelationshipKind,
    parent_type: ModelClass,
}

impl RelationshipSaver {
    pub fn new(
        relationship_key: impl Into<String>,
        kind: RelationshipKind,
        parent_type: ModelClass,
    ) -> Self {
        Self {
            relationship_key: relationship_key.into(),
            kind,
            parent_type,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &RelationshipKind {
        &self.kind
    }

    /// Step 1: resolve every declared parent reference.
    pub fn desired_edges(
        &self,
        collection: &InventoryCollection,
        collections: &CollectionSet,
    ) -> RefreshResult<DesiredEdges> {
        let parent_model = self.parent_type.base_class();
        let mut desired = DesiredEdges::default();

        for name in collection.config().dependency_collections() {
            let dependency = collections.get(name).ok_or_else(|| {
                RefreshError::configuration(format!(
                    "relationship '{}' depends on unknown collection '{name}'",
                    collection.name()
                ))
            })?;
            let Some(child_model) = dependency.model_class() else {
                return Err(RefreshError::configuration(format!(
                    "collection '{name}' has no model class and cannot be a child"
                )));
            };

            for object in dependency.objects() {
                let Some(value) = object.present(&self.relationship_key) else {
                    continue;
                };
                let Some(lazy) = value.as_lazy_ref() else {
                    return Err(RefreshError::configuration(format!(
                        "'{}' of {} in '{name}' is not a reference",
                        self.relationship_key,
                        dependency.key_of(object)
                    )));
                };
                let Some(parent) = collections.resolve(lazy)? else {
                    continue;
                };
                if parent.model != parent_model {
                    return Err(RefreshError::configuration(format!(
                        "relationship '{}' expects {parent_model} parents, got {parent}",
                        collection.name()
                    )));
                }
                let child_id = object.id.ok_or_else(|| RefreshError::UnresolvedReference {
                    collection: name.to_string(),
                    key: dependency.key_of(object),
                })?;
                desired.insert(&self.kind, RecordRef::new(child_model, child_id), parent)?;
            }
        }

        desired.check_forest(&self.kind)?;
        Ok(desired)
    }

    /// Steps 2 to 4, inside `tx`.
    async fn apply(
        &self,
        tx: &mut dyn StoreTransaction,
        desired: &DesiredEdges,
        stats: &mut CollectionStatistics,
    ) -> RefreshResult<()> {
        let parent_model = self.parent_type.base_class();
        let mut to_remove: BTreeMap<RecordRef, Vec<RecordRef>> = BTreeMap::new();
        let mut to_add: BTreeMap<RecordRef, Vec<RecordRef>> = BTreeMap::new();
        let mut parents_needed: BTreeMap<String, BTreeSet<RecordId>> = BTreeMap::new();

        for (model, ids) in desired.children_by_model() {
            let children = tx.find_by_ids(model, &ids).await?;
            if children.len() < ids.len() {
                warn!(
                    model = %model,
                    requested = ids.len(),
                    found = children.len(),
                    "Relationship children missing from store"
                );
            }

            for child in children {
                let child_ref = child.record_ref();
                let Some(new_parent) = desired.parent_by_child.get(&child_ref) else {
                    continue;
                };
                let previous = tx
                    .current_parent(&child_ref, &self.kind, parent_model)
                    .await?;
                if previous.as_ref() == Some(new_parent) {
                    continue;
                }

                if let Some(previous) = previous {
                    parents_needed
                        .entry(previous.model.clone())
                        .or_default()
                        .insert(previous.id);
                    to_remove.entry(previous).or_default().push(child_ref.clone());
                }
                parents_needed
                    .entry(new_parent.model.clone())
                    .or_default()
                    .insert(new_parent.id);
                to_add.entry(new_parent.clone()).or_default().push(child_ref);
            }
        }

        for (model, ids) in parents_needed {
            let ids: Vec<RecordId> = ids.into_iter().collect();
            for parent in tx.find_by_ids(&model, &ids).await? {
                let parent_ref = parent.record_ref();
                if let Some(children) = to_remove.get(&parent_ref) {
                    tx.remove_children(&parent_ref, &self.kind, children).await?;
                    stats.relationships_removed += children.len() as u64;
                }
                if let Some(children) = to_add.get(&parent_ref) {
                    tx.add_children(&parent_ref, &self.kind, children).await?;
                    stats.relationships_added += children.len() as u64;
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl SaveStrategy for RelationshipSaver {
    fn relationship_keys(&self) -> Vec<String> {
        vec![self.relationship_key.clone()]
    }

    #[instrument(skip_all, fields(collection = %collection.name(), kind = %self.kind))]
    async fn save(
        &self,
        ctx: &RefreshContext<'_>,
        collection: &InventoryCollection,
        collections: &CollectionSet,
        stats: &mut CollectionStatistics,
    ) -> RefreshResult<()> {
        let desired = self.desired_edges(collection, collections)?;
        if desired.is_empty() {
            debug!("No desired edges");
            return Ok(());
        }

        let mut tx = ctx.store.begin().await?;
        let result = self.apply(tx.as_mut(), &desired, stats).await;
        finish(tx, result).await?;

        info!(
            children = desired.parent_by_child.len(),
            added = stats.relationships_added,
            removed = stats.relationships_removed,
            "Relationships resolved"
        );
        Ok(())
    }
}

/// Attaches the one unparented object of a dependency group to the managed
/// system under `ems_metadata`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRelationshipSaver {
    dependency: String,
    parent_key: String,
    kind: RelationshipKind,
}

impl RootRelationshipSaver {
    /// Root of the `dependency` group, found by a missing `parent` key.
    pub fn new(dependency: impl Into<String>) -> Self {
        Self {
            dependency: dependency.into(),
            parent_key: "parent".to_string(),
            kind: RelationshipKind::ems_metadata(),
        }
    }

    #[must_use]
    pub fn with_parent_key(mut self, parent_key: impl Into<String>) -> Self {
        self.parent_key = parent_key.into();
        self
    }

    /// The root record, if the group has exactly one unparented object.
    pub fn root(
        &self,
        collection: &InventoryCollection,
        collections: &CollectionSet,
    ) -> RefreshResult<Option<RecordRef>> {
        let Some(names) = collection.config().dependency_attributes.get(&self.dependency) else {
            return Ok(None);
        };

        let mut candidates = Vec::new();
        for name in names {
            let Some(dependency) = collections.get(name) else {
                return Err(RefreshError::configuration(format!(
                    "root relationship '{}' depends on unknown collection '{name}'",
                    collection.name()
                )));
            };
            for object in dependency.objects() {
                if object.present(&self.parent_key).is_none() {
                    candidates.push((name, dependency, object));
                }
            }
        }

        match candidates.as_slice() {
            [] => Ok(None),
            [(name, dependency, object)] => {
                let model = dependency.model_class().ok_or_else(|| {
                    RefreshError::configuration(format!(
                        "collection '{name}' has no model class and cannot be a root"
                    ))
                })?;
                let id = object.id.ok_or_else(|| RefreshError::UnresolvedReference {
                    collection: (*name).clone(),
                    key: dependency.key_of(object),
                })?;
                Ok(Some(RecordRef::new(model, id)))
            }
            _ => {
                let keys: Vec<String> = candidates
                    .iter()
                    .map(|(_, dependency, object)| dependency.key_of(object).to_string())
                    .collect();
                Err(RefreshError::ambiguity(
                    &self.kind,
                    format!("more than one root candidate: {}", keys.join(", ")),
                ))
            }
        }
    }

    async fn attach(
        &self,
        tx: &mut dyn StoreTransaction,
        owner: &RecordRef,
        root: &RecordRef,
        stats: &mut CollectionStatistics,
    ) -> RefreshResult<()> {
        let attached = tx.current_parent(root, &self.kind, &owner.model).await?;
        let sibling_parent = tx.current_parent(root, &self.kind, &root.model).await?;
        let single = std::slice::from_ref(root);

        if let Some(previous) = sibling_parent {
            tx.remove_children(&previous, &self.kind, single).await?;
            stats.relationships_removed += 1;
        }
        match attached {
            Some(current) if current == *owner => {}
            previous => {
                if let Some(previous) = previous {
                    tx.remove_children(&previous, &self.kind, single).await?;
                    stats.relationships_removed += 1;
                }
                tx.add_children(owner, &self.kind, single).await?;
                stats.relationships_added += 1;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SaveStrategy for RootRelationshipSaver {
    fn relationship_keys(&self) -> Vec<String> {
        vec![self.parent_key.clone()]
    }

    #[instrument(skip_all, fields(collection = %collection.name(), kind = %self.kind))]
    async fn save(
        &self,
        ctx: &RefreshContext<'_>,
        collection: &InventoryCollection,
        collections: &CollectionSet,
        stats: &mut CollectionStatistics,
    ) -> RefreshResult<()> {
        let Some(root) = self.root(collection, collections)? else {
            debug!("No root candidate");
            return Ok(());
        };

        let owner = ctx.owner.record_ref();
        let mut tx = ctx.store.begin().await?;
        let result = self.attach(tx.as_mut(), &owner, &root, stats).await;
        finish(tx, result).await?;

        info!(root = %root, owner = %owner, "Root attached");
        Ok(())
    }
}

/// Commit on success, roll back and return the original error otherwise.
async fn finish(tx: Box<dyn StoreTransaction>, result: RefreshResult<()>) -> RefreshResult<()> {
    match result {
        Ok(()) => {
            tx.commit().await?;
            Ok(())
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}
