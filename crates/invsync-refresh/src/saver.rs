//! Default save path.
//!
//! [`prepare`] turns a collection into a [`PendingIndex`] keyed by record
//! key, resolving references to persisted ids. After reconnection,
//! [`DefaultSaver`] updates matching records, creates the rest and deletes
//! records in scope that were not observed.

use invsync_core::{PersistedRecord, RecordId, RecordQuery};
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, instrument};

use crate::collection::{CollectionSet, InventoryCollection};
use crate::error::{RefreshError, RefreshResult};
use crate::index::PendingIndex;
use crate::object::InventoryObject;
use crate::statistics::CollectionStatistics;
use crate::strategy::RefreshContext;
use crate::value::{canonical, AttributeValue, NaturalKey};

/// Attribute hash `object` writes, with references resolved to `<name>_id`.
///
/// References whose target key is not in the snapshot are written as `null`.
pub fn persisted_attributes(
    collections: &CollectionSet,
    collection: &InventoryCollection,
    object: &InventoryObject,
    relationship_keys: &BTreeSet<String>,
) -> RefreshResult<Map<String, JsonValue>> {
    let config = collection.config();
    let mut attributes = config.default_values.clone();

    for (name, value) in &object.data {
        if !config.writes_attribute(name) {
            continue;
        }
        if relationship_keys.contains(name) && !config.is_key_field(name) {
            continue;
        }
        match value {
            AttributeValue::Value(value) => {
                attributes.insert(name.clone(), value.clone());
            }
            AttributeValue::Ref(lazy) => {
                let id = collections
                    .resolve(lazy)?
                    .map_or(JsonValue::Null, |target| {
                        JsonValue::String(target.id.to_string())
                    });
                attributes.insert(format!("{name}_id"), id);
            }
        }
    }

    Ok(attributes)
}

/// Build the pending index for a default-strategy collection.
pub fn prepare(
    collections: &CollectionSet,
    collection: &InventoryCollection,
    relationship_keys: &BTreeSet<String>,
) -> RefreshResult<PendingIndex> {
    let columns = collection.manager_ref_to_cols();
    let mut pending = PendingIndex::new();

    for (slot, object) in collection.objects().iter().enumerate() {
        let attributes = persisted_attributes(collections, collection, object, relationship_keys)?;
        let key = NaturalKey::new(
            columns
                .iter()
                .map(|column| canonical(attributes.get(column).unwrap_or(&JsonValue::Null)))
                .collect(),
        );
        pending.insert(key, slot, attributes).map_err(|duplicate| {
            RefreshError::configuration(format!(
                "duplicate record key {} in collection '{}'",
                duplicate.key,
                collection.name()
            ))
        })?;
    }

    Ok(pending)
}

/// Create, update and delete for one collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSaver;

impl DefaultSaver {
    #[instrument(skip_all, fields(collection = %collection.name(), pending = pending.len()))]
    pub async fn save(
        &self,
        ctx: &RefreshContext<'_>,
        collection: &mut InventoryCollection,
        pending: PendingIndex,
        stats: &mut CollectionStatistics,
    ) -> RefreshResult<()> {
        let model = collection.model_class().cloned().ok_or_else(|| {
            RefreshError::configuration(format!(
                "collection '{}' has no model class",
                collection.name()
            ))
        })?;
        let base = model.base_class().to_string();
        let global = collection.config().global;
        let owner_id = (!global).then_some(ctx.owner.id);
        let check_changed = collection.check_changed(ctx.config);
        let columns = collection.manager_ref_to_cols();

        // Objects the reconnector already resolved keep their records.
        let pending_slots: HashSet<usize> = pending.slots().collect();
        let claimed: HashSet<RecordId> = collection
            .objects()
            .iter()
            .enumerate()
            .filter(|(slot, _)| !pending_slots.contains(slot))
            .filter_map(|(_, object)| object.id)
            .collect();

        let scope = match owner_id {
            Some(owner_id) => RecordQuery::owned_by(owner_id),
            None => RecordQuery::all(),
        }
        .with_record_type(collection.record_type_filter());

        let mut existing: HashMap<NaturalKey, PersistedRecord> = HashMap::new();
        let mut stale: Vec<RecordId> = Vec::new();
        for record in ctx.store.find_where(&base, &scope).await? {
            if claimed.contains(&record.id) {
                continue;
            }
            let key = InventoryCollection::record_key(&record, &columns);
            if existing.contains_key(&key) {
                stale.push(record.id);
            } else {
                existing.insert(key, record);
            }
        }
        debug!(model = %base, existing = existing.len(), "Loaded records in scope");

        for (key, slot, attributes) in pending.into_sorted_entries() {
            match existing.remove(&key) {
                Some(mut record) => {
                    let mut changed = record.assign_attributes(&attributes);
                    if owner_id.is_some() {
                        changed |= record.assign_owner(owner_id);
                    }
                    if !check_changed || changed {
                        ctx.store.save(&record).await?;
                        stats.updated += 1;
                    }
                    collection.assign_id(slot, record.id);
                }
                None => {
                    let record_type = collection
                        .object(slot)
                        .and_then(|object| collection.record_type_of(object));
                    let mut record = PersistedRecord::new(&model)
                        .with_record_type(record_type)
                        .with_owner(owner_id);
                    record.assign_attributes(&attributes);
                    ctx.store.save(&record).await?;
                    stats.created += 1;
                    collection.assign_id(slot, record.id);
                }
            }
        }

        if collection.config().complete && ctx.config.delete_missing {
            stale.extend(existing.into_values().map(|record| record.id));
            if !stale.is_empty() {
                stale.sort();
                let removed = ctx.store.delete(&base, &stale).await?;
                stats.deleted += removed;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CollectionConfig;
    use crate::value::LazyRef;
    use invsync_core::ModelClass;
    use serde_json::json;

    fn collection(name: &str, model: &str, objects: Vec<InventoryObject>) -> InventoryCollection {
        let mut config = CollectionConfig::new(name);
        config.model_class = Some(ModelClass::new(model));
        config.attributes_blacklist.insert("ems_children".into());
        config.default_values.insert("vendor".into(), json!("vmware"));
        InventoryCollection::with_objects(config, objects).unwrap()
    }

    #[test]
    fn test_persisted_attributes_filters_and_resolves() {
        let mut set = CollectionSet::new();
        set.add(collection(
            "ems_clusters",
            "EmsCluster",
            vec![InventoryObject::new().with("ems_ref", "domain-c1")],
        ))
        .unwrap();
        let cluster_id = RecordId::new();
        set.get_mut("ems_clusters").unwrap().assign_id(0, cluster_id);

        let hosts = collection("hosts", "Host", vec![]);
        let object = InventoryObject::new()
            .with("ems_ref", "host-1")
            .with("id", "bogus")
            .with("ems_children", "x")
            .with("parent", LazyRef::to("ems_folders", "group-h1"))
            .with("ems_cluster", LazyRef::to("ems_clusters", "domain-c1"))
            .with("missing_cluster", LazyRef::to("ems_clusters", "domain-c9"));

        let keys: BTreeSet<String> = ["parent".to_string()].into_iter().collect();
        let attributes = persisted_attributes(&set, &hosts, &object, &keys).unwrap();

        assert_eq!(attributes.get("ems_ref"), Some(&json!("host-1")));
        assert_eq!(attributes.get("vendor"), Some(&json!("vmware")));
        assert_eq!(
            attributes.get("ems_cluster_id"),
            Some(&json!(cluster_id.to_string()))
        );
        assert_eq!(attributes.get("missing_cluster_id"), Some(&JsonValue::Null));
        assert!(attributes.get("id").is_none());
        assert!(attributes.get("ems_children").is_none());
        assert!(attributes.get("parent_id").is_none());
    }

    #[test]
    fn test_prepare_keys_by_record_columns() {
        let mut set = CollectionSet::new();
        set.add(collection(
            "hosts",
            "Host",
            vec![
                InventoryObject::new().with("ems_ref", "host-1"),
                InventoryObject::new().with("ems_ref", "host-2"),
            ],
        ))
        .unwrap();

        let hosts = set.get("hosts").unwrap();
        let pending = prepare(&set, hosts, &BTreeSet::new()).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(
            pending.slot(&NaturalKey::from_values([json!("host-2")])),
            Some(1)
        );
    }

    #[test]
    fn test_prepare_rejects_unsaved_reference() {
        let mut set = CollectionSet::new();
        set.add(collection(
            "hosts",
            "Host",
            vec![InventoryObject::new().with("ems_ref", "host-1")],
        ))
        .unwrap();
        set.add(collection(
            "host_hardwares",
            "Hardware",
            vec![InventoryObject::new()
                .with("ems_ref", "hw-1")
                .with("host", LazyRef::to("hosts", "host-1"))],
        ))
        .unwrap();

        let hardwares = set.get("host_hardwares").unwrap();
        let err = prepare(&set, hardwares, &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, RefreshError::UnresolvedReference { .. }));
    }
}
