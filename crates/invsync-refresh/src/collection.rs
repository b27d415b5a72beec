//! Inventory collections and the per-pass collection set.

use invsync_core::{
    ModelClass, PersistedRecord, RecordId, RecordRef, TypeFilter, PROTECTED_ATTRIBUTES,
};
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::config::RefreshConfig;
use crate::error::{RefreshError, RefreshResult};
use crate::index::IdentityIndex;
use crate::object::InventoryObject;
use crate::strategy::{ReconnectStrategy, SaveStrategy};
use crate::value::{canonical, AttributeValue, LazyRef, NaturalKey};

/// Natural key used when a collection declares none.
pub const DEFAULT_MANAGER_REF: &str = "ems_ref";

/// Static declaration of one entity kind.
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub name: String,
    /// Persisted class. Relationship-only collections have none.
    pub model_class: Option<ModelClass>,
    /// Ordered natural key fields.
    pub manager_ref: Vec<String>,
    /// Collections that must be saved first.
    pub parent_collections: Vec<String>,
    pub attributes_blacklist: BTreeSet<String>,
    /// When set, only these attributes are written.
    pub inventory_attributes: Option<BTreeSet<String>>,
    /// Written under the incoming data.
    pub default_values: Map<String, JsonValue>,
    /// The snapshot holds every record in scope, so unseen ones are deleted.
    pub complete: bool,
    /// Records are shared across managed systems.
    pub global: bool,
    /// Overrides [`RefreshConfig::check_changed`].
    pub check_changed: Option<bool>,
    /// Column used to look up orphan candidates.
    pub secondary_key: Option<String>,
    pub custom_reconnect: Option<Arc<dyn ReconnectStrategy>>,
    pub custom_save: Option<Arc<dyn SaveStrategy>>,
    /// Named groups of collections read only to compute relationships.
    pub dependency_attributes: BTreeMap<String, Vec<String>>,
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model_class: None,
            manager_ref: vec![DEFAULT_MANAGER_REF.to_string()],
            parent_collections: Vec::new(),
            attributes_blacklist: BTreeSet::new(),
            inventory_attributes: None,
            default_values: Map::new(),
            complete: true,
            global: false,
            check_changed: None,
            secondary_key: None,
            custom_reconnect: None,
            custom_save: None,
            dependency_attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn is_key_field(&self, name: &str) -> bool {
        self.manager_ref.iter().any(|field| field == name)
    }

    /// Whether `name` from the incoming data is written to the record.
    ///
    /// Natural key fields are always written. Otherwise the allow-list is
    /// applied, then the blacklist; `id`, `type` and dependency attributes
    /// are never written.
    #[must_use]
    pub fn writes_attribute(&self, name: &str) -> bool {
        if PROTECTED_ATTRIBUTES.contains(&name) {
            return false;
        }
        if self.is_key_field(name) {
            return true;
        }
        if self.dependency_attributes.contains_key(name) {
            return false;
        }
        if let Some(allowed) = &self.inventory_attributes {
            if !allowed.contains(name) {
                return false;
            }
        }
        !self.attributes_blacklist.contains(name)
    }

    /// Every collection named by `dependency_attributes`, in declaration order.
    pub fn dependency_collections(&self) -> impl Iterator<Item = &str> {
        self.dependency_attributes
            .values()
            .flatten()
            .map(String::as_str)
    }
}

/// Objects of one entity kind observed in this pass, with their identity index.
#[derive(Debug, Clone)]
pub struct InventoryCollection {
    config: CollectionConfig,
    objects: Vec<InventoryObject>,
    index: IdentityIndex,
    /// Subtypes of the same table owned by other collections of the set.
    sibling_subtypes: BTreeSet<String>,
}

impl InventoryCollection {
    #[must_use]
    pub fn new(config: CollectionConfig) -> Self {
        Self {
            config,
            objects: Vec::new(),
            index: IdentityIndex::new(),
            sibling_subtypes: BTreeSet::new(),
        }
    }

    /// Build the collection and its identity index in one pass over `objects`.
    pub fn with_objects(
        config: CollectionConfig,
        objects: Vec<InventoryObject>,
    ) -> RefreshResult<Self> {
        let mut collection = Self {
            index: IdentityIndex::with_capacity(objects.len()),
            objects: Vec::with_capacity(objects.len()),
            sibling_subtypes: BTreeSet::new(),
            config,
        };
        for object in objects {
            collection.push(object)?;
        }
        Ok(collection)
    }

    /// Append an object. Returns its slot.
    pub fn push(&mut self, object: InventoryObject) -> RefreshResult<usize> {
        let key = self.key_of(&object);
        let slot = self.objects.len();
        self.index.insert(key, slot).map_err(|duplicate| {
            RefreshError::configuration(format!(
                "duplicate natural key {} in collection '{}'",
                duplicate.key, self.config.name
            ))
        })?;
        self.objects.push(object);
        Ok(slot)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[must_use]
    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    #[must_use]
    pub fn model_class(&self) -> Option<&ModelClass> {
        self.config.model_class.as_ref()
    }

    #[must_use]
    pub fn objects(&self) -> &[InventoryObject] {
        &self.objects
    }

    #[must_use]
    pub fn object(&self, slot: usize) -> Option<&InventoryObject> {
        self.objects.get(slot)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    #[must_use]
    pub fn index(&self) -> &IdentityIndex {
        &self.index
    }

    /// Projection of `object` onto `manager_ref`.
    #[must_use]
    pub fn key_of(&self, object: &InventoryObject) -> NaturalKey {
        let absent = AttributeValue::Value(JsonValue::Null);
        NaturalKey::from_attributes(
            self.config
                .manager_ref
                .iter()
                .map(|field| object.get(field).unwrap_or(&absent)),
        )
    }

    #[must_use]
    pub fn lookup(&self, key: &NaturalKey) -> Option<&InventoryObject> {
        self.index.lookup(key).and_then(|slot| self.objects.get(slot))
    }

    /// A deferred reference to the object with `key` in this collection.
    #[must_use]
    pub fn lazy_find(&self, key: NaturalKey) -> LazyRef {
        LazyRef::new(self.config.name.clone(), key)
    }

    /// Record the persisted id of the object in `slot`.
    pub fn assign_id(&mut self, slot: usize, id: RecordId) {
        if let Some(object) = self.objects.get_mut(slot) {
            object.id = Some(id);
        }
    }

    /// `manager_ref` as persisted columns: reference fields `x` become `x_id`.
    #[must_use]
    pub fn manager_ref_to_cols(&self) -> Vec<String> {
        self.config
            .manager_ref
            .iter()
            .map(|field| {
                let is_reference = self
                    .objects
                    .iter()
                    .any(|object| matches!(object.get(field), Some(AttributeValue::Ref(_))));
                if is_reference {
                    format!("{field}_id")
                } else {
                    field.clone()
                }
            })
            .collect()
    }

    /// Column used to match orphans; defaults to the first key column.
    #[must_use]
    pub fn secondary_key(&self) -> Option<String> {
        self.config
            .secondary_key
            .clone()
            .or_else(|| self.manager_ref_to_cols().into_iter().next())
    }

    /// Project a persisted record onto `columns` so it keys like a pending object.
    #[must_use]
    pub fn record_key(record: &PersistedRecord, columns: &[String]) -> NaturalKey {
        NaturalKey::new(
            columns
                .iter()
                .map(|column| canonical(record.attribute(column).unwrap_or(&JsonValue::Null)))
                .collect(),
        )
    }

    #[must_use]
    pub fn check_changed(&self, config: &RefreshConfig) -> bool {
        self.config.check_changed.unwrap_or(config.check_changed)
    }

    /// Subtype a record created for `object` is stored with.
    ///
    /// An observed string `type` wins over the collection's class. A `type`
    /// naming the base class means a plain base row.
    #[must_use]
    pub fn record_type_of(&self, object: &InventoryObject) -> Option<String> {
        let model = self.model_class()?;
        let observed = object
            .present("type")
            .and_then(AttributeValue::as_value)
            .and_then(JsonValue::as_str);
        match observed {
            Some(observed) if observed == model.base_class() => None,
            Some(observed) => Some(observed.to_string()),
            None => model.is_subclass().then(|| model.name().to_string()),
        }
    }

    /// Stored subtypes this collection is responsible for.
    ///
    /// A subtype collection owns its own class and every observed `type`.
    /// A base collection owns the whole table except subtypes claimed by
    /// other collections of the set.
    #[must_use]
    pub fn record_type_filter(&self) -> TypeFilter {
        match self.model_class() {
            Some(model) if model.is_subclass() => {
                let mut types: BTreeSet<Option<String>> = self
                    .objects
                    .iter()
                    .map(|object| self.record_type_of(object))
                    .collect();
                types.insert(Some(model.name().to_string()));
                TypeFilter::OneOf(types.into_iter().collect())
            }
            _ => TypeFilter::NoneOf(self.sibling_subtypes.iter().cloned().collect()),
        }
    }
}

/// Every collection of one pass, addressable by name.
#[derive(Debug, Clone, Default)]
pub struct CollectionSet {
    collections: Vec<InventoryCollection>,
    positions: HashMap<String, usize>,
}

impl CollectionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut collection: InventoryCollection) -> RefreshResult<usize> {
        if self.positions.contains_key(collection.name()) {
            return Err(RefreshError::configuration(format!(
                "collection '{}' declared twice",
                collection.name()
            )));
        }
        if let Some(model) = collection.model_class().cloned() {
            for existing in &mut self.collections {
                let Some(other) = existing.model_class().cloned() else {
                    continue;
                };
                if other.base_class() != model.base_class() {
                    continue;
                }
                if model.is_subclass() && !other.is_subclass() {
                    existing.sibling_subtypes.insert(model.name().to_string());
                } else if other.is_subclass() && !model.is_subclass() {
                    collection.sibling_subtypes.insert(other.name().to_string());
                }
            }
        }

        let position = self.collections.len();
        self.positions.insert(collection.name().to_string(), position);
        self.collections.push(collection);
        Ok(position)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&InventoryCollection> {
        self.position(name).map(|position| &self.collections[position])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut InventoryCollection> {
        let position = self.position(name)?;
        self.collections.get_mut(position)
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    #[must_use]
    pub fn at(&self, position: usize) -> Option<&InventoryCollection> {
        self.collections.get(position)
    }

    pub fn at_mut(&mut self, position: usize) -> Option<&mut InventoryCollection> {
        self.collections.get_mut(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InventoryCollection> {
        self.collections.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Resolve a deferred reference to the persisted record it points at.
    ///
    /// `Ok(None)` when the target key is not part of this snapshot. Fails
    /// with [`RefreshError::UnresolvedReference`] when the target has not
    /// been saved yet.
    pub fn resolve(&self, lazy: &LazyRef) -> RefreshResult<Option<RecordRef>> {
        let target = self.get(&lazy.collection).ok_or_else(|| {
            RefreshError::configuration(format!(
                "reference to unknown collection '{}'",
                lazy.collection
            ))
        })?;
        let Some(object) = target.lookup(&lazy.key) else {
            return Ok(None);
        };
        let model = target.model_class().ok_or_else(|| {
            RefreshError::configuration(format!(
                "collection '{}' has no model class and cannot be referenced",
                lazy.collection
            ))
        })?;
        let id = object
            .id
            .ok_or_else(|| RefreshError::UnresolvedReference {
                collection: lazy.collection.clone(),
                key: lazy.key.clone(),
            })?;
        Ok(Some(RecordRef::new(model, id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hosts_config() -> CollectionConfig {
        let mut config = CollectionConfig::new("hosts");
        config.model_class = Some(ModelClass::new("Host"));
        config
    }

    fn host(ems_ref: &str) -> InventoryObject {
        InventoryObject::new().with("ems_ref", ems_ref)
    }

    #[test]
    fn test_duplicate_natural_key_is_configuration_error() {
        let err = InventoryCollection::with_objects(hosts_config(), vec![host("h1"), host("h1")])
            .unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("hosts"));
    }

    #[test]
    fn test_lookup_by_natural_key() {
        let collection =
            InventoryCollection::with_objects(hosts_config(), vec![host("h1"), host("h2")])
                .unwrap();
        let key = NaturalKey::from_values([json!("h2")]);
        assert_eq!(collection.lookup(&key), Some(&host("h2")));
        assert!(collection
            .lookup(&NaturalKey::from_values([json!("h3")]))
            .is_none());
    }

    #[test]
    fn test_manager_ref_to_cols_maps_references() {
        let mut config = CollectionConfig::new("host_storages");
        config.manager_ref = vec!["host".into(), "read_only".into()];
        let collection = InventoryCollection::with_objects(
            config,
            vec![InventoryObject::new()
                .with("host", LazyRef::to("hosts", "h1"))
                .with("read_only", AttributeValue::Value(json!(false)))],
        )
        .unwrap();
        assert_eq!(collection.manager_ref_to_cols(), vec!["host_id", "read_only"]);
        assert_eq!(collection.secondary_key().as_deref(), Some("host_id"));
    }

    #[test]
    fn test_writes_attribute_filters() {
        let mut config = hosts_config();
        config.attributes_blacklist.insert("ems_children".into());
        config
            .dependency_attributes
            .insert("folders".into(), vec!["ems_folders".into()]);
        assert!(config.writes_attribute("ems_ref"));
        assert!(config.writes_attribute("name"));
        assert!(!config.writes_attribute("id"));
        assert!(!config.writes_attribute("type"));
        assert!(!config.writes_attribute("ems_children"));
        assert!(!config.writes_attribute("folders"));

        config.inventory_attributes = Some(["name".to_string()].into_iter().collect());
        assert!(config.writes_attribute("name"));
        assert!(config.writes_attribute("ems_ref"));
        assert!(!config.writes_attribute("power_state"));
    }

    #[test]
    fn test_resolve_requires_saved_target() {
        let mut set = CollectionSet::new();
        set.add(InventoryCollection::with_objects(hosts_config(), vec![host("h1")]).unwrap())
            .unwrap();

        let lazy = LazyRef::to("hosts", "h1");
        assert!(matches!(
            set.resolve(&lazy),
            Err(RefreshError::UnresolvedReference { .. })
        ));

        let id = RecordId::new();
        set.get_mut("hosts").unwrap().assign_id(0, id);
        let resolved = set.resolve(&lazy).unwrap().unwrap();
        assert_eq!(resolved, RecordRef::new(&ModelClass::new("Host"), id));

        assert!(set.resolve(&LazyRef::to("hosts", "h9")).unwrap().is_none());
        assert!(set
            .resolve(&LazyRef::to("switches", "s1"))
            .unwrap_err()
            .is_configuration_error());
    }

    #[test]
    fn test_collection_declared_twice() {
        let mut set = CollectionSet::new();
        set.add(InventoryCollection::new(hosts_config())).unwrap();
        assert!(set
            .add(InventoryCollection::new(hosts_config()))
            .unwrap_err()
            .is_configuration_error());
    }

    #[test]
    fn test_record_key_projects_columns() {
        let record = PersistedRecord::new(&ModelClass::new("Host"))
            .with_attribute("ems_ref", json!("h1"));
        let key = InventoryCollection::record_key(&record, &["ems_ref".into(), "uid".into()]);
        assert_eq!(key, NaturalKey::from_values([json!("h1"), JsonValue::Null]));
    }

    fn with_model(name: &str, model: ModelClass, objects: Vec<InventoryObject>) -> InventoryCollection {
        let mut config = CollectionConfig::new(name);
        config.model_class = Some(model);
        InventoryCollection::with_objects(config, objects).unwrap()
    }

    #[test]
    fn test_record_type_of_prefers_observed_type() {
        let hosts = with_model("hosts", ModelClass::new("Host"), vec![]);
        assert_eq!(
            hosts.record_type_of(&host("h1").with("type", "VmwareHost")),
            Some("VmwareHost".to_string())
        );
        assert_eq!(hosts.record_type_of(&host("h1").with("type", "Host")), None);
        assert_eq!(hosts.record_type_of(&host("h1")), None);

        let vms = with_model("vms", ModelClass::with_base("Vm", "VmOrTemplate"), vec![]);
        assert_eq!(vms.record_type_of(&host("vm-1")), Some("Vm".to_string()));
    }

    #[test]
    fn test_subtype_collection_owns_its_class_and_observed_types() {
        let vms = with_model(
            "vms",
            ModelClass::with_base("Vm", "VmOrTemplate"),
            vec![host("vm-1").with("type", "VmwareVm"), host("vm-2")],
        );
        assert_eq!(
            vms.record_type_filter(),
            TypeFilter::OneOf(vec![Some("Vm".to_string()), Some("VmwareVm".to_string())])
        );
    }

    #[test]
    fn test_base_collection_excludes_sibling_subtypes() {
        let mut set = CollectionSet::new();
        set.add(with_model("ems_folders", ModelClass::new("EmsFolder"), vec![]))
            .unwrap();
        set.add(with_model(
            "datacenters",
            ModelClass::with_base("Datacenter", "EmsFolder"),
            vec![],
        ))
        .unwrap();
        set.add(with_model("late_folders", ModelClass::new("EmsFolder"), vec![]))
            .unwrap();
        set.add(with_model("ems_clusters", ModelClass::new("EmsCluster"), vec![]))
            .unwrap();

        let excludes_datacenters = TypeFilter::NoneOf(vec!["Datacenter".to_string()]);
        assert_eq!(
            set.get("ems_folders").unwrap().record_type_filter(),
            excludes_datacenters
        );
        assert_eq!(
            set.get("late_folders").unwrap().record_type_filter(),
            excludes_datacenters
        );
        assert_eq!(
            set.get("ems_clusters").unwrap().record_type_filter(),
            TypeFilter::NoneOf(vec![])
        );
    }
}
