//! Collection dependency ordering.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::collection::{CollectionSet, InventoryCollection};
use crate::error::{RefreshError, RefreshResult};
use crate::value::AttributeValue;

/// Names of the collections `collection` must be saved after.
///
/// Covers parent collections, dependency attributes, reference targets of
/// written attributes and, for custom save collections, every reference
/// target inside their dependency collections. Self references are dropped.
pub fn dependencies_of(
    collection: &InventoryCollection,
    collections: &CollectionSet,
    relationship_keys: &BTreeSet<String>,
) -> RefreshResult<BTreeSet<String>> {
    let config = collection.config();
    let mut dependencies: BTreeSet<String> = config.parent_collections.iter().cloned().collect();

    if config.custom_save.is_some() {
        for name in config.dependency_collections() {
            dependencies.insert(name.to_string());
            let dependency = collections.get(name).ok_or_else(|| unknown(collection, name))?;
            for object in dependency.objects() {
                for value in object.data.values() {
                    if let AttributeValue::Ref(lazy) = value {
                        dependencies.insert(lazy.collection.clone());
                    }
                }
            }
        }
    } else {
        dependencies.extend(config.dependency_collections().map(str::to_string));
        for object in collection.objects() {
            for (name, value) in &object.data {
                let AttributeValue::Ref(lazy) = value else {
                    continue;
                };
                let written = config.writes_attribute(name)
                    && (config.is_key_field(name) || !relationship_keys.contains(name));
                if written {
                    dependencies.insert(lazy.collection.clone());
                }
            }
        }
    }

    dependencies.remove(collection.name());
    for name in &dependencies {
        if collections.get(name).is_none() {
            return Err(unknown(collection, name));
        }
    }
    Ok(dependencies)
}

/// Positions of every collection, dependencies first.
///
/// Ties keep declaration order. A cycle is a configuration error.
pub fn dependency_order(
    collections: &CollectionSet,
    relationship_keys: &HashMap<String, BTreeSet<String>>,
) -> RefreshResult<Vec<usize>> {
    let empty = BTreeSet::new();
    let mut remaining: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();

    for (position, collection) in collections.iter().enumerate() {
        let keys = relationship_keys.get(collection.name()).unwrap_or(&empty);
        let dependencies = dependencies_of(collection, collections, keys)?
            .iter()
            .filter_map(|name| collections.position(name))
            .collect();
        remaining.insert(position, dependencies);
    }

    let mut order = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let ready = remaining
            .iter()
            .find(|(_, dependencies)| dependencies.is_empty())
            .map(|(position, _)| *position);
        let Some(ready) = ready else {
            let names: Vec<&str> = remaining
                .keys()
                .filter_map(|position| collections.at(*position))
                .map(InventoryCollection::name)
                .collect();
            return Err(RefreshError::configuration(format!(
                "dependency cycle between collections: {}",
                names.join(", ")
            )));
        };

        remaining.remove(&ready);
        for dependencies in remaining.values_mut() {
            dependencies.remove(&ready);
        }
        order.push(ready);
    }

    Ok(order)
}

fn unknown(collection: &InventoryCollection, name: &str) -> RefreshError {
    RefreshError::configuration(format!(
        "collection '{}' depends on unknown collection '{name}'",
        collection.name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CollectionConfig;
    use crate::object::InventoryObject;
    use crate::relationship::RelationshipSaver;
    use crate::value::LazyRef;
    use invsync_core::{ModelClass, RelationshipKind};
    use std::sync::Arc;

    fn config(name: &str, model: &str) -> CollectionConfig {
        let mut config = CollectionConfig::new(name);
        config.model_class = Some(ModelClass::new(model));
        config
    }

    fn names(collections: &CollectionSet, order: &[usize]) -> Vec<String> {
        order
            .iter()
            .map(|position| collections.at(*position).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_parents_and_references_come_first() {
        let mut set = CollectionSet::new();
        let mut networks = config("host_networks", "Network");
        networks.parent_collections = vec!["hosts".into()];
        set.add(InventoryCollection::new(networks)).unwrap();
        set.add(
            InventoryCollection::with_objects(
                config("hosts", "Host"),
                vec![InventoryObject::new()
                    .with("ems_ref", "host-1")
                    .with("ems_cluster", LazyRef::to("ems_clusters", "c1"))],
            )
            .unwrap(),
        )
        .unwrap();
        set.add(InventoryCollection::new(config("ems_clusters", "EmsCluster")))
            .unwrap();

        let order = dependency_order(&set, &HashMap::new()).unwrap();
        assert_eq!(names(&set, &order), vec!["ems_clusters", "hosts", "host_networks"]);
    }

    #[test]
    fn test_relationship_collections_follow_parent_targets() {
        let mut relationship = CollectionConfig::new("parent_folders");
        relationship.custom_save = Some(Arc::new(RelationshipSaver::new(
            "parent",
            RelationshipKind::ems_metadata(),
            ModelClass::new("EmsFolder"),
        )));
        relationship
            .dependency_attributes
            .insert("hosts".into(), vec!["hosts".into()]);

        let mut set = CollectionSet::new();
        set.add(InventoryCollection::new(relationship)).unwrap();
        set.add(
            InventoryCollection::with_objects(
                config("hosts", "Host"),
                vec![InventoryObject::new()
                    .with("ems_ref", "host-1")
                    .with("parent", LazyRef::to("ems_folders", "group-h1"))],
            )
            .unwrap(),
        )
        .unwrap();
        set.add(InventoryCollection::new(config("ems_folders", "EmsFolder")))
            .unwrap();

        let mut keys = HashMap::new();
        keys.insert("hosts".to_string(), ["parent".to_string()].into_iter().collect());
        let order = dependency_order(&set, &keys).unwrap();
        assert_eq!(names(&set, &order), vec!["hosts", "ems_folders", "parent_folders"]);
    }

    #[test]
    fn test_cycle_is_configuration_error() {
        let mut a = config("a", "A");
        a.parent_collections = vec!["b".into()];
        let mut b = config("b", "B");
        b.parent_collections = vec!["a".into()];

        let mut set = CollectionSet::new();
        set.add(InventoryCollection::new(a)).unwrap();
        set.add(InventoryCollection::new(b)).unwrap();

        let err = dependency_order(&set, &HashMap::new()).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn test_unknown_parent_collection() {
        let mut networks = config("networks", "Network");
        networks.parent_collections = vec!["vms".into()];
        let mut set = CollectionSet::new();
        set.add(InventoryCollection::new(networks)).unwrap();

        assert!(dependency_order(&set, &HashMap::new())
            .unwrap_err()
            .is_configuration_error());
    }
}
