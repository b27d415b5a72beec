//! Identity index and the pending index used by the save path.

use serde_json::{Map, Value as JsonValue};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::value::NaturalKey;

/// Natural key to object slot within one collection.
///
/// A bijection for the duration of a pass: inserting a key twice is rejected
/// and reported back to the caller as a configuration error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityIndex {
    slots: HashMap<NaturalKey, usize>,
}

/// Returned when a key is already indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey {
    pub key: NaturalKey,
    pub existing: usize,
}

impl IdentityIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: HashMap::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, key: NaturalKey, slot: usize) -> Result<(), DuplicateKey> {
        match self.slots.entry(key) {
            Entry::Occupied(entry) => Err(DuplicateKey {
                key: entry.key().clone(),
                existing: *entry.get(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(slot);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn lookup(&self, key: &NaturalKey) -> Option<usize> {
        self.slots.get(key).copied()
    }

    pub fn remove(&mut self, key: &NaturalKey) -> Option<usize> {
        self.slots.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &NaturalKey) -> bool {
        self.slots.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Every key in ascending order.
    #[must_use]
    pub fn sorted_keys(&self) -> Vec<NaturalKey> {
        let mut keys: Vec<NaturalKey> = self.slots.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaturalKey, usize)> {
        self.slots.iter().map(|(key, slot)| (key, *slot))
    }
}

/// Objects still waiting to be saved, keyed by record key, with the
/// attribute hash each one will write.
///
/// The orphan reconnector removes the entries it resolves so the default
/// saver never creates them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingIndex {
    objects: IdentityIndex,
    attributes: HashMap<NaturalKey, Map<String, JsonValue>>,
}

impl PendingIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        key: NaturalKey,
        slot: usize,
        attributes: Map<String, JsonValue>,
    ) -> Result<(), DuplicateKey> {
        self.objects.insert(key.clone(), slot)?;
        self.attributes.insert(key, attributes);
        Ok(())
    }

    /// Remove an entry from both the object index and the attribute map.
    pub fn remove(&mut self, key: &NaturalKey) -> Option<(usize, Map<String, JsonValue>)> {
        let slot = self.objects.remove(key)?;
        let attributes = self.attributes.remove(key).unwrap_or_default();
        Some((slot, attributes))
    }

    #[must_use]
    pub fn attributes(&self, key: &NaturalKey) -> Option<&Map<String, JsonValue>> {
        self.attributes.get(key)
    }

    #[must_use]
    pub fn slot(&self, key: &NaturalKey) -> Option<usize> {
        self.objects.lookup(key)
    }

    #[must_use]
    pub fn contains(&self, key: &NaturalKey) -> bool {
        self.objects.contains(key)
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
    pub fn sorted_keys(&self) -> Vec<NaturalKey> {
        self.objects.sorted_keys()
    }

    /// Slots of every pending object.
    pub fn slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.objects.iter().map(|(_, slot)| slot)
    }

    /// Drain into `(key, slot, attributes)` in ascending key order.
    #[must_use]
    pub fn into_sorted_entries(mut self) -> Vec<(NaturalKey, usize, Map<String, JsonValue>)> {
        self.sorted_keys()
            .into_iter()
            .filter_map(|key| {
                let (slot, attributes) = self.remove(&key)?;
                Some((key, slot, attributes))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(value: &str) -> NaturalKey {
        NaturalKey::from_values([json!(value)])
    }

    fn attrs(ems_ref: &str) -> Map<String, JsonValue> {
        let mut map = Map::new();
        map.insert("ems_ref".into(), json!(ems_ref));
        map
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut index = IdentityIndex::new();
        index.insert(key("host-1"), 0).unwrap();
        let err = index.insert(key("host-1"), 1).unwrap_err();
        assert_eq!(err.existing, 0);
        assert_eq!(index.lookup(&key("host-1")), Some(0));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_sorted_keys() {
        let mut index = IdentityIndex::with_capacity(3);
        for (slot, name) in ["c", "a", "b"].iter().enumerate() {
            index.insert(key(name), slot).unwrap();
        }
        assert_eq!(index.sorted_keys(), vec![key("a"), key("b"), key("c")]);
    }

    #[test]
    fn test_pending_remove_clears_both_maps() {
        let mut pending = PendingIndex::new();
        pending.insert(key("host-42"), 3, attrs("host-42")).unwrap();

        let (slot, attributes) = pending.remove(&key("host-42")).unwrap();
        assert_eq!(slot, 3);
        assert_eq!(attributes.get("ems_ref"), Some(&json!("host-42")));
        assert!(pending.is_empty());
        assert!(pending.attributes(&key("host-42")).is_none());
        assert!(pending.remove(&key("host-42")).is_none());
    }

    #[test]
    fn test_into_sorted_entries() {
        let mut pending = PendingIndex::new();
        pending.insert(key("b"), 1, attrs("b")).unwrap();
        pending.insert(key("a"), 0, attrs("a")).unwrap();

        let slots: Vec<usize> = pending
            .into_sorted_entries()
            .into_iter()
            .map(|(_, slot, _)| slot)
            .collect();
        assert_eq!(slots, vec![0, 1]);
    }
}
