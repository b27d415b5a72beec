//! Persisted record model.
//!
//! Records are stored one row per entity under their base model class, with
//! the concrete subtype kept as a discriminator. Hierarchy edges between
//! records are addressed by [`RecordRef`] and grouped by [`RelationshipKind`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

use crate::ids::RecordId;

/// Attribute names that are never copied onto a record's attributes.
///
/// `type` only selects the subtype of a newly created record.
pub const PROTECTED_ATTRIBUTES: [&str; 2] = ["id", "type"];

/// A persisted model class with its single-table-inheritance base.
///
/// `ModelClass::with_base("VmwareHost", "Host")` is stored and compared as
/// `Host`; the subtype only travels as the record's `record_type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelClass {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_class: Option<String>,
}

impl ModelClass {
    /// A model class that is its own base.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_class: None,
        }
    }

    /// A subtype stored under `base`.
    pub fn with_base(name: impl Into<String>, base: impl Into<String>) -> Self {
        let name = name.into();
        let base = base.into();
        let base_class = if base == name { None } else { Some(base) };
        Self { name, base_class }
    }

    /// The concrete class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The most-general persisted type.
    #[must_use]
    pub fn base_class(&self) -> &str {
        self.base_class.as_deref().unwrap_or(&self.name)
    }

    /// The base class as a model class of its own.
    #[must_use]
    pub fn base(&self) -> ModelClass {
        ModelClass::new(self.base_class())
    }

    /// Whether this class is a subtype of another persisted class.
    #[must_use]
    pub fn is_subclass(&self) -> bool {
        self.base_class.is_some()
    }
}

impl fmt::Display for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Named category of hierarchy edges. Each kind forms its own forest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipKind(String);

impl RelationshipKind {
    /// Folder/cluster/host tree exposed by the managed system.
    pub const EMS_METADATA: &'static str = "ems_metadata";

    /// Parent/child lineage between virtual machines and templates.
    pub const GENEALOGY: &'static str = "genealogy";

    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    #[must_use]
    pub fn ems_metadata() -> Self {
        Self::new(Self::EMS_METADATA)
    }

    #[must_use]
    pub fn genealogy() -> Self {
        Self::new(Self::GENEALOGY)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a persisted record by (base model, id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordRef {
    /// Base model class name.
    pub model: String,
    /// Record identifier.
    pub id: RecordId,
}

impl RecordRef {
    /// Build a reference, normalizing the model to its base class.
    pub fn new(model: &ModelClass, id: RecordId) -> Self {
        Self {
            model: model.base_class().to_string(),
            id,
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.model, self.id)
    }
}

/// Durable representation of one inventory entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    /// Primary identifier.
    pub id: RecordId,
    /// Base model class name (the table the row lives in).
    pub model: String,
    /// Concrete subtype discriminator, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    /// Owning managed system. `None` marks an orphan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<RecordId>,
    /// Attribute payload.
    #[serde(default)]
    pub attributes: Map<String, JsonValue>,
}

impl PersistedRecord {
    /// Create a new, not yet saved record of the given class.
    #[must_use]
    pub fn new(model: &ModelClass) -> Self {
        Self {
            id: RecordId::new(),
            model: model.base_class().to_string(),
            record_type: model.is_subclass().then(|| model.name().to_string()),
            owner_id: None,
            attributes: Map::new(),
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Builder-style subtype setter.
    #[must_use]
    pub fn with_record_type(mut self, record_type: Option<String>) -> Self {
        self.record_type = record_type;
        self
    }

    /// Builder-style owner setter.
    #[must_use]
    pub fn with_owner(mut self, owner_id: Option<RecordId>) -> Self {
        self.owner_id = owner_id;
        self
    }

    /// Reference to this record for relationship edges.
    #[must_use]
    pub fn record_ref(&self) -> RecordRef {
        RecordRef {
            model: self.model.clone(),
            id: self.id,
        }
    }

    /// Look up one attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&JsonValue> {
        self.attributes.get(name)
    }

    /// Whether the record has no owning system.
    #[must_use]
    pub fn is_orphan(&self) -> bool {
        self.owner_id.is_none()
    }

    /// Copy incoming attributes onto the record, skipping `id` and `type`.
    ///
    /// Returns `true` when at least one stored value changed.
    pub fn assign_attributes(&mut self, attributes: &Map<String, JsonValue>) -> bool {
        let mut changed = false;
        for (name, value) in attributes {
            if PROTECTED_ATTRIBUTES.contains(&name.as_str()) {
                continue;
            }
            if self.attributes.get(name) != Some(value) {
                self.attributes.insert(name.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }

    /// Set the owning system. Returns `true` when it changed.
    pub fn assign_owner(&mut self, owner_id: Option<RecordId>) -> bool {
        if self.owner_id == owner_id {
            false
        } else {
            self.owner_id = owner_id;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_class_base_normalization() {
        let host = ModelClass::with_base("VmwareHost", "Host");
        assert_eq!(host.name(), "VmwareHost");
        assert_eq!(host.base_class(), "Host");
        assert!(host.is_subclass());
        assert_eq!(host.base(), ModelClass::new("Host"));

        let folder = ModelClass::with_base("EmsFolder", "EmsFolder");
        assert!(!folder.is_subclass());
        assert_eq!(folder.base_class(), "EmsFolder");
    }

    #[test]
    fn test_new_record_carries_subtype() {
        let record = PersistedRecord::new(&ModelClass::with_base("VmwareHost", "Host"));
        assert_eq!(record.model, "Host");
        assert_eq!(record.record_type.as_deref(), Some("VmwareHost"));
        assert!(record.is_orphan());

        let plain = PersistedRecord::new(&ModelClass::new("Storage"));
        assert!(plain.record_type.is_none());
    }

    #[test]
    fn test_record_ref_uses_base_class() {
        let id = RecordId::new();
        let reference = RecordRef::new(&ModelClass::with_base("VmwareHost", "Host"), id);
        assert_eq!(reference.model, "Host");
        assert_eq!(reference.to_string(), format!("Host:{id}"));
    }

    #[test]
    fn test_assign_attributes_skips_protected() {
        let mut record = PersistedRecord::new(&ModelClass::new("Host"))
            .with_attribute("name", json!("esx-1"));
        let original_id = record.id;

        let mut incoming = Map::new();
        incoming.insert("id".into(), json!("bogus"));
        incoming.insert("type".into(), json!("Other"));
        incoming.insert("name".into(), json!("esx-1"));

        assert!(!record.assign_attributes(&incoming));
        assert_eq!(record.id, original_id);
        assert!(record.attribute("type").is_none());

        incoming.insert("power_state".into(), json!("on"));
        assert!(record.assign_attributes(&incoming));
        assert_eq!(record.attribute("power_state"), Some(&json!("on")));
    }

    #[test]
    fn test_assign_owner_reports_change() {
        let owner = RecordId::new();
        let mut record = PersistedRecord::new(&ModelClass::new("Host"));
        assert!(record.assign_owner(Some(owner)));
        assert!(!record.assign_owner(Some(owner)));
        assert!(!record.is_orphan());
    }
}
