//! Attribute values, lazy references and natural keys.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Deferred link to an object of another collection.
///
/// Holds only the target collection name and the target's natural key, so
/// collections can reference each other in any construction order. The link
/// is resolved against the target's identity index when a persisted id is
/// needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LazyRef {
    pub collection: String,
    pub key: NaturalKey,
}

impl LazyRef {
    pub fn new(collection: impl Into<String>, key: NaturalKey) -> Self {
        Self {
            collection: collection.into(),
            key,
        }
    }

    /// Reference an object whose natural key is a single value.
    pub fn to(collection: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::new(collection, NaturalKey::from_values([value.into()]))
    }
}

impl fmt::Display for LazyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.collection, self.key)
    }
}

/// One attribute of an inventory object.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Plain JSON value written as-is.
    Value(JsonValue),
    /// Reference to another inventory object, written as `<name>_id`.
    Ref(LazyRef),
}

impl AttributeValue {
    /// `Value(Null)` counts as absent.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Value(JsonValue::Null))
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&JsonValue> {
        match self {
            Self::Value(value) => Some(value),
            Self::Ref(_) => None,
        }
    }

    #[must_use]
    pub fn as_lazy_ref(&self) -> Option<&LazyRef> {
        match self {
            Self::Value(_) => None,
            Self::Ref(lazy) => Some(lazy),
        }
    }

    /// Canonical string used as a natural key component.
    #[must_use]
    pub fn key_component(&self) -> String {
        match self {
            Self::Value(value) => canonical(value),
            Self::Ref(lazy) => lazy.to_string(),
        }
    }
}

impl From<JsonValue> for AttributeValue {
    fn from(value: JsonValue) -> Self {
        Self::Value(value)
    }
}

impl From<LazyRef> for AttributeValue {
    fn from(lazy: LazyRef) -> Self {
        Self::Ref(lazy)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Value(JsonValue::String(value.to_string()))
    }
}

/// Ordered tuple of canonical key components.
///
/// Components are compact JSON strings, so `"42"` and `42` are different
/// keys and object members compare independent of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NaturalKey(Vec<String>);

impl NaturalKey {
    /// Build a key from already canonical components.
    #[must_use]
    pub fn new(components: Vec<String>) -> Self {
        Self(components)
    }

    /// Build a key from plain JSON values.
    pub fn from_values(values: impl IntoIterator<Item = JsonValue>) -> Self {
        Self(values.into_iter().map(|value| canonical(&value)).collect())
    }

    /// Build a key from attribute values, references included.
    pub fn from_attributes<'a>(values: impl IntoIterator<Item = &'a AttributeValue>) -> Self {
        Self(values.into_iter().map(AttributeValue::key_component).collect())
    }

    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// Compact JSON rendering.
pub(crate) fn canonical(value: &JsonValue) -> String {
    value.to_string()
}
