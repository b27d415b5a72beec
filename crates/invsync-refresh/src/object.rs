//! Inventory objects.

use invsync_core::RecordId;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

use crate::value::AttributeValue;

/// One entity observed in the current snapshot.
///
/// `id` is empty until the object is matched to, reconnected to or saved as
/// a persisted record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryObject {
    pub data: BTreeMap<String, AttributeValue>,
    pub id: Option<RecordId>,
}

impl InventoryObject {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Object whose attributes are all plain values.
    #[must_use]
    pub fn from_map(attributes: Map<String, JsonValue>) -> Self {
        Self {
            data: attributes
                .into_iter()
                .map(|(name, value)| (name, AttributeValue::Value(value)))
                .collect(),
            id: None,
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.data.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.data.get(name)
    }

    /// The attribute, unless it is missing or `null`.
    #[must_use]
    pub fn present(&self, name: &str) -> Option<&AttributeValue> {
        self.data.get(name).filter(|value| !value.is_absent())
    }
}
