//! Record queries understood by every [`RecordStore`](crate::RecordStore).
//!
//! The vocabulary is small: an owner predicate, a subtype predicate and a
//! single attribute-membership predicate, all optional and combined with AND.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::ids::RecordId;
use crate::model::PersistedRecord;

/// Predicate on the owning foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum OwnerFilter {
    /// `owner_id IS NULL`
    Unowned,
    /// `owner_id = $id`
    OwnedBy(RecordId),
}

/// `attributes[name] IN (values)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeFilter {
    pub name: String,
    pub values: Vec<JsonValue>,
}

/// Predicate on the subtype discriminator of single-table-inheritance rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "types", rename_all = "snake_case")]
pub enum TypeFilter {
    /// `record_type` is one of the listed values. `None` stands for rows
    /// stored as the plain base class.
    OneOf(Vec<Option<String>>),
    /// `record_type IS NULL OR record_type <> ALL(types)`
    NoneOf(Vec<String>),
}

impl TypeFilter {
    #[must_use]
    pub fn matches(&self, record_type: Option<&str>) -> bool {
        match self {
            Self::OneOf(types) => types.iter().any(|t| t.as_deref() == record_type),
            Self::NoneOf(types) => record_type.map_or(true, |t| !types.iter().any(|x| x == t)),
        }
    }
}

/// Filter for [`find_where`](crate::RecordStore::find_where) and
/// [`count_where`](crate::RecordStore::count_where).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<TypeFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_in: Option<AttributeFilter>,
}

impl RecordQuery {
    /// Every record of the model.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Records without an owning system.
    #[must_use]
    pub fn unowned() -> Self {
        Self {
            owner: Some(OwnerFilter::Unowned),
            ..Self::default()
        }
    }

    /// Records owned by `owner_id`.
    #[must_use]
    pub fn owned_by(owner_id: RecordId) -> Self {
        Self {
            owner: Some(OwnerFilter::OwnedBy(owner_id)),
            ..Self::default()
        }
    }

    /// Restrict to records whose attribute `name` is one of `values`.
    #[must_use]
    pub fn with_attribute_in(mut self, name: impl Into<String>, values: Vec<JsonValue>) -> Self {
        self.attribute_in = Some(AttributeFilter {
            name: name.into(),
            values,
        });
        self
    }

    /// Restrict to the subtypes accepted by `filter`.
    #[must_use]
    pub fn with_record_type(mut self, filter: TypeFilter) -> Self {
        self.record_type = Some(filter);
        self
    }

    /// Evaluate the query against a record in memory.
    #[must_use]
    pub fn matches(&self, record: &PersistedRecord) -> bool {
        let owner_ok = match self.owner {
            None => true,
            Some(OwnerFilter::Unowned) => record.owner_id.is_none(),
            Some(OwnerFilter::OwnedBy(owner)) => record.owner_id == Some(owner),
        };
        let attribute_ok = match &self.attribute_in {
            None => true,
            Some(filter) => record
                .attribute(&filter.name)
                .is_some_and(|value| filter.values.contains(value)),
        };
        let type_ok = self
            .record_type
            .as_ref()
            .map_or(true, |filter| filter.matches(record.record_type.as_deref()));
        owner_ok && type_ok && attribute_ok
    }
}
