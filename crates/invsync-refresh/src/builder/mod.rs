//! Collection declarations.
//!
//! [`CollectionBuilder`] assembles a [`CollectionConfig`] property by
//! property. The [`infra`] module ships the declarations for
//! infrastructure inventory.

pub mod infra;

use invsync_core::ModelClass;
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::collection::{CollectionConfig, InventoryCollection};
use crate::error::RefreshResult;
use crate::object::InventoryObject;
use crate::strategy::{ReconnectStrategy, SaveStrategy};

/// Fluent builder for [`CollectionConfig`].
#[derive(Debug, Clone)]
pub struct CollectionBuilder {
    config: CollectionConfig,
}

fn owned<'a>(names: &'a [&'a str]) -> impl Iterator<Item = String> + 'a {
    names.iter().map(|name| (*name).to_string())
}

impl CollectionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: CollectionConfig::new(name),
        }
    }

    #[must_use]
    pub fn model_class(mut self, model_class: ModelClass) -> Self {
        self.config.model_class = Some(model_class);
        self
    }

    /// Relationship-only collections persist nothing themselves.
    #[must_use]
    pub fn skip_model_class(mut self) -> Self {
        self.config.model_class = None;
        self
    }

    #[must_use]
    pub fn manager_ref(mut self, fields: &[&str]) -> Self {
        self.config.manager_ref = owned(fields).collect();
        self
    }

    #[must_use]
    pub fn parent_collections(mut self, names: &[&str]) -> Self {
        self.config.parent_collections.extend(owned(names));
        self
    }

    #[must_use]
    pub fn attributes_blacklist(mut self, names: &[&str]) -> Self {
        self.config.attributes_blacklist.extend(owned(names));
        self
    }

    /// Extend the allow-list. Once set, nothing outside it is written.
    #[must_use]
    pub fn inventory_attributes(mut self, names: &[&str]) -> Self {
        self.config
            .inventory_attributes
            .get_or_insert_with(BTreeSet::new)
            .extend(owned(names));
        self
    }

    #[must_use]
    pub fn default_value(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.config.default_values.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn complete(mut self, complete: bool) -> Self {
        self.config.complete = complete;
        self
    }

    /// Records are shared by every managed system and never owner scoped.
    #[must_use]
    pub fn global(mut self, global: bool) -> Self {
        self.config.global = global;
        self
    }

    #[must_use]
    pub fn check_changed(mut self, check_changed: bool) -> Self {
        self.config.check_changed = Some(check_changed);
        self
    }

    #[must_use]
    pub fn secondary_key(mut self, column: impl Into<String>) -> Self {
        self.config.secondary_key = Some(column.into());
        self
    }

    #[must_use]
    pub fn custom_reconnect(mut self, strategy: impl ReconnectStrategy + 'static) -> Self {
        self.config.custom_reconnect = Some(Arc::new(strategy));
        self
    }

    #[must_use]
    pub fn custom_save(mut self, strategy: impl SaveStrategy + 'static) -> Self {
        self.config.custom_save = Some(Arc::new(strategy));
        self
    }

    #[must_use]
    pub fn dependency_attributes(mut self, name: impl Into<String>, collections: &[&str]) -> Self {
        self.config
            .dependency_attributes
            .entry(name.into())
            .or_default()
            .extend(owned(collections));
        self
    }

    #[must_use]
    pub fn build(self) -> CollectionConfig {
        self.config
    }

    /// Build an empty collection.
    #[must_use]
    pub fn collection(self) -> InventoryCollection {
        InventoryCollection::new(self.config)
    }

    /// Build a collection holding `objects`, indexing them.
    pub fn with_objects(self, objects: Vec<InventoryObject>) -> RefreshResult<InventoryCollection> {
        InventoryCollection::with_objects(self.config, objects)
    }
}
