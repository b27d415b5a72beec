//! Refresh driver.
//!
//! [`Persister`] owns the collections of one pass for one managed system
//! and saves them in dependency order: default collections through the
//! pending index, optional reconnect and [`DefaultSaver`], custom
//! collections through their [`SaveStrategy`](crate::SaveStrategy).

use invsync_core::{PersistedRecord, RecordStore, RunId};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::collection::{CollectionSet, InventoryCollection};
use crate::config::RefreshConfig;
use crate::error::{RefreshError, RefreshResult};
use crate::graph::dependency_order;
use crate::saver::{prepare, DefaultSaver};
use crate::statistics::{CollectionStatistics, RefreshStatistics};
use crate::strategy::RefreshContext;

/// One refresh pass for one managed system.
#[derive(Debug)]
pub struct Persister {
    owner: PersistedRecord,
    config: RefreshConfig,
    collections: CollectionSet,
}

impl Persister {
    /// `owner` is the managed system record every owned collection is
    /// scoped to.
    #[must_use]
    pub fn new(owner: PersistedRecord, config: RefreshConfig) -> Self {
        Self {
            owner,
            config,
            collections: CollectionSet::new(),
        }
    }

    pub fn add_collection(&mut self, collection: InventoryCollection) -> RefreshResult<()> {
        self.collections.add(collection).map(|_| ())
    }

    #[must_use]
    pub fn owner(&self) -> &PersistedRecord {
        &self.owner
    }

    #[must_use]
    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    #[must_use]
    pub fn collections(&self) -> &CollectionSet {
        &self.collections
    }

    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&InventoryCollection> {
        self.collections.get(name)
    }

    pub fn collection_mut(&mut self, name: &str) -> Option<&mut InventoryCollection> {
        self.collections.get_mut(name)
    }

    /// Relationship keys read by custom save strategies, per dependency
    /// collection.
    fn relationship_keys(&self) -> HashMap<String, BTreeSet<String>> {
        let mut keys: HashMap<String, BTreeSet<String>> = HashMap::new();
        for collection in self.collections.iter() {
            let Some(strategy) = &collection.config().custom_save else {
                continue;
            };
            let read = strategy.relationship_keys();
            for name in collection.config().dependency_collections() {
                keys.entry(name.to_string())
                    .or_default()
                    .extend(read.iter().cloned());
            }
        }
        keys
    }

    /// Check every declaration and compute the save order.
    pub fn validate(&self) -> RefreshResult<Vec<usize>> {
        self.config.validate()?;

        for collection in self.collections.iter() {
            let config = collection.config();
            if config.custom_save.is_some() {
                if config.dependency_attributes.is_empty() {
                    return Err(RefreshError::configuration(format!(
                        "collection '{}' has a custom save strategy but no dependency attributes",
                        collection.name()
                    )));
                }
                continue;
            }
            if collection.model_class().is_none() {
                return Err(RefreshError::configuration(format!(
                    "collection '{}' has no model class",
                    collection.name()
                )));
            }
            if let Some(strategy) = &config.custom_reconnect {
                strategy.validate(collection)?;
            }
        }

        dependency_order(&self.collections, &self.relationship_keys())
    }

    /// Run the pass against `store`.
    #[instrument(
        skip_all,
        fields(run_id = %RunId::new(), owner = %self.owner.id, collections = self.collections.len())
    )]
    pub async fn persist(&mut self, store: &dyn RecordStore) -> RefreshResult<RefreshStatistics> {
        let started = Instant::now();
        let order = self.validate()?;
        let relationship_keys = self.relationship_keys();
        let no_keys = BTreeSet::new();

        let ctx = RefreshContext {
            store,
            owner: &self.owner,
            config: &self.config,
        };
        let mut statistics = RefreshStatistics::new();

        for position in order {
            let Some(collection) = self.collections.at(position) else {
                continue;
            };
            let name = collection.name().to_string();
            let mut stats = CollectionStatistics::new();
            debug!(collection = %name, objects = collection.len(), "Saving collection");

            if let Some(strategy) = collection.config().custom_save.clone() {
                strategy
                    .save(&ctx, collection, &self.collections, &mut stats)
                    .await?;
            } else {
                let keys = relationship_keys.get(&name).unwrap_or(&no_keys);
                let mut pending = prepare(&self.collections, collection, keys)?;
                let Some(collection) = self.collections.at_mut(position) else {
                    continue;
                };
                if let Some(strategy) = collection.config().custom_reconnect.clone() {
                    strategy
                        .reconnect(&ctx, collection, &mut pending, &mut stats)
                        .await?;
                }
                DefaultSaver
                    .save(&ctx, collection, pending, &mut stats)
                    .await?;
            }

            if stats.has_changes() || stats.reconnected > 0 {
                info!(
                    collection = %name,
                    created = stats.created,
                    updated = stats.updated,
                    deleted = stats.deleted,
                    reconnected = stats.reconnected,
                    relationships_added = stats.relationships_added,
                    relationships_removed = stats.relationships_removed,
                    "Collection saved"
                );
            }
            statistics.record(name, &stats);
        }

        statistics.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let totals = statistics.totals();
        info!(
            created = totals.created,
            updated = totals.updated,
            deleted = totals.deleted,
            reconnected = totals.reconnected,
            duration_ms = statistics.duration_ms,
            "Refresh completed"
        );
        Ok(statistics)
    }
}
