//! Orphan reconnection.
//!
//! A record whose owning system link is cleared (for example a host that
//! was removed from one managed system and is now visible through another)
//! is re-attached to the matching incoming object instead of being created
//! again under a new id.

use async_trait::async_trait;
use invsync_core::RecordQuery;
use serde_json::Value as JsonValue;
use tracing::{debug, instrument, warn};

use crate::collection::InventoryCollection;
use crate::error::{RefreshError, RefreshResult};
use crate::index::PendingIndex;
use crate::statistics::CollectionStatistics;
use crate::strategy::{ReconnectStrategy, RefreshContext};

/// Matches orphaned records on a secondary key column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrphanReconnector {
    secondary_key: Option<String>,
}

impl OrphanReconnector {
    /// Match on the collection's secondary key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Match on `column` regardless of the collection's declaration.
    pub fn on(column: impl Into<String>) -> Self {
        Self {
            secondary_key: Some(column.into()),
        }
    }

    fn column(&self, collection: &InventoryCollection) -> RefreshResult<String> {
        self.secondary_key
            .clone()
            .or_else(|| collection.secondary_key())
            .ok_or_else(|| {
                RefreshError::configuration(format!(
                    "collection '{}' has no secondary key for orphan reconnection",
                    collection.name()
                ))
            })
    }
}

#[async_trait]
impl ReconnectStrategy for OrphanReconnector {
    fn validate(&self, collection: &InventoryCollection) -> RefreshResult<()> {
        if collection.model_class().is_none() {
            return Err(RefreshError::configuration(format!(
                "collection '{}' reconnects orphans but has no model class",
                collection.name()
            )));
        }
        self.column(collection).map(|_| ())
    }

    #[instrument(skip_all, fields(collection = %collection.name(), pending = pending.len()))]
    async fn reconnect(
        &self,
        ctx: &RefreshContext<'_>,
        collection: &mut InventoryCollection,
        pending: &mut PendingIndex,
        stats: &mut CollectionStatistics,
    ) -> RefreshResult<()> {
        ctx.config.validate()?;
        self.validate(collection)?;
        let model = match collection.model_class() {
            Some(model) => model.base_class().to_string(),
            None => return Ok(()),
        };
        let orphans_in_scope =
            RecordQuery::unowned().with_record_type(collection.record_type_filter());

        let candidates = ctx.store.count_where(&model, &orphans_in_scope).await?;
        if candidates == 0 {
            debug!(model = %model, "No orphan candidates in scope");
            return Ok(());
        }

        let column = self.column(collection)?;
        let columns = collection.manager_ref_to_cols();
        let check_changed = collection.check_changed(ctx.config);
        let keys = pending.sorted_keys();

        for batch in keys.chunks(ctx.config.orphan_batch_size) {
            let values: Vec<JsonValue> = batch
                .iter()
                .filter_map(|key| pending.attributes(key)?.get(&column).cloned())
                .filter(|value| !value.is_null())
                .collect();
            if values.is_empty() {
                continue;
            }

            let query = orphans_in_scope.clone().with_attribute_in(&column, values);
            let orphans = ctx.store.find_where(&model, &query).await?;
            debug!(
                model = %model,
                batch = batch.len(),
                matched = orphans.len(),
                "Orphan candidate batch"
            );

            for mut record in orphans {
                let key = InventoryCollection::record_key(&record, &columns);
                // Removing the entry keeps the default saver from creating it.
                let Some((slot, attributes)) = pending.remove(&key) else {
                    continue;
                };

                let mut changed = record.assign_attributes(&attributes);
                changed |= record.assign_owner(Some(ctx.owner.id));
                if !check_changed || changed {
                    if let Err(err) = ctx.store.save(&record).await {
                        if let Err(duplicate) = pending.insert(key, slot, attributes) {
                            warn!(
                                key = %duplicate.key,
                                "Pending entry could not be restored after failed save"
                            );
                        }
                        return Err(err.into());
                    }
                    stats.updated += 1;
                }
                stats.reconnected += 1;
                collection.assign_id(slot, record.id);

                debug!(
                    model = %model,
                    record_id = %record.id,
                    key = %key,
                    "Reconnected orphan"
                );
            }
        }

        Ok(())
    }
}
