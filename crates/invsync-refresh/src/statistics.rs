//! Refresh statistics.
//!
//! Counts what a pass changed, per collection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Changes applied for one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStatistics {
    /// Records inserted.
    #[serde(default)]
    pub created: u64,
    /// Existing records saved with new attributes.
    #[serde(default)]
    pub updated: u64,
    /// Unseen records removed.
    #[serde(default)]
    pub deleted: u64,
    /// Orphans re-attached to the managed system.
    #[serde(default)]
    pub reconnected: u64,
    /// Children attached to a parent.
    #[serde(default)]
    pub relationships_added: u64,
    /// Children detached from a parent.
    #[serde(default)]
    pub relationships_removed: u64,
}

impl CollectionStatistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records and edges written. Reconnections are counted through `updated`.
    #[must_use]
    pub fn total_changes(&self) -> u64 {
        self.created
            + self.updated
            + self.deleted
            + self.relationships_added
            + self.relationships_removed
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.total_changes() > 0
    }

    pub fn merge(&mut self, other: &CollectionStatistics) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.reconnected += other.reconnected;
        self.relationships_added += other.relationships_added;
        self.relationships_removed += other.relationships_removed;
    }
}

/// Statistics for a whole pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStatistics {
    /// Per collection, in collection name order.
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionStatistics>,
    /// Wall time of the pass in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
}

impl RefreshStatistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the counts of one collection.
    pub fn record(&mut self, collection: impl Into<String>, stats: &CollectionStatistics) {
        self.collections
            .entry(collection.into())
            .or_default()
            .merge(stats);
    }

    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&CollectionStatistics> {
        self.collections.get(name)
    }

    /// Sum over every collection.
    #[must_use]
    pub fn totals(&self) -> CollectionStatistics {
        let mut totals = CollectionStatistics::new();
        for stats in self.collections.values() {
            totals.merge(stats);
        }
        totals
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.collections.values().any(CollectionStatistics::has_changes)
    }
}
