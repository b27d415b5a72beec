//! Refresh error types.

use invsync_core::{RecordRef, RelationshipKind, StoreError};
use thiserror::Error;

use crate::value::NaturalKey;

/// Errors that abort a refresh pass.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Invalid collection declarations or snapshot data. Raised before any
    /// write is issued.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A store query or save failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// A child resolves to two parents, or more than one root candidate exists.
    #[error("Ambiguous {kind} relationship: {message}")]
    RelationshipAmbiguity {
        kind: RelationshipKind,
        message: String,
    },

    /// The desired edges of one kind do not form a forest.
    #[error("Cycle in {kind} relationship through {child}")]
    RelationshipCycle {
        kind: RelationshipKind,
        child: RecordRef,
    },

    /// A reference points at an object that has not been saved yet.
    #[error("Unresolved reference to {collection} {key}: object has no persisted id")]
    UnresolvedReference { collection: String, key: NaturalKey },
}

impl RefreshError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an ambiguity error.
    pub fn ambiguity(kind: &RelationshipKind, message: impl Into<String>) -> Self {
        Self::RelationshipAmbiguity {
            kind: kind.clone(),
            message: message.into(),
        }
    }

    /// Check if the pass was rejected before touching the store.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Check if the store reported the failure.
    #[must_use]
    pub fn is_persistence_error(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    /// Check if the relationship data was inconsistent.
    #[must_use]
    pub fn is_relationship_error(&self) -> bool {
        matches!(
            self,
            Self::RelationshipAmbiguity { .. } | Self::RelationshipCycle { .. }
        )
    }
}

/// Result type for refresh operations.
pub type RefreshResult<T> = std::result::Result<T, RefreshError>;
