//! Error Types
//!
//! Errors raised by persistence collaborators. Every backend (in-memory,
//! PostgreSQL) maps its native failures onto [`StoreError`] so the refresh
//! engine can treat them uniformly as fatal to the current batch.

use thiserror::Error;

use crate::ids::RecordId;

/// Persistence collaborator failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A lookup or filtered query failed to execute.
    #[error("Query failed: {message}")]
    Query {
        /// Backend supplied description
        message: String,
    },

    /// Writing a record failed.
    #[error("Save failed for {model} {id}: {message}")]
    Save {
        /// Base model of the record
        model: String,
        /// Record being written
        id: RecordId,
        /// Backend supplied description
        message: String,
    },

    /// A record expected to exist is missing.
    #[error("{model} not found: {id}")]
    NotFound {
        /// Base model of the record
        model: String,
        /// Missing record
        id: RecordId,
    },

    /// Opening, committing or rolling back a transaction failed.
    #[error("Transaction failed: {message}")]
    Transaction {
        /// Backend supplied description
        message: String,
    },

    /// Attribute payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a save error.
    pub fn save(model: impl Into<String>, id: RecordId, message: impl Into<String>) -> Self {
        Self::Save {
            model: model.into(),
            id,
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(model: impl Into<String>, id: RecordId) -> Self {
        Self::NotFound {
            model: model.into(),
            id,
        }
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Check if this error came from a write.
    #[must_use]
    pub fn is_save_error(&self) -> bool {
        matches!(self, Self::Save { .. })
    }

    /// Check if this error came from a read.
    #[must_use]
    pub fn is_query_error(&self) -> bool {
        matches!(self, Self::Query { .. } | Self::NotFound { .. })
    }
}

/// Result type for persistence collaborator calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
