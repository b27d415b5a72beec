//! Strongly Typed Identifiers
//!
//! Newtype identifiers for invsync. Persisted records and refresh runs are
//! both keyed by UUIDs, and keeping them apart at the type level prevents a
//! run id from being written into a foreign key column.
//!
//! # Example
//!
//! ```
//! use invsync_core::{RecordId, RunId};
//!
//! let record = RecordId::new();
//! let run = RunId::new();
//!
//! fn requires_record(id: RecordId) -> String {
//!     id.to_string()
//! }
//!
//! let result = requires_record(record);
//! // requires_record(run); // This would not compile!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error type for ID parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse
    pub id_type: &'static str,
    /// The underlying UUID parse error message
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to define a strongly-typed ID type
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID using UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns a reference to the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        message: e.to_string(),
                    })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// Primary identifier of a persisted inventory record.
    ///
    /// Assigned once when a record is created and never reused. Orphan
    /// reconnection hands an existing `RecordId` back to a freshly observed
    /// inventory object instead of minting a new one.
    ///
    /// # Example
    ///
    /// ```
    /// use invsync_core::RecordId;
    /// use uuid::Uuid;
    ///
    /// let uuid = Uuid::new_v4();
    /// let id = RecordId::from_uuid(uuid);
    /// assert_eq!(id.as_uuid(), &uuid);
    ///
    /// let parsed: RecordId = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
    /// ```
    RecordId
);

define_id!(
    /// Identifier of one reconciliation pass, used to correlate log lines.
    RunId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_distinct_ids() {
        assert_ne!(RecordId::new(), RecordId::new());
    }

    #[test]
    fn test_display_returns_uuid_string() {
        let uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let id = RecordId::from_uuid(uuid);
        assert_eq!(id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let json = serde_json::to_string(&RecordId::from_uuid(uuid)).unwrap();
        assert_eq!(json, "\"550e8400-e29b-41d4-a716-446655440000\"");
    }

    #[test]
    fn test_parse_invalid_uuid_returns_error() {
        let err = "not-a-uuid".parse::<RunId>().unwrap_err();
        assert_eq!(err.id_type, "RunId");
        assert!(err.to_string().contains("Failed to parse RunId"));
    }

    #[test]
    fn test_ordering_follows_uuid() {
        let low = RecordId::from_uuid(Uuid::from_u128(1));
        let high = RecordId::from_uuid(Uuid::from_u128(2));
        assert!(low < high);
    }
}
