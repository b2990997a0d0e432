//! Store abstractions for listings and analytics.
//!
//! Handlers never talk to an SDK directly; they go through one of two
//! traits so the paginated-query layer can be exercised without AWS:
//!
//! - [`KeyValueStore`]: single-table key-value listings (DynamoDB)
//! - [`TimeSeriesStore`]: SQL over the scan analytics stream (Timestream)
//!
//! ## Backends
//!
//! - `MockKeyValueStore`, `MockTimeSeriesStore` - in-memory, scripted pages
//! - `DynamoKeyValueStore` (feature: dynamo)
//! - `TimestreamStore` (feature: timestream)

mod key_value;
pub mod mock;
mod time_series;

#[cfg(feature = "dynamo")]
pub mod dynamo;
#[cfg(feature = "timestream")]
pub mod timestream;

pub use key_value::{Item, KeyPage, KeyQuery, KeyValueStore, StartKey};
pub use time_series::{QueryPage, QueryRequest, Row, TimeSeriesStore};

#[cfg(feature = "dynamo")]
pub use dynamo::DynamoKeyValueStore;
#[cfg(feature = "timestream")]
pub use timestream::TimestreamStore;

use thiserror::Error;

/// Suffix the managed stores use when a database or table is missing.
const MISSING_RESOURCE_MARKER: &str = "does not exist";

/// Errors surfaced by store backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The target table or stream has not been created yet.
    #[error("Table not initialized: {0}")]
    TableNotInitialized(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Malformed item: {0}")]
    MalformedItem(String),
}

impl StoreError {
    /// Classify a raw service error message.
    ///
    /// Only the missing-resource case is recognised from text; everything
    /// else is reported as the store being unavailable.
    pub fn from_service_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_missing_resource(&message) {
            StoreError::TableNotInitialized(message)
        } else {
            StoreError::Unavailable(message)
        }
    }

    pub fn is_table_not_initialized(&self) -> bool {
        matches!(self, StoreError::TableNotInitialized(_))
    }
}

/// True when a service message reports a missing database or table.
pub(crate) fn is_missing_resource(message: &str) -> bool {
    message
        .trim_end()
        .trim_end_matches('.')
        .ends_with(MISSING_RESOURCE_MARKER)
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_table_message_is_recognised() {
        let err =
            StoreError::from_service_message("line 3:10: Table polytag.polytag does not exist");
        assert!(err.is_table_not_initialized());

        let err = StoreError::from_service_message("The database polytag does not exist.");
        assert!(err.is_table_not_initialized());
    }

    #[test]
    fn test_other_messages_are_unavailable() {
        let err = StoreError::from_service_message("Rate exceeded");
        assert_eq!(err, StoreError::Unavailable("Rate exceeded".to_string()));
        assert!(!err.is_table_not_initialized());
    }

    #[test]
    fn test_marker_must_end_message() {
        let err = StoreError::from_service_message("column does not exist in projection list x");
        assert!(!err.is_table_not_initialized());
    }
}
