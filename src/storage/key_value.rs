//! KeyValueStore trait definition.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::Result;

/// A stored item, attribute name to JSON value.
pub type Item = serde_json::Map<String, serde_json::Value>;

/// Key attributes of the item a scan stopped at.
pub type StartKey = BTreeMap<String, String>;

/// A key-condition query against the single table or one of its indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyQuery {
    pub table_name: String,
    pub index_name: Option<String>,
    /// Conjunction of equality conditions, e.g. `datatype = :datatype`.
    pub key_condition: String,
    /// Placeholder (`:name`) to string value.
    pub values: BTreeMap<String, String>,
    pub exclusive_start_key: Option<StartKey>,
    pub limit: Option<u32>,
}

impl KeyQuery {
    pub fn new(table_name: impl Into<String>, key_condition: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            key_condition: key_condition.into(),
            ..Self::default()
        }
    }

    pub fn index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    pub fn value(mut self, placeholder: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(placeholder.into(), value.into());
        self
    }

    pub fn start_after(mut self, key: Option<StartKey>) -> Self {
        self.exclusive_start_key = key;
        self
    }

    pub fn limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }
}

/// One page of a key-value query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyPage {
    pub items: Vec<Item>,
    /// Present when the store stopped before exhausting the key range.
    pub last_evaluated_key: Option<StartKey>,
}

/// Interface for key-value listings.
///
/// Implementations:
/// - `DynamoKeyValueStore`: DynamoDB
/// - `MockKeyValueStore`: In-memory mock for testing
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Run one page of a key-condition query.
    async fn query(&self, query: &KeyQuery) -> Result<KeyPage>;
}
