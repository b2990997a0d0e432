//! Mock KeyValueStore implementation for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::storage::{Item, KeyPage, KeyQuery, KeyValueStore, Result, StartKey, StoreError};

/// Attributes that make up a last-evaluated key on the listing index.
const DEFAULT_KEY_ATTRIBUTES: [&str; 3] = ["partition_key", "sort_key", "datatype"];

/// Mock key-value store that keeps items in insertion order.
///
/// Understands key conditions of the form `a = :a AND b = :b`, exclusive
/// start keys and page limits. A last-evaluated key is returned only when
/// items remain after the page.
pub struct MockKeyValueStore {
    tables: RwLock<HashMap<String, Vec<Item>>>,
    key_attributes: Vec<String>,
    queries: RwLock<Vec<KeyQuery>>,
    fail_with: RwLock<Option<StoreError>>,
}

impl Default for MockKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockKeyValueStore {
    pub fn new() -> Self {
        Self::with_key_attributes(&DEFAULT_KEY_ATTRIBUTES)
    }

    pub fn with_key_attributes(attributes: &[&str]) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            key_attributes: attributes.iter().map(|a| a.to_string()).collect(),
            queries: RwLock::new(Vec::new()),
            fail_with: RwLock::new(None),
        }
    }

    pub async fn put(&self, table: &str, item: Item) {
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(item);
    }

    pub async fn set_fail_with(&self, error: Option<StoreError>) {
        *self.fail_with.write().await = error;
    }

    /// Every query received so far, in order.
    pub async fn queries(&self) -> Vec<KeyQuery> {
        self.queries.read().await.clone()
    }

    fn key_of(&self, item: &Item) -> StartKey {
        self.key_attributes
            .iter()
            .filter_map(|attribute| {
                item.get(attribute)
                    .and_then(Value::as_str)
                    .map(|value| (attribute.clone(), value.to_string()))
            })
            .collect()
    }
}

fn matches_condition(item: &Item, query: &KeyQuery) -> Result<bool> {
    for clause in query.key_condition.split(" AND ") {
        let (attribute, placeholder) = clause.split_once('=').ok_or_else(|| {
            StoreError::InvalidQuery(format!("unsupported key condition: {clause}"))
        })?;
        let placeholder = placeholder.trim();
        let expected = query.values.get(placeholder).ok_or_else(|| {
            StoreError::InvalidQuery(format!("no value supplied for {placeholder}"))
        })?;

        if item.get(attribute.trim()).and_then(Value::as_str) != Some(expected.as_str()) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_start_item(item: &Item, key: &StartKey) -> bool {
    key.iter()
        .all(|(attribute, value)| item.get(attribute).and_then(Value::as_str) == Some(value))
}

#[async_trait]
impl KeyValueStore for MockKeyValueStore {
    async fn query(&self, query: &KeyQuery) -> Result<KeyPage> {
        self.queries.write().await.push(query.clone());

        if let Some(error) = self.fail_with.read().await.clone() {
            return Err(error);
        }
        if query.limit == Some(0) {
            return Err(StoreError::InvalidQuery("limit must be at least 1".to_string()));
        }

        let tables = self.tables.read().await;
        let Some(items) = tables.get(&query.table_name) else {
            return Err(StoreError::TableNotInitialized(format!(
                "Table {} does not exist",
                query.table_name
            )));
        };

        let mut matching = Vec::new();
        for item in items {
            if matches_condition(item, query)? {
                matching.push(item);
            }
        }

        let start = match &query.exclusive_start_key {
            None => 0,
            Some(key) => matching
                .iter()
                .position(|item| is_start_item(item, key))
                .map(|i| i + 1)
                .unwrap_or(matching.len()),
        };
        let end = query
            .limit
            .map(|limit| (start + limit as usize).min(matching.len()))
            .unwrap_or(matching.len());

        let page: Vec<Item> = matching[start..end].iter().map(|item| (*item).clone()).collect();
        let last_evaluated_key = if end < matching.len() {
            page.last().map(|item| self.key_of(item))
        } else {
            None
        };

        Ok(KeyPage {
            items: page,
            last_evaluated_key,
        })
    }
}
