//! Product and product group listings over the single table.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{HandlerError, Result};
use crate::config::DynamoConfig;
use crate::pagination::{decode_last_key, encode_last_key, Cursor, KeyField};
use crate::storage::{KeyQuery, KeyValueStore, StartKey};

const PRODUCT_DATATYPE: &str = "brand-product";
const PRODUCT_GROUP_DATATYPE: &str = "brand-product-group";

/// A product registered by a brand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub partition_key: String,
    pub sort_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gtin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    /// Every other stored attribute.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductGroup {
    pub partition_key: String,
    pub sort_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct ListOutput<T> {
    pub items: Vec<T>,
    /// Present only when more pages remain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_evaluated_key: Option<Cursor>,
}

/// Paginated listings backed by the `datatype` index.
pub struct ProductCatalog {
    store: Arc<dyn KeyValueStore>,
    config: DynamoConfig,
}

impl ProductCatalog {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &DynamoConfig) -> Self {
        Self {
            store,
            config: config.clone(),
        }
    }

    /// List products, optionally for one brand.
    pub async fn list_products(
        &self,
        brand_id: Option<&str>,
        last_key: Option<&str>,
    ) -> Result<ListOutput<Product>> {
        self.list(PRODUCT_DATATYPE, brand_id, last_key).await
    }

    /// List product groups, optionally for one brand.
    pub async fn list_product_groups(
        &self,
        brand_id: Option<&str>,
        last_key: Option<&str>,
    ) -> Result<ListOutput<ProductGroup>> {
        self.list(PRODUCT_GROUP_DATATYPE, brand_id, last_key).await
    }

    async fn list<T: DeserializeOwned>(
        &self,
        datatype: &str,
        brand_id: Option<&str>,
        last_key: Option<&str>,
    ) -> Result<ListOutput<T>> {
        let brand_partition = brand_id.map(|id| format!("brand#{id}"));
        let start_key = match decode_last_key(last_key)? {
            None => None,
            Some(key) => {
                let partition_key = brand_partition
                    .as_deref()
                    .or(key.partition_key())
                    .ok_or_else(|| missing_key_field(KeyField::PartitionKey))?;
                let sort_key = key
                    .sort_key()
                    .ok_or_else(|| missing_key_field(KeyField::SortKey))?;

                Some(StartKey::from([
                    (KeyField::Datatype.to_string(), datatype.to_string()),
                    (KeyField::PartitionKey.to_string(), partition_key.to_string()),
                    (KeyField::SortKey.to_string(), sort_key.to_string()),
                ]))
            }
        };

        let mut query = match &brand_partition {
            Some(partition) => KeyQuery::new(
                &self.config.table_name,
                "datatype = :datatype AND partition_key = :partition_key",
            )
            .value(":partition_key", partition),
            None => KeyQuery::new(&self.config.table_name, "datatype = :datatype"),
        };
        query = query
            .index(&self.config.listing_index)
            .value(":datatype", datatype)
            .start_after(start_key)
            .limit(self.config.page_limit);

        let page = self.store.query(&query).await?;

        let items = page
            .items
            .into_iter()
            .map(|item| serde_json::from_value(Value::Object(item)))
            .collect::<std::result::Result<Vec<T>, _>>()?;

        let mut preserve = vec![KeyField::SortKey];
        if brand_id.is_none() {
            preserve.push(KeyField::PartitionKey);
        }
        let last_evaluated_key = encode_last_key(page.last_evaluated_key.as_ref(), &preserve)?;

        debug!(
            datatype,
            brand_id = brand_id.unwrap_or("*"),
            items = items.len(),
            more = last_evaluated_key.is_some(),
            "Listed items"
        );

        Ok(ListOutput {
            items,
            last_evaluated_key,
        })
    }
}

fn missing_key_field(field: KeyField) -> HandlerError {
    HandlerError::InvalidInput(format!("last key has no {field}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::storage::mock::MockKeyValueStore;
    use crate::storage::{Item, StoreError};

    fn item(value: Value) -> Item {
        value.as_object().cloned().unwrap()
    }

    async fn catalog(page_limit: Option<u32>) -> (Arc<MockKeyValueStore>, ProductCatalog) {
        let store = Arc::new(MockKeyValueStore::new());
        for (brand, sku) in [("a", "1"), ("a", "2"), ("b", "3"), ("a", "4"), ("b", "5")] {
            store
                .put(
                    "polytag",
                    item(json!({
                        "partition_key": format!("brand#{brand}"),
                        "sort_key": format!("brand-product#{sku}"),
                        "datatype": PRODUCT_DATATYPE,
                        "gtin": format!("000{sku}"),
                        "color": "green",
                    })),
                )
                .await;
        }
        store
            .put(
                "polytag",
                item(json!({
                    "partition_key": "brand#a",
                    "sort_key": "brand-product-group#g1",
                    "datatype": PRODUCT_GROUP_DATATYPE,
                    "group_name": "Bottles",
                })),
            )
            .await;

        let config = DynamoConfig {
            page_limit,
            ..DynamoConfig::default()
        };
        let catalog = ProductCatalog::new(store.clone(), &config);
        (store, catalog)
    }

    #[tokio::test]
    async fn test_list_products_single_page() {
        let (store, catalog) = catalog(None).await;

        let output = catalog.list_products(Some("a"), None).await.unwrap();

        assert_eq!(output.items.len(), 3);
        assert!(output.last_evaluated_key.is_none());
        assert_eq!(output.items[0].gtin.as_deref(), Some("0001"));
        assert_eq!(output.items[0].attributes["color"], "green");

        let queries = store.queries().await;
        assert_eq!(queries[0].index_name.as_deref(), Some("datatype-pk-index"));
        assert_eq!(queries[0].values[":partition_key"], "brand#a");
    }

    #[tokio::test]
    async fn test_scoped_listing_walks_all_pages() {
        let (_, catalog) = catalog(Some(2)).await;

        let first = catalog.list_products(Some("a"), None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        let cursor = first.last_evaluated_key.unwrap();

        let decoded = decode_last_key(Some(cursor.as_str())).unwrap().unwrap();
        assert_eq!(decoded.fields(), vec![KeyField::SortKey]);

        let second = catalog
            .list_products(Some("a"), Some(cursor.as_str()))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].sort_key, "brand-product#4");
        assert!(second.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn test_unscoped_listing_keeps_partition_in_cursor() {
        let (store, catalog) = catalog(Some(3)).await;

        let first = catalog.list_products(None, None).await.unwrap();
        let cursor = first.last_evaluated_key.unwrap();
        let decoded = decode_last_key(Some(cursor.as_str())).unwrap().unwrap();
        assert_eq!(decoded.partition_key(), Some("brand#b"));
        assert_eq!(decoded.sort_key(), Some("brand-product#3"));

        let second = catalog.list_products(None, Some(cursor.as_str())).await.unwrap();
        let skus: Vec<&str> = second.items.iter().map(|p| p.sort_key.as_str()).collect();
        assert_eq!(skus, vec!["brand-product#4", "brand-product#5"]);

        let start = store.queries().await[1].exclusive_start_key.clone().unwrap();
        assert_eq!(start["datatype"], PRODUCT_DATATYPE);
        assert_eq!(start["partition_key"], "brand#b");
    }

    #[tokio::test]
    async fn test_list_product_groups() {
        let (_, catalog) = catalog(None).await;

        let output = catalog.list_product_groups(Some("a"), None).await.unwrap();

        assert_eq!(output.items.len(), 1);
        assert_eq!(output.items[0].group_name.as_deref(), Some("Bottles"));
    }

    #[tokio::test]
    async fn test_unscoped_cursor_without_partition_is_rejected() {
        let (store, catalog) = catalog(Some(2)).await;
        let scoped = catalog.list_products(Some("a"), None).await.unwrap();
        let cursor = scoped.last_evaluated_key.unwrap();

        let err = catalog
            .list_products(None, Some(cursor.as_str()))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::InvalidInput(_)));
        assert!(err.is_client_error());
        assert_eq!(store.queries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_cursor_is_client_error() {
        let (store, catalog) = catalog(None).await;

        let err = catalog
            .list_products(Some("a"), Some("%%%not-a-cursor"))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Cursor(_)));
        assert!(err.is_client_error());
        assert!(store.queries().await.is_empty());
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let (store, catalog) = catalog(None).await;
        store
            .set_fail_with(Some(StoreError::Unavailable("throttled".to_string())))
            .await;

        let err = catalog.list_products(Some("a"), None).await.unwrap_err();

        assert!(matches!(err, HandlerError::Store(StoreError::Unavailable(_))));
        assert!(!err.is_client_error());
    }
}
