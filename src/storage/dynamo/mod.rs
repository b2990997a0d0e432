//! DynamoDB KeyValueStore implementation.
//!
//! Items come back as attribute maps; they are converted to JSON objects so
//! handlers can deserialize them with serde. Last-evaluated keys are reduced
//! to their string and number attributes, which is all the single-table
//! key schema uses.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::config::DynamoConfig;
use crate::storage::{Item, KeyPage, KeyQuery, KeyValueStore, Result, StartKey, StoreError};

/// DynamoDB-backed key-value store.
pub struct DynamoKeyValueStore {
    client: Client,
}

impl DynamoKeyValueStore {
    /// Create a store from configuration.
    ///
    /// Uses default credentials from the environment (Lambda execution
    /// role, or AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY).
    pub async fn new(config: &DynamoConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);

        // DynamoDB Local / LocalStack
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    /// Create with explicit client (for testing).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeyValueStore for DynamoKeyValueStore {
    async fn query(&self, query: &KeyQuery) -> Result<KeyPage> {
        let values: HashMap<String, AttributeValue> = query
            .values
            .iter()
            .map(|(name, value)| (name.clone(), AttributeValue::S(value.clone())))
            .collect();

        let output = self
            .client
            .query()
            .table_name(&query.table_name)
            .set_index_name(query.index_name.clone())
            .key_condition_expression(&query.key_condition)
            .set_expression_attribute_values(Some(values))
            .set_exclusive_start_key(
                query
                    .exclusive_start_key
                    .as_ref()
                    .map(start_key_to_attributes),
            )
            .set_limit(query.limit.and_then(|limit| i32::try_from(limit).ok()))
            .send()
            .await
            .map_err(map_query_error)?;

        let items = output
            .items()
            .iter()
            .map(attributes_to_item)
            .collect::<Result<Vec<Item>>>()?;

        let last_evaluated_key = output.last_evaluated_key().map(attributes_to_start_key);

        debug!(
            table = %query.table_name,
            index = ?query.index_name,
            items = items.len(),
            more = last_evaluated_key.is_some(),
            "DynamoDB query page"
        );

        Ok(KeyPage {
            items,
            last_evaluated_key,
        })
    }
}

fn map_query_error(err: SdkError<QueryError>) -> StoreError {
    match err {
        SdkError::ServiceError(service) => {
            let err = service.into_err();
            let message = err
                .message()
                .unwrap_or("unknown DynamoDB error")
                .to_string();
            match err {
                QueryError::ResourceNotFoundException(_) => {
                    StoreError::TableNotInitialized(message)
                }
                QueryError::ProvisionedThroughputExceededException(_)
                | QueryError::RequestLimitExceeded(_)
                | QueryError::InternalServerError(_) => StoreError::Unavailable(message),
                _ if err.code() == Some("ValidationException") => {
                    StoreError::InvalidQuery(message)
                }
                _ if err.code() == Some("AccessDeniedException") => {
                    StoreError::AccessDenied(message)
                }
                _ => StoreError::from_service_message(message),
            }
        }
        other => StoreError::Unavailable(DisplayErrorContext(&other).to_string()),
    }
}

fn start_key_to_attributes(key: &StartKey) -> HashMap<String, AttributeValue> {
    key.iter()
        .map(|(name, value)| (name.clone(), AttributeValue::S(value.clone())))
        .collect()
}

fn attributes_to_start_key(attributes: &HashMap<String, AttributeValue>) -> StartKey {
    attributes
        .iter()
        .filter_map(|(name, value)| match value {
            AttributeValue::S(s) | AttributeValue::N(s) => Some((name.clone(), s.clone())),
            _ => None,
        })
        .collect()
}

fn attributes_to_item(attributes: &HashMap<String, AttributeValue>) -> Result<Item> {
    attributes
        .iter()
        .map(|(name, value)| Ok((name.clone(), attribute_to_json(value)?)))
        .collect()
}

fn number_to_json(n: &str) -> Result<Value> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(Value::from(i));
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| StoreError::MalformedItem(format!("invalid number attribute: {n}")))
}

fn attribute_to_json(value: &AttributeValue) -> Result<Value> {
    Ok(match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => number_to_json(n)?,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::B(blob) => Value::String(STANDARD.encode(blob.as_ref())),
        AttributeValue::Ss(values) => {
            Value::Array(values.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(values) => Value::Array(
            values
                .iter()
                .map(|n| number_to_json(n))
                .collect::<Result<Vec<Value>>>()?,
        ),
        AttributeValue::Bs(blobs) => Value::Array(
            blobs
                .iter()
                .map(|blob| Value::String(STANDARD.encode(blob.as_ref())))
                .collect(),
        ),
        AttributeValue::L(values) => Value::Array(
            values
                .iter()
                .map(attribute_to_json)
                .collect::<Result<Vec<Value>>>()?,
        ),
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), attribute_to_json(v)?)))
                .collect::<Result<Map<String, Value>>>()?,
        ),
        other => {
            return Err(StoreError::MalformedItem(format!(
                "unsupported attribute type: {other:?}"
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_conversion() {
        let mut nested = HashMap::new();
        nested.insert("city".to_string(), AttributeValue::S("Leeds".to_string()));

        let mut attributes = HashMap::new();
        attributes.insert("sort_key".to_string(), AttributeValue::S("p#1".to_string()));
        attributes.insert("count".to_string(), AttributeValue::N("42".to_string()));
        attributes.insert("ratio".to_string(), AttributeValue::N("0.5".to_string()));
        attributes.insert("active".to_string(), AttributeValue::Bool(true));
        attributes.insert("location".to_string(), AttributeValue::M(nested));

        let item = attributes_to_item(&attributes).unwrap();

        assert_eq!(item["sort_key"], "p#1");
        assert_eq!(item["count"], 42);
        assert_eq!(item["ratio"], 0.5);
        assert_eq!(item["active"], true);
        assert_eq!(item["location"]["city"], "Leeds");
    }

    #[test]
    fn test_start_key_keeps_string_and_number_attributes() {
        let mut attributes = HashMap::new();
        attributes.insert("partition_key".to_string(), AttributeValue::S("brand#1".to_string()));
        attributes.insert("version".to_string(), AttributeValue::N("3".to_string()));
        attributes.insert("flag".to_string(), AttributeValue::Bool(false));

        let key = attributes_to_start_key(&attributes);

        assert_eq!(key.len(), 2);
        assert_eq!(key["partition_key"], "brand#1");
        assert_eq!(key["version"], "3");
    }

    #[test]
    fn test_invalid_number_is_malformed() {
        let err = attribute_to_json(&AttributeValue::N("abc".to_string())).unwrap_err();
        assert!(matches!(err, StoreError::MalformedItem(_)));
    }
}
