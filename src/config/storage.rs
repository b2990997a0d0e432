//! Storage configuration types.

use serde::Deserialize;

/// Storage configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Single-table key-value store used by listings.
    pub dynamo: DynamoConfig,
    /// Analytics store holding scan events.
    pub timestream: TimestreamConfig,
}

/// DynamoDB-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DynamoConfig {
    /// Table name.
    pub table_name: String,
    /// Global secondary index keyed by `datatype` then `partition_key`.
    pub listing_index: String,
    /// Maximum items per listing page. `None` lets DynamoDB cap by size.
    pub page_limit: Option<u32>,
    /// Endpoint override (DynamoDB Local, LocalStack).
    pub endpoint: Option<String>,
    /// Region override.
    pub region: Option<String>,
}

impl Default for DynamoConfig {
    fn default() -> Self {
        Self {
            table_name: "polytag".to_string(),
            listing_index: "datatype-pk-index".to_string(),
            page_limit: None,
            endpoint: None,
            region: None,
        }
    }
}

/// Timestream-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimestreamConfig {
    /// Database name.
    pub database: String,
    /// Table name within the database.
    pub table: String,
    /// Region override.
    pub region: Option<String>,
}

impl Default for TimestreamConfig {
    fn default() -> Self {
        Self {
            database: "polytag".to_string(),
            table: "polytag".to_string(),
            region: None,
        }
    }
}
