//! Amazon Timestream TimeSeriesStore implementation.
//!
//! Timestream query endpoints are discovered per account, so the client is
//! built with endpoint discovery enabled and a background reload task.

use async_trait::async_trait;
use aws_sdk_timestreamquery::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_timestreamquery::operation::query::QueryError;
use aws_sdk_timestreamquery::types::{ColumnInfo, Datum};
use aws_sdk_timestreamquery::Client;
use tracing::debug;

use crate::config::TimestreamConfig;
use crate::storage::{
    is_missing_resource, QueryPage, QueryRequest, Result, Row, StoreError, TimeSeriesStore,
};

/// Timestream-backed analytics store.
pub struct TimestreamStore {
    client: Client,
}

impl TimestreamStore {
    /// Create a store from configuration.
    ///
    /// Spawns the endpoint reload task on the current tokio runtime.
    pub async fn new(config: &TimestreamConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }

        let sdk_config = loader.load().await;
        let (client, reload) = Client::new(&sdk_config)
            .with_endpoint_discovery_enabled()
            .await
            .map_err(|e| {
                StoreError::Unavailable(format!("Timestream endpoint discovery failed: {e}"))
            })?;

        tokio::spawn(reload.reload_task());

        Ok(Self { client })
    }

    /// Create with explicit client (for testing).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TimeSeriesStore for TimestreamStore {
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage> {
        let output = self
            .client
            .query()
            .query_string(&request.query_string)
            .set_next_token(request.next_token.clone())
            .send()
            .await
            .map_err(map_query_error)?;

        let columns = output.column_info();
        let rows: Vec<Row> = output
            .rows()
            .iter()
            .map(|row| to_row(columns, row.data()))
            .collect();

        let next_token = output.next_token().map(str::to_string);

        debug!(
            rows = rows.len(),
            more = next_token.is_some(),
            query_id = output.query_id(),
            "Timestream query page"
        );

        Ok(QueryPage { rows, next_token })
    }
}

/// Pair each datum with its column name. Non-scalar cells read as null.
fn to_row(columns: &[ColumnInfo], data: &[Datum]) -> Row {
    columns
        .iter()
        .zip(data)
        .map(|(column, datum)| {
            let value = if datum.null_value() == Some(true) {
                None
            } else {
                datum.scalar_value().map(str::to_string)
            };
            (column.name().unwrap_or_default().to_string(), value)
        })
        .collect()
}

fn map_query_error(err: SdkError<QueryError>) -> StoreError {
    match err {
        SdkError::ServiceError(service) => {
            let err = service.into_err();
            let message = err
                .message()
                .unwrap_or("unknown Timestream error")
                .to_string();

            if is_missing_resource(&message) {
                return StoreError::TableNotInitialized(message);
            }

            match err {
                QueryError::AccessDeniedException(_) => StoreError::AccessDenied(message),
                QueryError::ValidationException(_) => StoreError::InvalidQuery(message),
                QueryError::ThrottlingException(_)
                | QueryError::InternalServerException(_)
                | QueryError::InvalidEndpointException(_) => StoreError::Unavailable(message),
                _ => StoreError::from_service_message(message),
            }
        }
        other => StoreError::Unavailable(DisplayErrorContext(&other).to_string()),
    }
}
