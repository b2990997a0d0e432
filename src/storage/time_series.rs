//! TimeSeriesStore trait definition.

use async_trait::async_trait;

use super::Result;

/// One call against the analytics store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub query_string: String,
    /// Continuation token from the previous page, if any.
    pub next_token: Option<String>,
}

impl QueryRequest {
    pub fn new(query_string: impl Into<String>) -> Self {
        Self {
            query_string: query_string.into(),
            next_token: None,
        }
    }
}

/// A result row as named scalar columns.
///
/// Null cells are `None`. Column order follows the query's select list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<(String, Option<String>)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column.
    pub fn with(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.columns.push((name.into(), value.map(str::to_string)));
        self
    }

    /// Scalar value of a named column; `None` if absent or null.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, Option<String>)> for Row {
    fn from_iter<I: IntoIterator<Item = (N, Option<String>)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}

/// One page of analytics rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPage {
    pub rows: Vec<Row>,
    /// Present when more pages remain.
    pub next_token: Option<String>,
}

/// Interface for the analytics store.
///
/// Implementations:
/// - `TimestreamStore`: Amazon Timestream
/// - `MockTimeSeriesStore`: In-memory mock for testing
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Run one page of a query.
    ///
    /// A missing database or table must be reported as
    /// [`StoreError::TableNotInitialized`](super::StoreError::TableNotInitialized).
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage>;
}
