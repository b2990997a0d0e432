//! Exhaustive pagination over the analytics store.

use std::fmt::Display;
use std::str::FromStr;

use tracing::{debug, info};

use super::{AnalyticsError, AnalyticsQuery, Result};
use crate::storage::{QueryRequest, Row, StoreError, TimeSeriesStore};

/// Conversion from a raw analytics row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(row.clone())
    }
}

/// Scalar value of a column that must be present and non-null.
pub fn require_column<'a>(row: &'a Row, column: &str) -> Result<&'a str> {
    row.get(column).ok_or_else(|| AnalyticsError::Row {
        column: column.to_string(),
        reason: "missing or null".to_string(),
    })
}

/// Parse a required column.
pub fn parse_column<T>(row: &Row, column: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    require_column(row, column)?
        .parse()
        .map_err(|e: T::Err| AnalyticsError::Row {
            column: column.to_string(),
            reason: e.to_string(),
        })
}

/// Run `query` to completion and convert every row.
pub async fn fetch_all<T: FromRow>(
    store: &dyn TimeSeriesStore,
    query: &AnalyticsQuery,
) -> Result<Vec<T>> {
    fetch_all_sql(store, query.to_sql()).await
}

/// Run a SQL query to completion, following continuation tokens.
///
/// Rows are accumulated in the order the store returns them; no sorting is
/// applied across pages. A missing table yields an empty result. Any other
/// store error is returned unchanged and not retried.
pub async fn fetch_all_sql<T: FromRow>(
    store: &dyn TimeSeriesStore,
    query_string: impl Into<String>,
) -> Result<Vec<T>> {
    let mut request = QueryRequest::new(query_string);
    let mut rows = Vec::new();
    let mut pages = 0usize;

    loop {
        let page = match store.query(&request).await {
            Ok(page) => page,
            Err(StoreError::TableNotInitialized(message)) => {
                info!(%message, "Analytics table not initialized, returning no rows");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        pages += 1;

        debug!(
            page = pages,
            rows = page.rows.len(),
            more = page.next_token.is_some(),
            "Fetched analytics page"
        );

        for row in &page.rows {
            rows.push(T::from_row(row)?);
        }

        match page.next_token.filter(|token| !token.is_empty()) {
            Some(token) => request.next_token = Some(token),
            None => break,
        }
    }

    Ok(rows)
}
