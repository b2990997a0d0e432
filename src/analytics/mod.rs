//! Scan analytics over the time-series store.
//!
//! ```text
//! AnalyticsQuery --to_sql--> fetch_all (pages until no token) --> rows
//!                                                           |
//!                                  TimeSeries (group by ts) <
//!                                          |
//!                                   merge_and_sum --> hour buckets, sorted
//! ```

mod aggregate;
mod bucket;
mod fetch;
mod query;

pub use aggregate::{
    merge_and_sum, merge_and_sum_at, parse_timestamp, round_to_hour, sum_into, BucketedSeries,
    Summable, TimeSeries,
};
pub use bucket::{TimeBucket, BUCKET_KEY_FORMAT};
pub use fetch::{fetch_all, fetch_all_sql, parse_column, require_column, FromRow};
pub use query::{
    coalesce, col, count_all, AnalyticsQuery, DateRange, TableRef, LANDING_PAGE_SCAN,
};

use thiserror::Error;

use crate::storage::StoreError;

/// Errors from analytics queries and aggregation.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Store failure other than a missing table, passed through unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid row: column '{column}': {reason}")]
    Row { column: String, reason: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),
}

/// Result type for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
