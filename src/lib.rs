//! Polytag - scan analytics and listing core
//!
//! Paginated queries and time-bucket aggregation for the Polytag QR scan
//! platform: opaque listing cursors over the single table, exhaustive
//! pagination over the analytics store, and hour-bucket merging of scan
//! time series.

pub mod analytics;
pub mod config;
pub mod handlers;
pub mod pagination;
pub mod storage;
pub mod utils;
