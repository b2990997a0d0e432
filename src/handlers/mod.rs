//! Request handlers for listings and scan analytics.
//!
//! Handlers take already-authenticated parameters (brand scope, cursor,
//! filters) and return serializable outputs. HTTP framing is left to the
//! caller; [`HandlerError::is_client_error`] tells it which failures are 4xx.

mod products;
mod scans;

pub use products::{ListOutput, Product, ProductCatalog, ProductGroup};
pub use scans::{
    Dashboard, KeyCount, LandingPagesOpen, LandingPagesView, LocationScans, ScanAnalytics,
    ScanFilter, ScansTotal, TopCampaign,
};

use thiserror::Error;

use crate::analytics::AnalyticsError;
use crate::pagination::CursorError;
use crate::storage::StoreError;

/// Errors surfaced by handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid last key: {0}")]
    Cursor(#[from] CursorError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    #[error("Malformed item: {0}")]
    Item(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl HandlerError {
    /// Whether the caller sent something unusable.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Cursor(_)
                | Self::InvalidInput(_)
                | Self::Analytics(AnalyticsError::InvalidRange(_))
        )
    }
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, HandlerError>;
