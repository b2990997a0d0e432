//! polytag-report: Landing page report for one brand
//!
//! Fetches the landing page open series from Timestream and prints it as
//! JSON on stdout.
//!
//! ## Configuration
//! - POLYTAG_REPORT_BRAND: Brand id (required)
//! - POLYTAG_REPORT_START / POLYTAG_REPORT_END: RFC 3339 window (default: last 24 hours)
//! - POLYTAG_REPORT_VIEW: campaign | product | product-group (default: campaign)
//! - POLYTAG_REPORT_OFFSET: Caller UTC offset in minutes (default: 0)
//! - TIMESTREAM_NAME or polytag.yaml: analytics database and table

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;

use polytag::analytics::{parse_timestamp, DateRange, TableRef};
use polytag::config::Config;
use polytag::handlers::{LandingPagesView, ScanAnalytics, ScanFilter};
use polytag::storage::TimestreamStore;
use polytag::utils::bootstrap::init_tracing;

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;

    let brand_id = env("POLYTAG_REPORT_BRAND").ok_or("POLYTAG_REPORT_BRAND is required")?;
    let end = match env("POLYTAG_REPORT_END") {
        Some(end) => parse_timestamp(&end)?,
        None => Utc::now(),
    };
    let start = match env("POLYTAG_REPORT_START") {
        Some(start) => parse_timestamp(&start)?,
        None => end - Duration::hours(24),
    };
    let view: LandingPagesView = match env("POLYTAG_REPORT_VIEW") {
        Some(view) => view.parse()?,
        None => LandingPagesView::default(),
    };
    let offset_minutes: i32 = match env("POLYTAG_REPORT_OFFSET") {
        Some(offset) => offset.parse()?,
        None => 0,
    };

    let store = TimestreamStore::new(&config.storage.timestream).await?;
    let analytics = ScanAnalytics::new(
        Arc::new(store),
        TableRef::from(&config.storage.timestream),
    );

    let filter = ScanFilter::new(Some(&brand_id), DateRange::new(start, end)?);
    let report = analytics
        .get_landing_pages_open(&filter, view, offset_minutes)
        .await?;

    info!(
        brand_id = %brand_id,
        bucket = %report.bucket,
        buckets = report.landing_pages_open.len(),
        "polytag-report finished"
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
