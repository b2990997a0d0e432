//! Scan analytics endpoints.
//!
//! Every endpoint reads through [`fetch_all`], so a brand whose analytics
//! table has not been created yet sees empty results rather than an error.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_query::{Alias, Expr, Func, Order, SimpleExpr};
use serde::Serialize;
use tracing::debug;

use super::{HandlerError, Result};
use crate::analytics::{
    self, coalesce, col, count_all, fetch_all, merge_and_sum_at, parse_column, require_column,
    sum_into, AnalyticsQuery, BucketedSeries, DateRange, FromRow, Summable, TableRef, TimeBucket,
    TimeSeries, LANDING_PAGE_SCAN,
};
use crate::storage::{Row, TimeSeriesStore};

const TOP_CAMPAIGNS_LIMIT: u64 = 5;
const NO_CAMPAIGN: &str = "no-campaign";
const STATE_NOT_SET: &str = "not-set";
/// Widest UTC offset in use (UTC+14 / UTC-12).
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Which scans to count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFilter {
    /// Tenant scope. Only the total scan count may run unscoped.
    pub brand_id: Option<String>,
    pub range: DateRange,
    pub gtins: Vec<String>,
    /// Product group ids or sort keys.
    pub product_groups: Vec<String>,
}

impl ScanFilter {
    pub fn new(brand_id: Option<&str>, range: DateRange) -> Self {
        Self {
            brand_id: brand_id.map(str::to_string),
            range,
            gtins: Vec::new(),
            product_groups: Vec::new(),
        }
    }

    pub fn with_gtins(mut self, gtins: Vec<String>) -> Self {
        self.gtins = gtins;
        self
    }

    pub fn with_product_groups(mut self, product_groups: Vec<String>) -> Self {
        self.product_groups = product_groups;
        self
    }

    fn require_brand(&self) -> Result<&str> {
        self.brand_id
            .as_deref()
            .ok_or_else(|| HandlerError::InvalidInput("brand_id is required".to_string()))
    }

    fn apply(&self, query: AnalyticsQuery) -> AnalyticsQuery {
        query
            .brand(self.brand_id.as_deref())
            .gtins(&self.gtins)
            .product_groups(&self.product_groups)
            .range(&self.range)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScansTotal {
    pub scans: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopCampaign {
    pub campaign_id: String,
    pub total: u64,
}

impl FromRow for TopCampaign {
    fn from_row(row: &Row) -> analytics::Result<Self> {
        Ok(Self {
            campaign_id: require_column(row, "campaign_id")?.to_string(),
            total: parse_column(row, "total")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationScans {
    pub city: String,
    pub state: Option<String>,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub scans_count: u64,
}

impl FromRow for LocationScans {
    fn from_row(row: &Row) -> analytics::Result<Self> {
        let state = row
            .get("country_region_name")
            .filter(|s| *s != STATE_NOT_SET)
            .map(str::to_string);
        Ok(Self {
            city: require_column(row, "city")?.to_string(),
            state,
            country: require_column(row, "country_name")?.to_string(),
            latitude: parse_column(row, "latitude")?,
            longitude: parse_column(row, "longitude")?,
            scans_count: parse_column(row, "count")?,
        })
    }
}

/// Grouping of the landing page time series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LandingPagesView {
    #[default]
    Campaign,
    Product,
    ProductGroup,
}

impl LandingPagesView {
    fn column(self) -> &'static str {
        match self {
            Self::Campaign => "campaign_id",
            Self::Product => "gtin",
            Self::ProductGroup => "product_group_id",
        }
    }

    fn fallback(self) -> &'static str {
        match self {
            Self::Campaign => NO_CAMPAIGN,
            Self::Product => "no-gtin",
            Self::ProductGroup => "no-product-group",
        }
    }

    fn key_expression(self) -> SimpleExpr {
        coalesce(self.column(), self.fallback())
    }
}

impl FromStr for LandingPagesView {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "campaign" => Ok(Self::Campaign),
            "product" => Ok(Self::Product),
            "product-group" => Ok(Self::ProductGroup),
            other => Err(HandlerError::InvalidInput(format!("unsupported view: {other}"))),
        }
    }
}

impl fmt::Display for LandingPagesView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Campaign => "campaign",
            Self::Product => "product",
            Self::ProductGroup => "product-group",
        };
        f.write_str(name)
    }
}

/// Scan count for one view key within a time bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyCount {
    pub key: String,
    pub value: u64,
}

impl Summable for KeyCount {
    type Identity = str;
    type Amount = u64;

    fn identity(&self) -> &str {
        &self.key
    }

    fn amount(&self) -> u64 {
        self.value
    }

    fn set_amount(&mut self, amount: u64) {
        self.value = amount;
    }
}

/// One `(date, key, count)` row of the landing page query.
struct DatedCount {
    date: String,
    count: KeyCount,
}

impl FromRow for DatedCount {
    fn from_row(row: &Row) -> analytics::Result<Self> {
        Ok(Self {
            date: require_column(row, "date")?.to_string(),
            count: KeyCount {
                key: require_column(row, "key")?.to_string(),
                value: parse_column(row, "count")?,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LandingPagesOpen {
    pub view: LandingPagesView,
    pub bucket: TimeBucket,
    pub landing_pages_open: BucketedSeries<KeyCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub scans: u64,
    pub top_campaigns: Vec<TopCampaign>,
    pub scans_by_location: Vec<LocationScans>,
}

/// Scan analytics for one analytics table.
pub struct ScanAnalytics {
    store: Arc<dyn TimeSeriesStore>,
    table: TableRef,
}

impl ScanAnalytics {
    pub fn new(store: Arc<dyn TimeSeriesStore>, table: TableRef) -> Self {
        Self { store, table }
    }

    fn query(&self) -> AnalyticsQuery {
        AnalyticsQuery::new(&self.table, LANDING_PAGE_SCAN)
    }

    /// Total landing page scans matching `filter`.
    pub async fn get_scans(&self, filter: &ScanFilter) -> Result<ScansTotal> {
        let query = filter.apply(self.query().expr_as(count_all(), "total"));

        let rows: Vec<Row> = fetch_all(self.store.as_ref(), &query).await?;
        let scans = rows
            .iter()
            .filter(|row| row.get("total").is_some())
            .map(|row| parse_column::<u64>(row, "total"))
            .sum::<analytics::Result<u64>>()?;

        debug!(brand_id = ?filter.brand_id, scans, "Counted scans");
        Ok(ScansTotal { scans })
    }

    /// Campaigns with the most scans, best first.
    pub async fn get_top_campaigns(&self, filter: &ScanFilter) -> Result<Vec<TopCampaign>> {
        filter.require_brand()?;
        let campaign = coalesce("campaign_id", NO_CAMPAIGN);
        let query = filter
            .apply(
                self.query()
                    .expr_as(campaign.clone(), "campaign_id")
                    .expr_as(count_all(), "total"),
            )
            .group_by(campaign)
            .order_by("total", Order::Desc)
            .limit(TOP_CAMPAIGNS_LIMIT);

        Ok(fetch_all(self.store.as_ref(), &query).await?)
    }

    /// Scan counts per city.
    pub async fn get_scans_by_location(&self, filter: &ScanFilter) -> Result<Vec<LocationScans>> {
        filter.require_brand()?;
        let query = filter
            .apply(
                self.query()
                    .column("country_region_name")
                    .column("country_name")
                    .column("city")
                    .expr_as(average("longitude"), "longitude")
                    .expr_as(average("latitude"), "latitude")
                    .expr_as(count_all(), "count")
                    .condition(Expr::val("null").is_not_in([
                        col("latitude"),
                        col("longitude"),
                        col("city"),
                    ])),
            )
            .group_by_column("country_region_name")
            .group_by_column("country_name")
            .group_by_column("city");

        Ok(fetch_all(self.store.as_ref(), &query).await?)
    }

    /// Landing page opens over time, grouped by `view`.
    ///
    /// `offset_minutes` is the caller's UTC offset and sets where days,
    /// weeks and months begin.
    pub async fn get_landing_pages_open(
        &self,
        filter: &ScanFilter,
        view: LandingPagesView,
        offset_minutes: i32,
    ) -> Result<LandingPagesOpen> {
        self.get_landing_pages_open_at(filter, view, offset_minutes, Utc::now())
            .await
    }

    /// [`get_landing_pages_open`](Self::get_landing_pages_open) evaluated at `now`.
    pub async fn get_landing_pages_open_at(
        &self,
        filter: &ScanFilter,
        view: LandingPagesView,
        offset_minutes: i32,
        now: DateTime<Utc>,
    ) -> Result<LandingPagesOpen> {
        filter.require_brand()?;
        if offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(HandlerError::InvalidInput(format!(
                "offset out of range: {offset_minutes} minutes"
            )));
        }

        let bucket = TimeBucket::for_range(&filter.range);
        let date = bucket.date_expression(offset_minutes);
        let key = view.key_expression();
        let query = filter
            .apply(
                self.query()
                    .expr_as(date.clone(), "date")
                    .expr_as(key.clone(), "key")
                    .expr_as(count_all(), "count"),
            )
            .group_by(date)
            .group_by(key)
            .order_by("date", Order::Asc);

        let rows: Vec<DatedCount> = fetch_all(self.store.as_ref(), &query).await?;

        let mut dated: BTreeMap<String, Vec<KeyCount>> = bucket
            .keys(&filter.range, offset_minutes)
            .into_iter()
            .map(|k| (k, Vec::new()))
            .collect();
        for row in rows {
            sum_into(dated.entry(row.date).or_default(), row.count);
        }

        let mut landing_pages_open = match bucket {
            TimeBucket::Hourly => {
                let series: TimeSeries<KeyCount> = dated.into_iter().collect();
                merge_and_sum_at(&series, now)?
            }
            _ => dated,
        };
        pad_with_zeroes(&mut landing_pages_open);

        debug!(
            brand_id = ?filter.brand_id,
            %view,
            %bucket,
            buckets = landing_pages_open.len(),
            "Built landing page series"
        );

        Ok(LandingPagesOpen {
            view,
            bucket,
            landing_pages_open,
        })
    }

    /// Headline figures, fetched concurrently.
    pub async fn get_dashboard(&self, filter: &ScanFilter) -> Result<Dashboard> {
        let (scans, top_campaigns, scans_by_location) = tokio::try_join!(
            self.get_scans(filter),
            self.get_top_campaigns(filter),
            self.get_scans_by_location(filter),
        )?;

        Ok(Dashboard {
            scans: scans.scans,
            top_campaigns,
            scans_by_location,
        })
    }
}

/// `AVG(CAST(column AS DOUBLE))`; coordinates are stored as strings.
fn average(column: &str) -> SimpleExpr {
    Func::avg(Func::cast_as(col(column), Alias::new("DOUBLE"))).into()
}

/// Give every bucket an entry for every key seen anywhere in the series.
fn pad_with_zeroes(series: &mut BucketedSeries<KeyCount>) {
    let all_keys: BTreeSet<String> = series
        .values()
        .flatten()
        .map(|count| count.key.clone())
        .collect();

    for counts in series.values_mut() {
        for key in &all_keys {
            if !counts.iter().any(|c| &c.key == key) {
                counts.push(KeyCount {
                    key: key.clone(),
                    value: 0,
                });
            }
        }
    }
}
