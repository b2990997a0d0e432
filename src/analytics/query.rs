//! Timestream SQL construction.
//!
//! Statements are built with sea-query and rendered by its SQLite builder,
//! whose quoting (`"ident"`, `'it''s'`) is the ANSI form Timestream reads.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use sea_query::{
    Alias, Asterisk, Expr, Func, Order, Query, SelectStatement, SimpleExpr, SqliteQueryBuilder,
};

use super::{AnalyticsError, Result};
use crate::config::TimestreamConfig;

/// Measure name recorded for every landing page scan.
pub const LANDING_PAGE_SCAN: &str = "landing-page-scan";

const PRODUCT_GROUP_PREFIX: &str = "brand-product-group#";

/// Column reference.
pub fn col(name: &str) -> Expr {
    Expr::col(Alias::new(name))
}

/// `COUNT(*)`
pub fn count_all() -> SimpleExpr {
    Func::count(Expr::col(Asterisk)).into()
}

/// `COALESCE(column, 'fallback')`
pub fn coalesce(column: &str, fallback: &str) -> SimpleExpr {
    let args: [SimpleExpr; 2] = [col(column).into(), Expr::val(fallback).into()];
    Func::coalesce(args).into()
}

/// Fully qualified analytics table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub database: String,
    pub table: String,
}

impl TableRef {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }

    fn iden(&self) -> (Alias, Alias) {
        (Alias::new(&self.database), Alias::new(&self.table))
    }
}

impl From<&TimestreamConfig> for TableRef {
    fn from(config: &TimestreamConfig) -> Self {
        Self::new(&config.database, &config.table)
    }
}

/// Inclusive time window for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(AnalyticsError::InvalidRange(format!(
                "start {} is after end {}",
                start.to_rfc3339_opts(SecondsFormat::Secs, true),
                end.to_rfc3339_opts(SecondsFormat::Secs, true)
            )));
        }
        Ok(Self { start, end })
    }

    /// Whole days between start and end.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// `time BETWEEN from_iso8601_timestamp(start) AND from_iso8601_timestamp(end)`
    pub fn condition(&self) -> SimpleExpr {
        col("time").between(iso8601(self.start), iso8601(self.end))
    }
}

fn iso8601(instant: DateTime<Utc>) -> SimpleExpr {
    Func::cust(Alias::new("from_iso8601_timestamp"))
        .arg(instant.to_rfc3339_opts(SecondsFormat::Millis, true))
        .into()
}

/// Builder for a tenant-scoped query over one measure.
///
/// ```text
/// SELECT <columns>
/// FROM "db"."table"
/// WHERE "measure_name" = '<measure>'
///   [AND "brand_id" = '<brand>']
///   [AND "<column>" IN (...)]...
///   [AND "time" BETWEEN ...]
///   [AND <condition>]...
/// [GROUP BY ...] [ORDER BY ...] [LIMIT n]
/// ```
///
/// Every value is rendered as a quoted literal by sea-query.
#[derive(Debug, Clone)]
pub struct AnalyticsQuery {
    select: SelectStatement,
    has_columns: bool,
}

impl AnalyticsQuery {
    pub fn new(table: &TableRef, measure: &str) -> Self {
        let select = Query::select()
            .from(table.iden())
            .and_where(col("measure_name").eq(measure))
            .to_owned();
        Self {
            select,
            has_columns: false,
        }
    }

    pub fn column(mut self, name: &str) -> Self {
        self.select.column(Alias::new(name));
        self.has_columns = true;
        self
    }

    /// Select `expr AS alias`.
    pub fn expr_as(mut self, expr: impl Into<SimpleExpr>, alias: &str) -> Self {
        self.select.expr_as(expr, Alias::new(alias));
        self.has_columns = true;
        self
    }

    /// Scope to one brand. `None` leaves the query unscoped.
    pub fn brand(self, brand_id: Option<&str>) -> Self {
        match brand_id {
            Some(id) => self.condition(col("brand_id").eq(id)),
            None => self,
        }
    }

    /// Restrict `column` to `values`. No-op for an empty list.
    pub fn one_of<S: AsRef<str>>(self, column: &str, values: &[S]) -> Self {
        if values.is_empty() {
            return self;
        }
        let values = values.iter().map(|v| v.as_ref().to_string());
        self.condition(col(column).is_in(values))
    }

    pub fn gtins<S: AsRef<str>>(self, gtins: &[S]) -> Self {
        self.one_of("gtin", gtins)
    }

    /// Restrict to product groups, given as sort keys or bare ids.
    pub fn product_groups<S: AsRef<str>>(self, groups: &[S]) -> Self {
        let ids: Vec<&str> = groups
            .iter()
            .map(|g| {
                let g = g.as_ref();
                g.strip_prefix(PRODUCT_GROUP_PREFIX).unwrap_or(g)
            })
            .collect();
        self.one_of("product_group_id", &ids)
    }

    pub fn range(self, range: &DateRange) -> Self {
        self.condition(range.condition())
    }

    pub fn condition(mut self, predicate: SimpleExpr) -> Self {
        self.select.and_where(predicate);
        self
    }

    pub fn group_by(mut self, expr: impl Into<SimpleExpr>) -> Self {
        self.select.add_group_by([expr.into()]);
        self
    }

    pub fn group_by_column(mut self, name: &str) -> Self {
        self.select.group_by_col(Alias::new(name));
        self
    }

    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.select.order_by(Alias::new(column), order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.select.limit(limit);
        self
    }

    pub fn to_sql(&self) -> String {
        if self.has_columns {
            return self.select.to_string(SqliteQueryBuilder);
        }
        let mut select = self.select.clone();
        select.column(Asterisk);
        select.to_string(SqliteQueryBuilder)
    }
}

impl fmt::Display for AnalyticsQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn table() -> TableRef {
        TableRef::new("polytag", "polytag")
    }

    fn range() -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn scans() -> AnalyticsQuery {
        AnalyticsQuery::new(&table(), LANDING_PAGE_SCAN)
    }

    #[test]
    fn test_table_identifiers_are_quoted() {
        let sql = AnalyticsQuery::new(&TableRef::new("a\"b", "c"), LANDING_PAGE_SCAN).to_sql();
        assert!(sql.contains(r#"FROM "a""b"."c""#), "{sql}");
    }

    #[test]
    fn test_table_ref_from_config() {
        let config = TimestreamConfig {
            database: "analytics".to_string(),
            table: "scans".to_string(),
            region: None,
        };
        assert_eq!(TableRef::from(&config), TableRef::new("analytics", "scans"));
    }

    #[test]
    fn test_tenant_values_are_escaped() {
        let sql = scans()
            .brand(Some("o'brien' OR '1'='1"))
            .gtins(&["0001'); DROP TABLE x; --"])
            .to_sql();
        assert!(sql.contains(r#""brand_id" = 'o''brien'' OR ''1''=''1'"#), "{sql}");
        assert!(sql.contains(r#""gtin" IN ('0001''); DROP TABLE x; --')"#), "{sql}");
    }

    #[test]
    fn test_date_range_rejects_reversed() {
        let r = range();
        let result = DateRange::new(r.end, r.start);
        assert!(matches!(result, Err(AnalyticsError::InvalidRange(_))));
    }

    #[test]
    fn test_date_range_condition() {
        assert_eq!(range().days(), 7);
        let sql = scans().range(&range()).to_sql();
        assert!(
            sql.contains(
                "\"time\" BETWEEN from_iso8601_timestamp('2024-01-01T00:00:00.000Z') \
                 AND from_iso8601_timestamp('2024-01-08T00:00:00.000Z')"
            ),
            "{sql}"
        );
    }

    #[test]
    fn test_minimal_query() {
        let sql = scans().expr_as(count_all(), "total").to_sql();
        assert_eq!(
            sql,
            concat!(
                r#"SELECT COUNT(*) AS "total" FROM "polytag"."polytag" "#,
                r#"WHERE "measure_name" = 'landing-page-scan'"#
            )
        );
    }

    #[test]
    fn test_no_columns_selects_everything() {
        assert!(scans().to_sql().starts_with("SELECT * FROM"));
    }

    #[test]
    fn test_full_query() {
        let campaign = coalesce("campaign_id", "no-campaign");
        let sql = scans()
            .expr_as(campaign.clone(), "campaign_id")
            .expr_as(count_all(), "total")
            .brand(Some("brand#1"))
            .gtins(&["0001", "0002"])
            .product_groups(&["brand-product-group#pg1", "pg2"])
            .range(&range())
            .group_by(campaign)
            .order_by("total", Order::Desc)
            .limit(5)
            .to_sql();

        assert!(sql.contains(r#"COALESCE("campaign_id", 'no-campaign') AS "campaign_id""#));
        assert!(sql.contains(r#"AND "brand_id" = 'brand#1'"#));
        assert!(sql.contains(r#"AND "gtin" IN ('0001', '0002')"#));
        assert!(sql.contains(r#"AND "product_group_id" IN ('pg1', 'pg2')"#));
        assert!(sql.contains(r#"AND "time" BETWEEN"#));
        assert!(sql.ends_with(
            r#" GROUP BY COALESCE("campaign_id", 'no-campaign') ORDER BY "total" DESC LIMIT 5"#
        ));
    }

    #[test]
    fn test_empty_filters_are_skipped() {
        let empty: [&str; 0] = [];
        let sql = scans()
            .brand(None)
            .gtins(&empty)
            .product_groups(&empty)
            .to_sql();
        assert!(!sql.contains("brand_id"));
        assert!(!sql.contains(" IN "));
    }
}
