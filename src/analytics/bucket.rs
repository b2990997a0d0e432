//! Report granularity chosen from the requested window.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use sea_query::SimpleExpr;
use serde::Serialize;

use super::aggregate::truncate_hour;
use super::DateRange;

/// Layout of every bucket key: a UTC instant to the second.
pub const BUCKET_KEY_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// The same layout in Timestream `date_format` specifiers.
const SQL_KEY_FORMAT: &str = "'%Y-%m-%dT%H:%i:%sZ'";

/// Granularity of a time series report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl TimeBucket {
    /// Pick a granularity from the span of `range`.
    pub fn for_range(range: &DateRange) -> Self {
        match range.days() {
            d if d <= 2 => Self::Hourly,
            d if d <= 31 => Self::Daily,
            d if d <= 93 => Self::Weekly,
            _ => Self::Monthly,
        }
    }

    fn trunc_unit(self) -> &'static str {
        match self {
            Self::Hourly => "hour",
            Self::Daily => "day",
            Self::Weekly => "week",
            Self::Monthly => "month",
        }
    }

    /// SQL expression that labels each event with its bucket key.
    ///
    /// Day, week and month boundaries are taken in the caller's local time
    /// (`offset_minutes` east of UTC) and reported as UTC instants. Hourly
    /// reports are labelled by quarter hour and must be merged into hours
    /// with [`merge_and_sum`](super::merge_and_sum).
    pub fn date_expression(self, offset_minutes: i32) -> SimpleExpr {
        SimpleExpr::Custom(self.date_sql(offset_minutes))
    }

    fn date_sql(self, offset_minutes: i32) -> String {
        if self == Self::Hourly {
            return format!("date_format(bin(time, 15m), {SQL_KEY_FORMAT})");
        }
        let local = format!(
            "date_trunc('{}', date_add('minute', {offset_minutes}, time))",
            self.trunc_unit()
        );
        format!(
            "date_format(date_add('minute', {}, {local}), {SQL_KEY_FORMAT})",
            -offset_minutes
        )
    }

    /// Every bucket key `range` touches, oldest first.
    ///
    /// The bucket containing `range.start` is always included even when it
    /// begins before the window.
    pub fn keys(self, range: &DateRange, offset_minutes: i32) -> Vec<String> {
        if self == Self::Hourly {
            return hourly_keys(range);
        }

        let offset = Duration::minutes(i64::from(offset_minutes));
        let local_start = (range.start + offset).date_naive();
        let local_end = (range.end + offset).date_naive();

        let first = match self {
            Self::Weekly => {
                let since_monday = local_start.weekday().num_days_from_monday();
                local_start - Duration::days(i64::from(since_monday))
            }
            Self::Monthly => local_start.with_day(1).unwrap_or(local_start),
            _ => local_start,
        };

        let mut keys = vec![format_key(local_midnight_utc(first, offset))];
        let mut day = first;
        while let Some(next) = day.succ_opt() {
            day = next;
            if day > local_end {
                break;
            }
            let opens_bucket = match self {
                Self::Weekly => day.weekday().num_days_from_monday() == 0,
                Self::Monthly => day.day() == 1,
                _ => true,
            };
            let instant = local_midnight_utc(day, offset);
            if opens_bucket && instant <= range.end {
                keys.push(format_key(instant));
            }
        }
        keys
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        };
        f.write_str(name)
    }
}

fn hourly_keys(range: &DateRange) -> Vec<String> {
    let mut hour = truncate_hour(range.start);
    let mut keys = Vec::new();
    while hour <= range.end {
        keys.push(format_key(hour));
        hour += Duration::hours(1);
    }
    keys
}

fn local_midnight_utc(day: NaiveDate, offset: Duration) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN)) - offset
}

fn format_key(instant: DateTime<Utc>) -> String {
    instant.format(BUCKET_KEY_FORMAT).to_string()
}
