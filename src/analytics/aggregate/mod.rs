//! Hour bucketing of timestamped record lists.
//!
//! [`merge_and_sum`] collapses a [`TimeSeries`] into hour buckets. Records
//! that land in the same bucket with the same identity are summed; all other
//! records are kept side by side. The first and last keys of the input are
//! never rounded, so the reported span of a series does not shrink.

use std::collections::BTreeMap;
use std::ops::Add;

use chrono::{DateTime, Duration, DurationRound, FixedOffset, NaiveDateTime, Utc};

use super::{AnalyticsError, Result};

/// Layouts accepted for timestamps without an offset; read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A record that can be merged with others sharing its identity.
pub trait Summable: Clone {
    type Identity: PartialEq + ?Sized;
    type Amount: Copy + Add<Output = Self::Amount>;

    fn identity(&self) -> &Self::Identity;
    fn amount(&self) -> Self::Amount;
    fn set_amount(&mut self, amount: Self::Amount);
}

/// Timestamp keys with their records, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries<T> {
    entries: Vec<(String, Vec<T>)>,
}

impl<T> Default for TimeSeries<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> TimeSeries<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the records for `key`, keeping its original position if present.
    pub fn insert(&mut self, key: impl Into<String>, records: Vec<T>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = records,
            None => self.entries.push((key, records)),
        }
    }

    /// Append one record under `key`, adding the key at the end if new.
    pub fn push(&mut self, key: &str, record: T) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, records)) => records.push(record),
            None => self.entries.push((key.to_string(), vec![record])),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.entries
            .iter()
            .map(|(key, records)| (key.as_str(), records.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}

impl<K: Into<String>, T> FromIterator<(K, Vec<T>)> for TimeSeries<T> {
    fn from_iter<I: IntoIterator<Item = (K, Vec<T>)>>(iter: I) -> Self {
        let mut series = Self::new();
        for (key, records) in iter {
            series.insert(key, records);
        }
        series
    }
}

/// Merged output; keys iterate in ascending order.
pub type BucketedSeries<T> = BTreeMap<String, Vec<T>>;

/// Merge `series` into hour buckets relative to the current time.
pub fn merge_and_sum<T: Summable>(series: &TimeSeries<T>) -> Result<BucketedSeries<T>> {
    merge_and_sum_at(series, Utc::now())
}

/// Merge `series` into hour buckets as if evaluated at `now`.
///
/// Every key except the first and last is replaced by [`round_to_hour`].
/// Within a bucket a record whose identity is already present adds its
/// amount to the existing record; otherwise it is appended. The input is
/// left untouched.
pub fn merge_and_sum_at<T: Summable>(
    series: &TimeSeries<T>,
    now: DateTime<Utc>,
) -> Result<BucketedSeries<T>> {
    let last = series.len().saturating_sub(1);
    let mut buckets = BucketedSeries::new();

    for (i, (key, records)) in series.iter().enumerate() {
        let bucket_key = if i == 0 || i == last {
            key.to_string()
        } else {
            round_to_hour(key, now)?
        };

        let bucket: &mut Vec<T> = buckets.entry(bucket_key).or_default();
        for record in records {
            sum_into(bucket, record.clone());
        }
    }

    Ok(buckets)
}

/// Add `record` to `bucket`, summing with an existing record of the same
/// identity.
pub fn sum_into<T: Summable>(bucket: &mut Vec<T>, record: T) {
    match bucket
        .iter_mut()
        .find(|existing| existing.identity() == record.identity())
    {
        Some(existing) => {
            let total = existing.amount() + record.amount();
            existing.set_amount(total);
        }
        None => bucket.push(record),
    }
}

/// Hour bucket for `timestamp`, written in the same layout as `timestamp`.
///
/// Inside the hour containing `now` the timestamp is truncated to the start
/// of its hour. Anywhere else it is rounded to the nearest hour, with half
/// past rounding up. The result keeps the input's date/time separator,
/// precision and zone, so keys of one layout still sort chronologically.
pub fn round_to_hour(timestamp: &str, now: DateTime<Utc>) -> Result<String> {
    let instant = parse_timestamp(timestamp)?;
    let hour = if truncate_hour(instant) == truncate_hour(now) {
        truncate_hour(instant)
    } else {
        truncate_hour(instant + Duration::minutes(30))
    };
    Ok(KeyLayout::of(timestamp).render(hour))
}

/// How a timestamp key was written.
#[derive(Debug, Clone, PartialEq)]
struct KeyLayout {
    separator: char,
    seconds: bool,
    fraction_digits: usize,
    zone: KeyZone,
}

#[derive(Debug, Clone, PartialEq)]
enum KeyZone {
    /// No zone designator; read and written as UTC.
    Naive,
    /// `Z` or `z`.
    Zulu(char),
    Offset(FixedOffset),
}

impl KeyLayout {
    /// Layout of a timestamp already accepted by [`parse_timestamp`].
    fn of(timestamp: &str) -> Self {
        let zone = match DateTime::parse_from_rfc3339(timestamp) {
            Ok(_) if timestamp.ends_with(['Z', 'z']) => {
                KeyZone::Zulu(timestamp.chars().last().unwrap_or('Z'))
            }
            Ok(parsed) => KeyZone::Offset(*parsed.offset()),
            Err(_) => KeyZone::Naive,
        };
        let separator = timestamp.chars().nth(10).unwrap_or('T');

        let time = timestamp.get(11..).unwrap_or_default();
        let time = match zone {
            KeyZone::Naive => time,
            KeyZone::Zulu(_) => &time[..time.len().saturating_sub(1)],
            KeyZone::Offset(_) => time.get(..time.len().saturating_sub(6)).unwrap_or(time),
        };
        let (clock, fraction) = time.split_once('.').unwrap_or((time, ""));

        Self {
            separator,
            seconds: clock.len() > "HH:MM".len(),
            fraction_digits: fraction.len(),
            zone,
        }
    }

    fn render(&self, hour: DateTime<Utc>) -> String {
        let mut format = format!("%Y-%m-%d{}%H:%M", self.separator);
        if self.seconds {
            format.push_str(":%S");
        }
        if self.fraction_digits > 0 {
            format.push('.');
            format.push_str(&"0".repeat(self.fraction_digits));
        }

        match self.zone {
            KeyZone::Naive => hour.format(&format).to_string(),
            KeyZone::Zulu(designator) => {
                format.push(designator);
                hour.format(&format).to_string()
            }
            KeyZone::Offset(offset) => {
                format.push_str("%:z");
                hour.with_timezone(&offset).format(&format).to_string()
            }
        }
    }
}

/// Parse an RFC 3339 timestamp, or a naive one taken as UTC.
pub fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(timestamp) {
        return Ok(instant.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(timestamp, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AnalyticsError::InvalidTimestamp(timestamp.to_string()))
}

pub(crate) fn truncate_hour(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.duration_trunc(Duration::hours(1)).unwrap_or(instant)
}

#[cfg(test)]
mod tests;
