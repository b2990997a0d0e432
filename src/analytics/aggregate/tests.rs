use chrono::TimeZone;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;

#[derive(Debug, Clone, PartialEq)]
struct CityCount {
    city: String,
    count: u64,
}

impl Summable for CityCount {
    type Identity = str;
    type Amount = u64;

    fn identity(&self) -> &str {
        &self.city
    }

    fn amount(&self) -> u64 {
        self.count
    }

    fn set_amount(&mut self, amount: u64) {
        self.count = amount;
    }
}

fn city(name: &str, count: u64) -> CityCount {
    CityCount {
        city: name.to_string(),
        count,
    }
}

/// A moment far from every test timestamp.
fn later() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap()
}

fn total_for(buckets: &BucketedSeries<CityCount>, name: &str) -> u64 {
    buckets
        .values()
        .flatten()
        .filter(|r| r.city == name)
        .map(|r| r.count)
        .sum()
}

#[test]
fn test_three_entry_example() {
    let series: TimeSeries<CityCount> = [
        ("2024-01-01T10:05:00", vec![city("X", 3)]),
        ("2024-01-01T10:45:00", vec![city("X", 2)]),
        ("2024-01-01T19:00:00", vec![city("Y", 1)]),
    ]
    .into_iter()
    .collect();

    let buckets = merge_and_sum_at(&series, later()).unwrap();

    let keys: Vec<&str> = buckets.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["2024-01-01T10:05:00", "2024-01-01T11:00:00", "2024-01-01T19:00:00"]
    );
    assert_eq!(buckets["2024-01-01T10:05:00"], vec![city("X", 3)]);
    assert_eq!(buckets["2024-01-01T11:00:00"], vec![city("X", 2)]);
    assert_eq!(total_for(&buckets, "X"), 5);
    assert_eq!(total_for(&buckets, "Y"), 1);
}

#[test]
fn test_middle_keys_merge_and_sum() {
    let series: TimeSeries<CityCount> = [
        ("2024-01-01T09:00:00Z", vec![]),
        ("2024-01-01T10:40:00Z", vec![city("X", 1), city("Y", 4)]),
        ("2024-01-01T11:10:00Z", vec![city("X", 2)]),
        ("2024-01-01T11:20:00Z", vec![city("Z", 7), city("X", 3)]),
        ("2024-01-01T13:00:00Z", vec![]),
    ]
    .into_iter()
    .collect();

    let buckets = merge_and_sum_at(&series, later()).unwrap();

    assert_eq!(buckets.len(), 3);
    assert_eq!(
        buckets["2024-01-01T11:00:00Z"],
        vec![city("X", 6), city("Y", 4), city("Z", 7)]
    );
}

#[test]
fn test_boundaries_are_never_rounded() {
    // The first and last keys would round into the middle bucket.
    let series: TimeSeries<CityCount> = [
        ("2024-01-01T10:35:00Z", vec![city("X", 1)]),
        ("2024-01-01T11:00:00Z", vec![city("X", 1)]),
        ("2024-01-01T11:25:00Z", vec![city("X", 1)]),
    ]
    .into_iter()
    .collect();

    let buckets = merge_and_sum_at(&series, later()).unwrap();

    assert!(buckets.contains_key("2024-01-01T10:35:00Z"));
    assert!(buckets.contains_key("2024-01-01T11:25:00Z"));
    assert_eq!(buckets["2024-01-01T11:00:00Z"], vec![city("X", 1)]);
}

#[test]
fn test_single_and_empty_series() {
    let empty = TimeSeries::<CityCount>::new();
    assert!(merge_and_sum_at(&empty, later()).unwrap().is_empty());

    let mut single = TimeSeries::new();
    single.push("not even a timestamp", city("X", 2));
    single.push("not even a timestamp", city("X", 3));
    let buckets = merge_and_sum_at(&single, later()).unwrap();
    assert_eq!(buckets["not even a timestamp"], vec![city("X", 5)]);
}

#[test]
fn test_round_to_hour_outside_current_hour() {
    let now = later();
    assert_eq!(round_to_hour("2024-01-01T10:29:59Z", now).unwrap(), "2024-01-01T10:00:00Z");
    assert_eq!(round_to_hour("2024-01-01T10:30:00Z", now).unwrap(), "2024-01-01T11:00:00Z");
    assert_eq!(round_to_hour("2024-01-01 23:45", now).unwrap(), "2024-01-02 00:00");
}

#[test]
fn test_round_to_hour_inside_current_hour_truncates() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 50, 0).unwrap();
    assert_eq!(round_to_hour("2024-01-01T10:45:00Z", now).unwrap(), "2024-01-01T10:00:00Z");
    // The previous hour still rounds to nearest.
    assert_eq!(round_to_hour("2024-01-01T09:45:00Z", now).unwrap(), "2024-01-01T10:00:00Z");
}

#[test]
fn test_round_to_hour_keeps_input_layout() {
    let now = later();
    assert_eq!(
        round_to_hour("2024-01-01T12:10:00+02:00", now).unwrap(),
        "2024-01-01T12:00:00+02:00"
    );
    assert_eq!(
        round_to_hour("2024-01-01T10:40:00+05:30", now).unwrap(),
        "2024-01-01T10:30:00+05:30"
    );
    assert_eq!(
        round_to_hour("2024-01-01T10:40:00.250Z", now).unwrap(),
        "2024-01-01T11:00:00.000Z"
    );
    assert_eq!(round_to_hour("2024-01-01T10:40", now).unwrap(), "2024-01-01T11:00");
    assert_eq!(round_to_hour("2024-01-01 10:40:00", now).unwrap(), "2024-01-01 11:00:00");
}

fn sorted_keys(buckets: &BucketedSeries<CityCount>) -> Vec<&str> {
    buckets.keys().map(String::as_str).collect()
}

#[test]
fn test_offset_keys_stay_in_time_order() {
    let series: TimeSeries<CityCount> = [
        ("2024-01-01T12:10:00+02:00", vec![city("X", 1)]),
        ("2024-01-01T12:40:00+02:00", vec![city("X", 2)]),
        ("2024-01-01T13:50:00+02:00", vec![city("X", 3)]),
    ]
    .into_iter()
    .collect();

    let buckets = merge_and_sum_at(&series, later()).unwrap();

    assert_eq!(
        sorted_keys(&buckets),
        vec![
            "2024-01-01T12:10:00+02:00",
            "2024-01-01T13:00:00+02:00",
            "2024-01-01T13:50:00+02:00",
        ]
    );
}

#[test]
fn test_space_separated_keys_stay_in_time_order() {
    let series: TimeSeries<CityCount> = [
        ("2024-01-01 10:05", vec![city("X", 3)]),
        ("2024-01-01 10:45", vec![city("X", 2)]),
        ("2024-01-01 19:00", vec![city("Y", 1)]),
    ]
    .into_iter()
    .collect();

    let buckets = merge_and_sum_at(&series, later()).unwrap();

    assert_eq!(
        sorted_keys(&buckets),
        vec!["2024-01-01 10:05", "2024-01-01 11:00", "2024-01-01 19:00"]
    );
    assert_eq!(buckets["2024-01-01 11:00"], vec![city("X", 2)]);
}

#[test]
fn test_invalid_middle_timestamp_fails() {
    let series: TimeSeries<CityCount> = [
        ("2024-01-01T10:00:00Z", vec![]),
        ("yesterday-ish", vec![city("X", 1)]),
        ("2024-01-01T12:00:00Z", vec![]),
    ]
    .into_iter()
    .collect();

    let err = merge_and_sum_at(&series, later()).unwrap_err();
    assert!(matches!(err, AnalyticsError::InvalidTimestamp(ref t) if t == "yesterday-ish"));
}

#[test]
fn test_input_is_not_mutated() {
    let series: TimeSeries<CityCount> = [
        ("2024-01-01T10:00:00Z", vec![city("X", 1)]),
        ("2024-01-01T10:20:00Z", vec![city("X", 2)]),
        ("2024-01-01T10:40:00Z", vec![city("X", 3)]),
        ("2024-01-01T11:10:00Z", vec![city("X", 4)]),
        ("2024-01-01T12:00:00Z", vec![city("X", 5)]),
    ]
    .into_iter()
    .collect();
    let before = series.clone();

    let buckets = merge_and_sum_at(&series, later()).unwrap();

    assert_eq!(series, before);
    assert_eq!(buckets["2024-01-01T11:00:00Z"], vec![city("X", 7)]);
}

#[test]
fn test_totals_are_conserved() {
    let mut rng = StdRng::seed_from_u64(7);
    let cities = ["X", "Y", "Z", "W"];
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

    for _ in 0..20 {
        let mut series = TimeSeries::new();
        let mut minutes = 0i64;
        for _ in 0..rng.random_range(1..40) {
            minutes += rng.random_range(1..50);
            let key = (start + Duration::minutes(minutes)).to_rfc3339();
            for _ in 0..rng.random_range(0..4) {
                let name = cities[rng.random_range(0..cities.len())];
                series.push(&key, city(name, rng.random_range(0..100)));
            }
            if series.keys().last() != Some(key.as_str()) {
                series.insert(key, Vec::new());
            }
        }

        let buckets = merge_and_sum_at(&series, later()).unwrap();

        for name in cities {
            let input: u64 = series
                .iter()
                .flat_map(|(_, records)| records)
                .filter(|r| r.city == name)
                .map(|r| r.count)
                .sum();
            assert_eq!(total_for(&buckets, name), input, "city {name}");
        }
        let keys: Vec<&String> = buckets.keys().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        for bucket in buckets.values() {
            let mut seen: Vec<&str> = bucket.iter().map(|r| r.city.as_str()).collect();
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen.len(), bucket.len());
        }
    }
}

#[test]
fn test_parse_timestamp_formats() {
    let expected = Utc.with_ymd_and_hms(2024, 1, 1, 10, 5, 0).unwrap();
    for input in [
        "2024-01-01T10:05:00Z",
        "2024-01-01T10:05:00.000Z",
        "2024-01-01T10:05:00",
        "2024-01-01 10:05:00",
        "2024-01-01T10:05",
        "2024-01-01 10:05",
    ] {
        assert_eq!(parse_timestamp(input).unwrap(), expected, "{input}");
    }
    assert!(parse_timestamp("").is_err());
}
