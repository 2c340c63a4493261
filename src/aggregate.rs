//! Time-bucket aggregation
//!
//! Groups points by their timestamp truncated to a granularity boundary
//! (UTC, fixed calendar) and reduces each bucket per field. Buckets with no
//! contributing points are not synthesized; gap-filling is a rendering
//! concern.

use crate::error::{FeedError, Result};
use crate::types::{Point, PointKey, Series};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bucket width for time aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
    Week,
    Month,
}

/// How a field's values are reduced within a bucket.
///
/// Additive metrics (counts, totals) sum; gauge-like metrics (stock levels,
/// ratios) take the last value or the average. Callers supply the mode per
/// field; the default is `Sum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionMode {
    #[default]
    Sum,
    Average,
    Last,
}

/// Truncate a timestamp to its bucket boundary. Weeks start Monday 00:00 UTC.
pub fn truncate(ts: DateTime<Utc>, granularity: Granularity) -> DateTime<Utc> {
    let date = ts.date_naive();
    let boundary = match granularity {
        Granularity::Hour => date.and_hms_opt(ts.hour(), 0, 0).unwrap(),
        Granularity::Day => date.and_hms_opt(0, 0, 0).unwrap(),
        Granularity::Week => {
            let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
            monday.and_hms_opt(0, 0, 0).unwrap()
        }
        Granularity::Month => date.with_day(1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
    };
    boundary.and_utc()
}

#[derive(Default)]
struct FieldAcc {
    sum: f64,
    count: usize,
    last: f64,
}

/// Aggregate a temporal series into granularity buckets.
///
/// Output is ordered ascending by bucket key regardless of input order.
/// Categorical points cannot be time-bucketed; that is a processing error
/// the pipeline traps rather than propagates.
pub fn aggregate_by_time(
    series: &[Point],
    granularity: Granularity,
    reductions: &BTreeMap<String, ReductionMode>,
) -> Result<Series> {
    let mut buckets: BTreeMap<DateTime<Utc>, BTreeMap<String, FieldAcc>> = BTreeMap::new();

    for point in series {
        let ts = match &point.key {
            PointKey::Time(ts) => *ts,
            PointKey::Category(label) => {
                return Err(FeedError::Processing(format!(
                    "cannot time-bucket categorical point '{}'",
                    label
                )));
            }
        };
        let bucket = buckets.entry(truncate(ts, granularity)).or_default();
        for (field, value) in &point.fields {
            let acc = bucket.entry(field.clone()).or_default();
            acc.sum += value;
            acc.count += 1;
            acc.last = *value;
        }
    }

    let out = buckets
        .into_iter()
        .map(|(key, fields)| {
            let reduced = fields
                .into_iter()
                .map(|(field, acc)| {
                    let mode = reductions.get(&field).copied().unwrap_or_default();
                    let value = match mode {
                        ReductionMode::Sum => acc.sum,
                        ReductionMode::Average => acc.sum / acc.count as f64,
                        ReductionMode::Last => acc.last,
                    };
                    (field, value)
                })
                .collect();
            Point::new(PointKey::Time(key), reduced)
        })
        .collect();

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hourly_sales(hours: usize) -> Series {
        (0..hours)
            .map(|i| {
                Point::at(
                    1_704_067_200 + i as i64 * 3600, // 2024-01-01T00:00:00Z
                    &[("total_sales", 100.0 + i as f64), ("order_count", 2.0)],
                )
            })
            .collect()
    }

    #[test]
    fn test_truncation_boundaries() {
        let ts = DateTime::parse_from_rfc3339("2024-03-14T15:42:07Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(
            truncate(ts, Granularity::Hour).to_rfc3339(),
            "2024-03-14T15:00:00+00:00"
        );
        assert_eq!(
            truncate(ts, Granularity::Day).to_rfc3339(),
            "2024-03-14T00:00:00+00:00"
        );
        // 2024-03-14 is a Thursday; the week starts Monday the 11th
        assert_eq!(
            truncate(ts, Granularity::Week).to_rfc3339(),
            "2024-03-11T00:00:00+00:00"
        );
        assert_eq!(
            truncate(ts, Granularity::Month).to_rfc3339(),
            "2024-03-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_sum_conservation() {
        let series = hourly_sales(72);
        let raw_total: f64 = series.iter().filter_map(|p| p.value("total_sales")).sum();

        let out = aggregate_by_time(&series, Granularity::Day, &BTreeMap::new()).unwrap();
        let bucketed_total: f64 = out.iter().filter_map(|p| p.value("total_sales")).sum();

        assert_eq!(out.len(), 3);
        assert!((raw_total - bucketed_total).abs() < 1e-9);
    }

    #[test]
    fn test_output_sorted_regardless_of_input_order() {
        let mut series = hourly_sales(48);
        series.reverse();

        let out = aggregate_by_time(&series, Granularity::Day, &BTreeMap::new()).unwrap();
        let keys: Vec<_> = out.iter().map(|p| p.key.as_time().unwrap()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_per_field_reduction_modes() {
        let series = vec![
            Point::at(1_704_067_200, &[("revenue", 10.0), ("stock", 50.0), ("margin", 0.2)]),
            Point::at(1_704_070_800, &[("revenue", 20.0), ("stock", 45.0), ("margin", 0.4)]),
        ];
        let reductions: BTreeMap<String, ReductionMode> = [
            ("stock".to_string(), ReductionMode::Last),
            ("margin".to_string(), ReductionMode::Average),
        ]
        .into_iter()
        .collect();

        let out = aggregate_by_time(&series, Granularity::Day, &reductions).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value("revenue"), Some(30.0)); // default sum
        assert_eq!(out[0].value("stock"), Some(45.0));
        assert!((out[0].value("margin").unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_no_gap_filling() {
        // Two points a week apart aggregate to two daily buckets, not eight
        let series = vec![
            Point::at(1_704_067_200, &[("v", 1.0)]),
            Point::at(1_704_067_200 + 7 * 86_400, &[("v", 2.0)]),
        ];
        let out = aggregate_by_time(&series, Granularity::Day, &BTreeMap::new()).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_categorical_points_are_rejected() {
        let series = vec![Point::new(
            PointKey::Category("Electronics".into()),
            BTreeMap::new(),
        )];
        assert!(matches!(
            aggregate_by_time(&series, Granularity::Day, &BTreeMap::new()),
            Err(FeedError::Processing(_))
        ));
    }
}
