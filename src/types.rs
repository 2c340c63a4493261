//! Core data model for chart series
//!
//! A `Point` is one record of a chart series: a timestamp-or-category key
//! plus named numeric fields. Wire payloads arrive as JSON row objects and
//! are converted here; non-numeric values become NaN so the validator can
//! decide whether to coerce or reject them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key of a chart point: temporal or categorical
#[derive(Debug, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointKey {
    Time(DateTime<Utc>),
    Category(String),
}

impl PointKey {
    /// Parse a key from a wire value.
    ///
    /// Strings are tried as RFC 3339, `YYYY-MM-DDTHH:MM:SS` and `YYYY-MM-DD`;
    /// numbers as epoch milliseconds (>= 1e11) or epoch seconds. Anything
    /// else becomes a category label.
    pub fn parse(value: &Value) -> PointKey {
        match value {
            Value::String(s) => Self::parse_str(s),
            Value::Number(n) => {
                if let Some(ts) = n.as_i64().and_then(Self::from_epoch) {
                    PointKey::Time(ts)
                } else {
                    PointKey::Category(n.to_string())
                }
            }
            other => PointKey::Category(other.to_string()),
        }
    }

    fn parse_str(s: &str) -> PointKey {
        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return PointKey::Time(ts.with_timezone(&Utc));
        }
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
            return PointKey::Time(ts.and_utc());
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            // Dates without a time component are midnight UTC
            return PointKey::Time(date.and_hms_opt(0, 0, 0).unwrap().and_utc());
        }
        PointKey::Category(s.to_string())
    }

    fn from_epoch(raw: i64) -> Option<DateTime<Utc>> {
        if raw >= 100_000_000_000 {
            DateTime::from_timestamp_millis(raw)
        } else {
            DateTime::from_timestamp(raw, 0)
        }
    }

    /// Timestamp, if this key is temporal
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            PointKey::Time(ts) => Some(*ts),
            PointKey::Category(_) => None,
        }
    }

    /// Epoch milliseconds for temporal keys
    pub fn epoch_ms(&self) -> Option<f64> {
        self.as_time().map(|ts| ts.timestamp_millis() as f64)
    }
}

/// One record of a chart series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub key: PointKey,
    #[serde(default)]
    pub fields: BTreeMap<String, f64>,
}

/// Ordered sequence of points; insertion order is significant
pub type Series = Vec<Point>;

impl Point {
    pub fn new(key: PointKey, fields: BTreeMap<String, f64>) -> Self {
        Self { key, fields }
    }

    /// Build a temporal point from epoch seconds and (field, value) pairs
    pub fn at(epoch_secs: i64, fields: &[(&str, f64)]) -> Self {
        let key = PointKey::Time(DateTime::from_timestamp(epoch_secs, 0).unwrap_or_default());
        Self::new(
            key,
            fields.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        )
    }

    /// Convert a wire row to a point.
    ///
    /// The key is taken from `key_field`, falling back to `timestamp` then
    /// `date`. Returns `None` when no key field is present. Numeric field
    /// values are kept as-is, numeric strings are parsed, and nulls become
    /// NaN for the validator to deal with.
    pub fn from_row(row: &serde_json::Map<String, Value>, key_field: &str) -> Option<Point> {
        let (key_name, key_value) = [key_field, "timestamp", "date"]
            .iter()
            .find_map(|name| row.get(*name).map(|v| (*name, v)))?;
        let key = PointKey::parse(key_value);

        let mut fields = BTreeMap::new();
        for (name, value) in row {
            if name.as_str() == key_name {
                continue;
            }
            match value {
                Value::Number(n) => {
                    fields.insert(name.clone(), n.as_f64().unwrap_or(f64::NAN));
                }
                Value::String(s) => {
                    if let Ok(v) = s.parse::<f64>() {
                        fields.insert(name.clone(), v);
                    }
                }
                Value::Null => {
                    fields.insert(name.clone(), f64::NAN);
                }
                _ => {}
            }
        }
        Some(Point::new(key, fields))
    }

    /// Value of a named field
    pub fn value(&self, field: &str) -> Option<f64> {
        self.fields.get(field).copied()
    }

    /// X coordinate for shape-preserving downsampling: epoch milliseconds
    /// for temporal keys, the point's index otherwise
    pub fn x(&self, index: usize) -> f64 {
        self.key.epoch_ms().unwrap_or(index as f64)
    }
}

/// How (and whether) the server was asked to aggregate a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    #[default]
    Raw,
    Hour,
    Day,
    Week,
    Month,
}

impl AggregationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregationMode::Raw => "raw",
            AggregationMode::Hour => "hour",
            AggregationMode::Day => "day",
            AggregationMode::Week => "week",
            AggregationMode::Month => "month",
        }
    }

    /// Bucket width for the non-raw modes
    pub fn granularity(self) -> Option<crate::aggregate::Granularity> {
        match self {
            AggregationMode::Raw => None,
            AggregationMode::Hour => Some(crate::aggregate::Granularity::Hour),
            AggregationMode::Day => Some(crate::aggregate::Granularity::Day),
            AggregationMode::Week => Some(crate::aggregate::Granularity::Week),
            AggregationMode::Month => Some(crate::aggregate::Granularity::Month),
        }
    }
}

impl std::fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_key_variants() {
        assert!(matches!(
            PointKey::parse(&json!("2024-03-01T10:30:00Z")),
            PointKey::Time(_)
        ));
        assert!(matches!(
            PointKey::parse(&json!("2024-03-01")),
            PointKey::Time(_)
        ));
        assert!(matches!(
            PointKey::parse(&json!(1_709_286_600)),
            PointKey::Time(_)
        ));
        assert!(matches!(
            PointKey::parse(&json!(1_709_286_600_000i64)),
            PointKey::Time(_)
        ));
        assert_eq!(
            PointKey::parse(&json!("Electronics")),
            PointKey::Category("Electronics".to_string())
        );
    }

    #[test]
    fn test_epoch_seconds_and_millis_agree() {
        let secs = PointKey::parse(&json!(1_709_286_600));
        let millis = PointKey::parse(&json!(1_709_286_600_000i64));
        assert_eq!(secs.as_time(), millis.as_time());
    }

    #[test]
    fn test_from_row_extracts_numeric_fields() {
        let row = json!({
            "date": "2024-03-01",
            "total_sales": 1520.5,
            "order_count": 42,
            "avg_ticket": "36.20",
            "branch_name": "Downtown",
            "returns": null,
        });
        let point = Point::from_row(row.as_object().unwrap(), "date").unwrap();

        assert_eq!(point.value("total_sales"), Some(1520.5));
        assert_eq!(point.value("order_count"), Some(42.0));
        assert_eq!(point.value("avg_ticket"), Some(36.20));
        // Label columns are not numeric fields
        assert_eq!(point.value("branch_name"), None);
        // Nulls survive as NaN for the validator
        assert!(point.value("returns").unwrap().is_nan());
    }

    #[test]
    fn test_from_row_without_key_field() {
        let row = json!({"total_sales": 10.0});
        assert!(Point::from_row(row.as_object().unwrap(), "date").is_none());
    }

    #[test]
    fn test_x_uses_index_for_categories() {
        let point = Point::new(PointKey::Category("a".into()), BTreeMap::new());
        assert_eq!(point.x(7), 7.0);
        assert_eq!(Point::at(100, &[]).x(7), 100_000.0);
    }

    #[test]
    fn test_aggregation_mode_serde() {
        assert_eq!(serde_json::to_string(&AggregationMode::Day).unwrap(), "\"day\"");
        let mode: AggregationMode = serde_json::from_str("\"week\"").unwrap();
        assert_eq!(mode, AggregationMode::Week);
    }
}
