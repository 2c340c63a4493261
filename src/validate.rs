//! Structural validation of candidate series
//!
//! Validation is non-fatal by design: the pipeline logs failures and keeps
//! serving whatever data it has, preferring a degraded chart over a blank
//! one.

use crate::types::{Point, PointKey};
use serde::{Deserialize, Serialize};

/// What to do with non-finite numeric values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorMode {
    /// Non-finite values are repairable; the pipeline zeroes them
    #[default]
    Coerce,
    /// Non-finite values fail validation
    Strict,
}

/// Outcome of a validation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub error: Option<String>,
}

impl ValidationReport {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn fail(error: String) -> Self {
        Self {
            valid: false,
            error: Some(error),
        }
    }
}

/// Check structural invariants of a series.
///
/// Fails when a required field is absent on any point, when a temporal
/// series is out of order, or (in `Strict` mode) when a field value is
/// non-finite.
pub fn validate(series: &[Point], required_fields: &[String], mode: ValidatorMode) -> ValidationReport {
    let mut prev_ts = None;
    for (i, point) in series.iter().enumerate() {
        for field in required_fields {
            match point.value(field) {
                None => {
                    return ValidationReport::fail(format!(
                        "point {} is missing required field '{}'",
                        i, field
                    ));
                }
                Some(v) if !v.is_finite() && mode == ValidatorMode::Strict => {
                    return ValidationReport::fail(format!(
                        "point {} has non-finite value for '{}'",
                        i, field
                    ));
                }
                Some(_) => {}
            }
        }

        if let PointKey::Time(ts) = &point.key {
            if let Some(prev) = prev_ts {
                if *ts < prev {
                    return ValidationReport::fail(format!("point {} is out of time order", i));
                }
            }
            prev_ts = Some(*ts);
        }
    }

    ValidationReport::ok()
}

/// Replace non-finite field values with zero. Returns how many were fixed.
pub fn coerce_non_finite(series: &mut [Point]) -> usize {
    let mut fixed = 0;
    for point in series.iter_mut() {
        for value in point.fields.values_mut() {
            if !value.is_finite() {
                *value = 0.0;
                fixed += 1;
            }
        }
    }
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    fn required(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_valid_series() {
        let series = vec![
            Point::at(100, &[("value", 1.0)]),
            Point::at(200, &[("value", 2.0)]),
        ];
        let report = validate(&series, &required(&["value"]), ValidatorMode::Strict);
        assert!(report.valid);
        assert!(report.error.is_none());
    }

    #[test]
    fn test_missing_required_field() {
        let series = vec![
            Point::at(100, &[("value", 1.0)]),
            Point::at(200, &[("other", 2.0)]),
        ];
        let report = validate(&series, &required(&["value"]), ValidatorMode::Coerce);
        assert!(!report.valid);
        assert!(report.error.unwrap().contains("point 1"));
    }

    #[test]
    fn test_non_finite_by_mode() {
        let series = vec![Point::at(100, &[("value", f64::NAN)])];

        let strict = validate(&series, &required(&["value"]), ValidatorMode::Strict);
        assert!(!strict.valid);

        let coerce = validate(&series, &required(&["value"]), ValidatorMode::Coerce);
        assert!(coerce.valid);
    }

    #[test]
    fn test_out_of_order_timestamps() {
        let series = vec![
            Point::at(200, &[("value", 1.0)]),
            Point::at(100, &[("value", 2.0)]),
        ];
        let report = validate(&series, &[], ValidatorMode::Coerce);
        assert!(!report.valid);
    }

    #[test]
    fn test_coerce_non_finite() {
        let mut series = vec![
            Point::at(100, &[("a", f64::NAN), ("b", 1.0)]),
            Point::at(200, &[("a", f64::INFINITY), ("b", 2.0)]),
        ];
        let fixed = coerce_non_finite(&mut series);
        assert_eq!(fixed, 2);
        assert_eq!(series[0].value("a"), Some(0.0));
        assert_eq!(series[1].value("a"), Some(0.0));
        assert_eq!(series[1].value("b"), Some(2.0));
    }
}
