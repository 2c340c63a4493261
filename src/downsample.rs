//! Largest-Triangle-Three-Buckets downsampling
//!
//! Reduces an ordered series to a target point count while preserving its
//! visual shape: the first and last points are kept as anchors, the interior
//! is split into equal index-range buckets, and each bucket contributes the
//! point forming the largest triangle with the previously selected point and
//! the average of the next bucket. Deterministic and O(n).

use crate::error::{FeedError, Result};
use crate::types::{Point, Series};

/// Downsample `series` to `target` points using the values of `field` as
/// the Y axis.
///
/// `target < 3` is a caller error (the algorithm needs both anchors plus at
/// least one interior bucket). A series already at or under the target is
/// returned unchanged, including the empty series. Duplicate timestamps are
/// kept as distinct points.
pub fn lttb(series: &[Point], field: &str, target: usize) -> Result<Series> {
    if target < 3 {
        return Err(FeedError::Processing(format!(
            "downsample target must be >= 3, got {}",
            target
        )));
    }
    let n = series.len();
    if n <= target {
        return Ok(series.to_vec());
    }

    let xs: Vec<f64> = series.iter().enumerate().map(|(i, p)| p.x(i)).collect();
    let ys: Vec<f64> = series
        .iter()
        .map(|p| p.value(field).unwrap_or(0.0))
        .collect();

    // Interior points share target - 2 buckets of equal index width
    let bucket = (n - 2) as f64 / (target - 2) as f64;
    let mut sampled: Series = Vec::with_capacity(target);
    sampled.push(series[0].clone());

    let mut prev = 0usize;
    for i in 0..(target - 2) {
        let start = (i as f64 * bucket) as usize + 1;
        let end = (((i + 1) as f64) * bucket) as usize + 1;
        let end = end.min(n - 1);

        // Average of the next bucket; the final bucket's successor is the
        // last point itself
        let next_start = end;
        let next_end = ((((i + 2) as f64) * bucket) as usize + 1).min(n);
        let (avg_x, avg_y) = if next_start < next_end {
            let span = (next_end - next_start) as f64;
            let sum_x: f64 = xs[next_start..next_end].iter().sum();
            let sum_y: f64 = ys[next_start..next_end].iter().sum();
            (sum_x / span, sum_y / span)
        } else {
            (xs[n - 1], ys[n - 1])
        };

        let mut best = start;
        let mut best_area = -1.0f64;
        for k in start..end {
            // Twice the triangle area, via the cross product
            let area = ((xs[prev] - avg_x) * (ys[k] - ys[prev])
                - (xs[prev] - xs[k]) * (avg_y - ys[prev]))
                .abs();
            if area > best_area {
                best_area = area;
                best = k;
            }
        }

        sampled.push(series[best].clone());
        prev = best;
    }

    sampled.push(series[n - 1].clone());
    Ok(sampled)
}
