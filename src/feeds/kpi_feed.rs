//! KPI feed
//!
//! Headline indicators for the dashboard's stat cards. KPI values are
//! gauge-like, so local bucket reductions take the last value rather than
//! summing, and ratio metrics average.

use crate::aggregate::ReductionMode;
use crate::cache::FeedHandle;
use crate::feeds::ChartQuery;
use crate::state::FeedContext;
use crate::types::Point;

pub struct KpiFeed;

impl KpiFeed {
    pub const ENDPOINT: &'static str = "api/v1/analytics/kpis";

    pub fn fetch(ctx: &FeedContext, query: &ChartQuery) -> FeedHandle {
        let mut options = ctx.options().clone();
        options.process.aggregation = query.aggregation;
        options.process.key_field = "date".to_string();
        for metric in &query.metrics {
            options
                .process
                .reductions
                .insert(metric.clone(), Self::reduction_for(metric));
        }

        ctx.resolve_with(query.signature(Self::ENDPOINT), &options)
    }

    /// Ratio metrics average across a bucket; everything else is a gauge
    /// and keeps its last reading.
    pub fn reduction_for(metric: &str) -> ReductionMode {
        if metric.ends_with("_rate") || metric.starts_with("avg_") {
            ReductionMode::Average
        } else {
            ReductionMode::Last
        }
    }

    /// Pure transform: the most recent point, for stat-card rendering
    pub fn latest(series: &[Point]) -> Option<&Point> {
        series.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduction_modes_per_metric() {
        assert_eq!(KpiFeed::reduction_for("revenue"), ReductionMode::Last);
        assert_eq!(KpiFeed::reduction_for("stock_level"), ReductionMode::Last);
        assert_eq!(
            KpiFeed::reduction_for("conversion_rate"),
            ReductionMode::Average
        );
        assert_eq!(KpiFeed::reduction_for("avg_ticket"), ReductionMode::Average);
    }

    #[test]
    fn test_latest() {
        let series = vec![
            Point::at(100, &[("revenue", 10.0)]),
            Point::at(200, &[("revenue", 12.0)]),
        ];
        assert_eq!(KpiFeed::latest(&series).unwrap().value("revenue"), Some(12.0));
        assert!(KpiFeed::latest(&[]).is_none());
    }
}
