//! Specialized feeds
//!
//! Thin per-domain parameterizations of the query cache: each feed fixes an
//! endpoint, tunes the processing config for its payload shape, and may
//! supply a pure series transform composed after the core pipeline.
//!
//! ```text
//! Chart widget --> Feed --> FeedContext --> QueryCache --> Transport
//!                                   |
//!                                   +--> Pipeline (validate, aggregate/downsample)
//! ```

pub mod dashboard_feed;
pub mod inventory_feed;
pub mod kpi_feed;
pub mod sales_feed;

pub use dashboard_feed::DashboardFeed;
pub use inventory_feed::InventoryFeed;
pub use kpi_feed::KpiFeed;
pub use sales_feed::SalesFeed;

use crate::signature::QuerySignature;
use crate::types::{AggregationMode, Point, Series};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Query parameters shared by all chart feeds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartQuery {
    pub branch_id: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub aggregation: AggregationMode,
    pub group_by: Option<String>,
    pub metrics: Vec<String>,
}

impl ChartQuery {
    pub fn params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        if let Some(branch_id) = self.branch_id {
            params.insert("branch_id".to_string(), branch_id.to_string());
        }
        if let Some(start) = &self.start_date {
            params.insert("start_date".to_string(), start.clone());
        }
        if let Some(end) = &self.end_date {
            params.insert("end_date".to_string(), end.clone());
        }
        if self.aggregation != AggregationMode::Raw {
            params.insert("aggregation".to_string(), self.aggregation.to_string());
        }
        if let Some(group_by) = &self.group_by {
            params.insert("group_by".to_string(), group_by.clone());
        }
        if !self.metrics.is_empty() {
            params.insert("metrics".to_string(), self.metrics.join(","));
        }
        params
    }

    pub fn signature(&self, endpoint: &str) -> QuerySignature {
        QuerySignature::new(endpoint, self.params(), self.aggregation)
    }
}

/// Keep only the named metric columns; an empty selection keeps everything.
/// Pure transform for composing after the pipeline.
pub fn select_metrics(series: &[Point], metrics: &[String]) -> Series {
    if metrics.is_empty() {
        return series.to_vec();
    }
    series
        .iter()
        .map(|point| {
            let fields = point
                .fields
                .iter()
                .filter(|(name, _)| metrics.iter().any(|m| m == *name))
                .map(|(name, value)| (name.clone(), *value))
                .collect();
            Point::new(point.key.clone(), fields)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_skip_unset_fields() {
        let query = ChartQuery {
            branch_id: Some(3),
            metrics: vec!["revenue".to_string(), "orders".to_string()],
            ..Default::default()
        };
        let params = query.params();

        assert_eq!(params.get("branch_id").map(String::as_str), Some("3"));
        assert_eq!(
            params.get("metrics").map(String::as_str),
            Some("revenue,orders")
        );
        assert!(!params.contains_key("start_date"));
        assert!(!params.contains_key("aggregation"));
    }

    #[test]
    fn test_signature_carries_aggregation() {
        let query = ChartQuery {
            aggregation: AggregationMode::Week,
            ..Default::default()
        };
        let signature = query.signature("api/v1/analytics/sales");
        assert_eq!(signature.aggregation, AggregationMode::Week);
        assert_eq!(
            signature.params.get("aggregation").map(String::as_str),
            Some("week")
        );
    }

    #[test]
    fn test_select_metrics() {
        let series = vec![Point::at(100, &[("revenue", 10.0), ("orders", 3.0), ("returns", 1.0)])];
        let selected = select_metrics(&series, &["revenue".to_string()]);

        assert_eq!(selected[0].value("revenue"), Some(10.0));
        assert_eq!(selected[0].value("orders"), None);

        let all = select_metrics(&series, &[]);
        assert_eq!(all[0].fields.len(), 3);
    }
}
