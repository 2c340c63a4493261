//! Inventory feed
//!
//! Stock levels per branch, optionally grouped by a categorical column
//! (`group_by=sku` yields category-keyed points). Stock is a gauge, so
//! bucket reductions take the last reading.

use crate::aggregate::ReductionMode;
use crate::cache::FeedHandle;
use crate::feeds::ChartQuery;
use crate::state::FeedContext;
use crate::types::{Point, Series};

pub struct InventoryFeed;

impl InventoryFeed {
    pub const ENDPOINT: &'static str = "api/v1/analytics/inventory";

    pub fn fetch(ctx: &FeedContext, query: &ChartQuery) -> FeedHandle {
        let mut options = ctx.options().clone();
        options.process.aggregation = query.aggregation;
        options.process.key_field = query
            .group_by
            .clone()
            .unwrap_or_else(|| "date".to_string());
        options.process.primary_field = "stock_level".to_string();
        options
            .process
            .reductions
            .insert("stock_level".to_string(), ReductionMode::Last);

        ctx.resolve_with(query.signature(Self::ENDPOINT), &options)
    }

    /// Pure transform: points whose stock is at or below the reorder
    /// threshold
    pub fn low_stock(series: &[Point], threshold: f64) -> Series {
        series
            .iter()
            .filter(|p| p.value("stock_level").is_some_and(|v| v <= threshold))
            .cloned()
            .collect()
    }
}
