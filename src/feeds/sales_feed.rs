//! Sales feed
//!
//! Time series of sales totals per branch. Sales metrics are additive, so
//! bucket reductions stay on the `Sum` default.

use crate::cache::FeedHandle;
use crate::feeds::ChartQuery;
use crate::state::FeedContext;

pub struct SalesFeed;

impl SalesFeed {
    pub const ENDPOINT: &'static str = "api/v1/analytics/sales";

    pub fn fetch(ctx: &FeedContext, query: &ChartQuery) -> FeedHandle {
        let mut options = ctx.options().clone();
        options.process.aggregation = query.aggregation;
        options.process.key_field = "date".to_string();
        options.process.primary_field = "total_sales".to_string();
        options.process.required_fields = vec!["total_sales".to_string()];

        ctx.resolve_with(query.signature(Self::ENDPOINT), &options)
    }
}
