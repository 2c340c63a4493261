//! Dashboard feed
//!
//! The combined overview endpoint: a primary series plus envelope extras
//! (`summary`, `kpis`, `charts`) that the rendering layer consumes
//! untouched.

use crate::cache::{FeedHandle, FeedSnapshot};
use crate::feeds::ChartQuery;
use crate::state::FeedContext;
use serde_json::Value;

pub struct DashboardFeed;

impl DashboardFeed {
    pub const ENDPOINT: &'static str = "api/v1/analytics/dashboard";

    pub fn fetch(ctx: &FeedContext, query: &ChartQuery) -> FeedHandle {
        let mut options = ctx.options().clone();
        options.process.aggregation = query.aggregation;
        options.process.key_field = "date".to_string();

        ctx.resolve_with(query.signature(Self::ENDPOINT), &options)
    }

    pub fn summary(snapshot: &FeedSnapshot) -> Option<&Value> {
        snapshot.extras.summary.as_ref()
    }

    pub fn kpis(snapshot: &FeedSnapshot) -> Option<&Value> {
        snapshot.extras.kpis.as_ref()
    }

    pub fn charts(snapshot: &FeedSnapshot) -> Option<&Value> {
        snapshot.extras.charts.as_ref()
    }
}
