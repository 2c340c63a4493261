//! chartfeed - chart data acquisition pipeline
//!
//! Client-side data layer for analytics dashboards: fetches time-series
//! payloads over HTTP, caches them per query signature with single-flight
//! de-duplication and stale-while-revalidate semantics, and reduces large
//! raw series for display, either by trusting server-side aggregation or by
//! downsampling locally with Largest-Triangle-Three-Buckets.
//!
//! ```no_run
//! use chartfeed::feeds::{ChartQuery, SalesFeed};
//! use chartfeed::state::FeedContext;
//! use chartfeed::transport::HttpTransport;
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let ctx = FeedContext::new(Arc::new(HttpTransport::new("http://localhost:8000")));
//! let query = ChartQuery { branch_id: Some(1), ..Default::default() };
//! let mut handle = SalesFeed::fetch(&ctx, &query);
//! let snapshot = handle.ready().await;
//! println!("{} points (downsampled: {})", snapshot.data.len(), snapshot.is_downsampled());
//! # }
//! ```

pub mod aggregate;
pub mod cache;
pub mod downsample;
pub mod error;
pub mod feeds;
pub mod pipeline;
pub mod signature;
pub mod state;
pub mod transport;
pub mod types;
pub mod validate;

pub use cache::{CacheOptions, FeedHandle, FeedSnapshot, FetchPhase, QueryCache};
pub use error::{ErrorResponse, FeedError, Result};
pub use pipeline::{ProcessConfig, ProcessingMetadata};
pub use signature::QuerySignature;
pub use state::FeedContext;
pub use transport::{HttpTransport, Payload, Transport};
pub use types::{AggregationMode, Point, PointKey, Series};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging for applications embedding the pipeline
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chartfeed=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
