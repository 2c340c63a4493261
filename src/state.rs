//! Feed context
//!
//! The composition root shared by every chart consumer: one transport, one
//! query cache, one set of default options. Constructed explicitly at
//! application start and passed down; teardown is just dropping it.

use crate::cache::{CacheOptions, CacheStats, FeedHandle, QueryCache};
use crate::signature::QuerySignature;
use crate::transport::Transport;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub struct FeedContext {
    transport: Arc<dyn Transport>,
    cache: QueryCache,
    options: CacheOptions,
}

impl FeedContext {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_options(transport, CacheOptions::default())
    }

    pub fn with_options(transport: Arc<dyn Transport>, options: CacheOptions) -> Self {
        info!(
            stale_after_secs = options.stale_after.as_secs(),
            evict_after_secs = options.evict_after.as_secs(),
            "feed context initialized"
        );
        Self {
            transport,
            cache: QueryCache::new(),
            options,
        }
    }

    /// Resolve with the context's default options
    pub fn resolve(&self, signature: QuerySignature) -> FeedHandle {
        self.cache.resolve(signature, &self.transport, &self.options)
    }

    /// Resolve with per-feed options
    pub fn resolve_with(&self, signature: QuerySignature, options: &CacheOptions) -> FeedHandle {
        self.cache.resolve(signature, &self.transport, options)
    }

    /// Warm the cache for a query the UI is about to need
    pub fn prefetch(&self, signature: QuerySignature) {
        self.cache.prefetch(signature, &self.transport, &self.options);
    }

    /// Evict entries matching an endpoint and parameter prefix
    pub fn invalidate(&self, endpoint: &str, params_prefix: &BTreeMap<String, String>) -> usize {
        self.cache.invalidate(endpoint, params_prefix)
    }

    /// Drop all cached entries
    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
