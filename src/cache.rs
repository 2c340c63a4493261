//! Query cache and fetch orchestration
//!
//! Owns the per-signature lifecycle: `Idle -> Fetching -> {Fresh | Failed}`,
//! with `Fresh` turning stale after a configured window. Concurrent resolves
//! for one signature share a single in-flight fetch, and a stale entry keeps
//! serving its previous value while a revalidation runs in the background.
//! The slot is the only shared mutable state and only this module's
//! transition logic touches it.

use crate::error::{ErrorResponse, FeedError};
use crate::pipeline::{self, ProcessConfig, ProcessingMetadata};
use crate::signature::QuerySignature;
use crate::transport::{PayloadExtras, Transport};
use crate::types::Series;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle phase of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPhase {
    Idle,
    Fetching,
    Fresh,
    Failed,
}

/// Observable state of a feed at one moment
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub phase: FetchPhase,
    pub data: Arc<Series>,
    pub meta: Option<ProcessingMetadata>,
    pub extras: PayloadExtras,
    pub error: Option<ErrorResponse>,
}

impl FeedSnapshot {
    fn idle() -> Self {
        Self {
            phase: FetchPhase::Idle,
            data: Arc::new(Vec::new()),
            meta: None,
            extras: PayloadExtras::default(),
            error: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.phase == FetchPhase::Fetching
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_processed(&self) -> bool {
        self.meta.as_ref().is_some_and(|m| m.processed())
    }

    pub fn is_downsampled(&self) -> bool {
        self.meta.as_ref().is_some_and(|m| m.downsampled)
    }

    pub fn is_aggregated(&self) -> bool {
        self.meta.as_ref().is_some_and(|m| m.aggregated)
    }
}

/// Reactive view onto a cache entry.
///
/// Dropping a handle never cancels the underlying fetch; the result still
/// lands in the cache for other observers of the same signature.
pub struct FeedHandle {
    rx: watch::Receiver<FeedSnapshot>,
}

impl FeedHandle {
    pub fn snapshot(&self) -> FeedSnapshot {
        self.rx.borrow().clone()
    }

    pub fn data(&self) -> Arc<Series> {
        self.rx.borrow().data.clone()
    }

    pub fn meta(&self) -> Option<ProcessingMetadata> {
        self.rx.borrow().meta.clone()
    }

    pub fn error(&self) -> Option<ErrorResponse> {
        self.rx.borrow().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.rx.borrow().is_loading()
    }

    /// Wait for the next state transition
    pub async fn changed(&mut self) -> FeedSnapshot {
        let _ = self.rx.changed().await;
        self.rx.borrow_and_update().clone()
    }

    /// Wait until the entry is no longer fetching and return its state
    pub async fn ready(&mut self) -> FeedSnapshot {
        loop {
            let snapshot = self.rx.borrow_and_update().clone();
            if !snapshot.is_loading() {
                return snapshot;
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }
}

/// Per-resolve cache behavior
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// `false` suspends fetching entirely: the entry stays idle, no network
    pub enabled: bool,
    /// Window after a successful fetch during which the entry is fresh
    pub stale_after: Duration,
    /// Entries untouched for this long are dropped by the sweep
    pub evict_after: Duration,
    /// Total fetch attempts for retryable failures
    pub max_attempts: u32,
    /// Base backoff between attempts, scaled linearly
    pub retry_delay: Duration,
    pub process: ProcessConfig,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_after: Duration::from_secs(60),
            evict_after: Duration::from_secs(600),
            max_attempts: 3,
            retry_delay: Duration::from_millis(250),
            process: ProcessConfig::default(),
        }
    }
}

/// Cache observability counters
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub evictions: u64,
}

struct SlotMeta {
    fetched_at: Option<Instant>,
    last_access: Instant,
    evict_after: Duration,
    in_flight: bool,
}

struct CacheSlot {
    meta: Mutex<SlotMeta>,
    tx: watch::Sender<FeedSnapshot>,
}

impl CacheSlot {
    fn new(evict_after: Duration) -> Self {
        let (tx, _rx) = watch::channel(FeedSnapshot::idle());
        Self {
            meta: Mutex::new(SlotMeta {
                fetched_at: None,
                last_access: Instant::now(),
                evict_after,
                in_flight: false,
            }),
            tx,
        }
    }
}

/// The query cache: explicitly owned, constructed at application start and
/// passed to whoever resolves feeds. No ambient singletons.
#[derive(Default)]
pub struct QueryCache {
    entries: DashMap<QuerySignature, Arc<CacheSlot>>,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    evictions: AtomicU64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up or fetch the entry for `signature`.
    ///
    /// At most one network fetch is in flight per signature; every caller
    /// observes the same eventual result through its handle.
    pub fn resolve(
        &self,
        signature: QuerySignature,
        transport: &Arc<dyn Transport>,
        options: &CacheOptions,
    ) -> FeedHandle {
        self.sweep();

        let slot = self
            .entries
            .entry(signature.clone())
            .or_insert_with(|| Arc::new(CacheSlot::new(options.evict_after)))
            .clone();

        let mut meta = slot.meta.lock();
        meta.last_access = Instant::now();
        meta.evict_after = options.evict_after;

        if !options.enabled {
            debug!(%signature, "feed disabled; entry stays idle");
            return FeedHandle {
                rx: slot.tx.subscribe(),
            };
        }

        let phase = slot.tx.borrow().phase;
        let fresh = phase == FetchPhase::Fresh
            && meta
                .fetched_at
                .is_some_and(|at| at.elapsed() < options.stale_after);

        if fresh {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return FeedHandle {
                rx: slot.tx.subscribe(),
            };
        }

        if meta.in_flight {
            // Another resolve already started this fetch; join it
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            return FeedHandle {
                rx: slot.tx.subscribe(),
            };
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        meta.in_flight = true;
        drop(meta);

        // Previous data stays in the snapshot while revalidating
        slot.tx.send_modify(|snapshot| {
            snapshot.phase = FetchPhase::Fetching;
        });

        let handle = FeedHandle {
            rx: slot.tx.subscribe(),
        };
        let transport = Arc::clone(transport);
        let options = options.clone();
        tokio::spawn(async move {
            run_fetch(signature, slot, transport, options).await;
        });
        handle
    }

    /// Warm the cache for a signature without observing the result
    pub fn prefetch(
        &self,
        signature: QuerySignature,
        transport: &Arc<dyn Transport>,
        options: &CacheOptions,
    ) {
        let _ = self.resolve(signature, transport, options);
    }

    /// Evict every entry matching the endpoint and parameter prefix.
    /// Returns how many were removed.
    pub fn invalidate(&self, endpoint: &str, params_prefix: &BTreeMap<String, String>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|sig, _| !sig.matches_prefix(endpoint, params_prefix));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            info!(endpoint, removed, "invalidated cache entries");
        }
        removed
    }

    /// Drop every entry in this cache
    pub fn clear(&self) {
        let removed = self.entries.len();
        self.entries.clear();
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        info!(removed, "cleared query cache");
    }

    /// Drop entries idle past their eviction window. Runs opportunistically
    /// on every resolve; callable directly for deterministic cleanup.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, slot| {
            let meta = slot.meta.lock();
            meta.in_flight || meta.last_access.elapsed() < meta.evict_after
        });
        let removed = before - self.entries.len();
        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Fetch with retry, process, and publish the outcome to the slot.
async fn run_fetch(
    signature: QuerySignature,
    slot: Arc<CacheSlot>,
    transport: Arc<dyn Transport>,
    options: CacheOptions,
) {
    let request_id = Uuid::new_v4();
    debug!(%request_id, %signature, "fetch started");

    let mut attempt = 0u32;
    let outcome = loop {
        attempt += 1;
        match transport.get(&signature.endpoint, &signature.params).await {
            Ok(payload) => break Ok(payload),
            Err(err) if err.is_retryable() && attempt < options.max_attempts => {
                warn!(%request_id, attempt, "transient fetch failure: {}; retrying", err);
                tokio::time::sleep(options.retry_delay * attempt).await;
            }
            Err(err) => break Err(err),
        }
    };

    match outcome {
        Ok(payload) => {
            let extras = payload.extras.clone();
            let series = payload.series(&options.process.key_field);
            let processed = pipeline::process(series, &options.process);
            info!(
                %request_id,
                %signature,
                original = processed.meta.original_len,
                processed = processed.meta.processed_len,
                "fetch complete"
            );

            let mut meta = slot.meta.lock();
            meta.in_flight = false;
            meta.fetched_at = Some(Instant::now());
            slot.tx.send_modify(|snapshot| {
                snapshot.phase = FetchPhase::Fresh;
                snapshot.data = Arc::new(processed.data);
                snapshot.meta = Some(processed.meta);
                snapshot.extras = extras;
                snapshot.error = None;
            });
        }
        Err(FeedError::Validation(message)) => {
            // Shape mismatch degrades to an empty fresh entry instead of a
            // terminal failure; the chart shows "no data", not an error
            warn!(%request_id, %signature, "payload failed validation: {}", message);
            let degraded = ProcessingMetadata {
                original_len: 0,
                processed_len: 0,
                downsampled: false,
                aggregated: false,
                aggregation: options.process.aggregation,
                note: Some(message),
            };

            let mut meta = slot.meta.lock();
            meta.in_flight = false;
            meta.fetched_at = Some(Instant::now());
            slot.tx.send_modify(|snapshot| {
                snapshot.phase = FetchPhase::Fresh;
                snapshot.data = Arc::new(Vec::new());
                snapshot.meta = Some(degraded.clone());
                snapshot.extras = PayloadExtras::default();
                snapshot.error = None;
            });
        }
        Err(err) => {
            warn!(%request_id, %signature, attempts = attempt, "fetch failed: {}", err);
            let response = ErrorResponse::from(&err);

            let mut meta = slot.meta.lock();
            meta.in_flight = false;
            // Stale data is not evicted on refresh failure; it stays
            // servable alongside the error
            slot.tx.send_modify(|snapshot| {
                snapshot.phase = FetchPhase::Failed;
                snapshot.error = Some(response);
            });
        }
    }
}
