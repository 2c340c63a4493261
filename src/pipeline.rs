//! Processing pipeline
//!
//! Runs on every successful fetch: validates the raw series, then decides
//! between trusting server-side aggregation, downsampling locally, or
//! passing the data through untouched. Processing faults are trapped here
//! and surfaced as an empty series with an explanatory note, never as a
//! panic or propagated error.

use crate::aggregate::{self, ReductionMode};
use crate::downsample;
use crate::types::{AggregationMode, Series};
use crate::validate::{self, ValidatorMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Default point count above which raw series are downsampled
pub const DEFAULT_DOWNSAMPLE_THRESHOLD: usize = 10_000;

/// Per-query processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Aggregation the server was asked for; anything but `Raw` means the
    /// payload is already bucketed
    pub aggregation: AggregationMode,
    /// Series longer than this are reduced to exactly this many points
    pub downsample_threshold: usize,
    /// Field used as the Y axis when downsampling
    pub primary_field: String,
    /// Wire column holding the point key
    pub key_field: String,
    /// Fields every point must carry
    pub required_fields: Vec<String>,
    /// Per-field bucket reduction, for local aggregation
    pub reductions: BTreeMap<String, ReductionMode>,
    pub validator_mode: ValidatorMode,
    /// Re-bucket locally instead of trusting the server's aggregation, for
    /// transports that cannot aggregate server-side
    pub aggregate_locally: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            aggregation: AggregationMode::Raw,
            downsample_threshold: DEFAULT_DOWNSAMPLE_THRESHOLD,
            primary_field: "value".to_string(),
            key_field: "timestamp".to_string(),
            required_fields: Vec::new(),
            reductions: BTreeMap::new(),
            validator_mode: ValidatorMode::Coerce,
            aggregate_locally: false,
        }
    }
}

/// What happened to a series on its way through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub original_len: usize,
    pub processed_len: usize,
    pub downsampled: bool,
    pub aggregated: bool,
    pub aggregation: AggregationMode,
    /// Explanation attached when output was degraded
    pub note: Option<String>,
}

impl ProcessingMetadata {
    pub fn processed(&self) -> bool {
        self.downsampled || self.aggregated
    }
}

/// A processed series and its metadata; always produced together
#[derive(Debug, Clone)]
pub struct Processed {
    pub data: Series,
    pub meta: ProcessingMetadata,
}

/// Run the aggregate-or-downsample decision over a raw series.
pub fn process(raw: Series, config: &ProcessConfig) -> Processed {
    let original_len = raw.len();
    let mut note = None;

    let report = validate::validate(&raw, &config.required_fields, config.validator_mode);
    if !report.valid {
        warn!("series failed validation: {:?}", report.error);
        note = report.error;
    }

    let mut data = raw;
    if config.validator_mode == ValidatorMode::Coerce {
        let fixed = validate::coerce_non_finite(&mut data);
        if fixed > 0 {
            debug!(fixed, "coerced non-finite values to zero");
        }
    }

    let mut downsampled = false;
    let mut aggregated = false;

    if config.aggregation != AggregationMode::Raw {
        // Server-aggregated; never downsample bucketed data
        aggregated = true;
        if config.aggregate_locally {
            if let Some(granularity) = config.aggregation.granularity() {
                match aggregate::aggregate_by_time(&data, granularity, &config.reductions) {
                    Ok(bucketed) => data = bucketed,
                    Err(err) => {
                        warn!("local aggregation failed: {}", err);
                        note = Some(err.to_string());
                        data = Vec::new();
                    }
                }
            }
        }
    } else if data.len() > config.downsample_threshold {
        match downsample::lttb(&data, &config.primary_field, config.downsample_threshold) {
            Ok(reduced) => {
                data = reduced;
                downsampled = true;
            }
            Err(err) => {
                warn!("downsampling failed: {}", err);
                note = Some(err.to_string());
                data = Vec::new();
            }
        }
    }

    let meta = ProcessingMetadata {
        original_len,
        processed_len: data.len(),
        downsampled,
        aggregated,
        aggregation: config.aggregation,
        note,
    };
    Processed { data, meta }
}
