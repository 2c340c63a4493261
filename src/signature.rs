//! Query signatures
//!
//! A signature is the normalized identity of a query: endpoint, parameter
//! map and aggregation mode. Two fetches with equal signatures are the same
//! cached resource. Parameter equality is structural and key-order
//! independent (BTreeMap).

use crate::types::AggregationMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuerySignature {
    pub endpoint: String,
    pub params: BTreeMap<String, String>,
    pub aggregation: AggregationMode,
}

impl QuerySignature {
    /// Build a normalized signature: parameter values are trimmed and
    /// empty-valued parameters are dropped.
    pub fn new<I, K, V>(endpoint: impl Into<String>, params: I, aggregation: AggregationMode) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let params = params
            .into_iter()
            .filter_map(|(k, v)| {
                let value = v.into().trim().to_string();
                if value.is_empty() {
                    None
                } else {
                    Some((k.into(), value))
                }
            })
            .collect();

        Self {
            endpoint: endpoint.into(),
            params,
            aggregation,
        }
    }

    /// Prefix match used by cache invalidation: same endpoint, and every
    /// given parameter present with the same value. An empty prefix matches
    /// every signature for the endpoint.
    pub fn matches_prefix(&self, endpoint: &str, params: &BTreeMap<String, String>) -> bool {
        self.endpoint == endpoint
            && params
                .iter()
                .all(|(k, v)| self.params.get(k).is_some_and(|own| own == v))
    }
}

impl fmt::Display for QuerySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.endpoint, self.aggregation)?;
        for (i, (k, v)) in self.params.iter().enumerate() {
            write!(f, "{}{}={}", if i == 0 { "?" } else { "&" }, k, v)?;
        }
        Ok(())
    }
}
