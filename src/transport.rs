//! HTTP transport seam
//!
//! The orchestrator fetches through the `Transport` trait so tests and
//! alternative backends can swap the wire layer out. `HttpTransport` is the
//! reqwest-backed implementation used in production.

use crate::error::{FeedError, Result};
use crate::types::{Point, Series};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Envelope sections some endpoints return alongside the row data.
/// Passed through to consumers untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadExtras {
    pub summary: Option<Value>,
    pub kpis: Option<Value>,
    pub charts: Option<Value>,
}

/// A fetched payload: row objects plus any envelope extras
#[derive(Debug, Clone, Default)]
pub struct Payload {
    pub rows: Vec<serde_json::Map<String, Value>>,
    pub extras: PayloadExtras,
}

impl Payload {
    /// Accept either a bare JSON array of rows or an envelope with the rows
    /// under a `data` key.
    pub fn from_value(value: Value) -> Result<Payload> {
        match value {
            Value::Array(items) => Ok(Payload {
                rows: Self::collect_rows(items),
                extras: PayloadExtras::default(),
            }),
            Value::Object(mut map) => {
                let data = map.remove("data").ok_or_else(|| {
                    FeedError::Validation("payload has no 'data' array".to_string())
                })?;
                let Value::Array(items) = data else {
                    return Err(FeedError::Validation(
                        "payload 'data' is not an array".to_string(),
                    ));
                };
                Ok(Payload {
                    rows: Self::collect_rows(items),
                    extras: PayloadExtras {
                        summary: map.remove("summary"),
                        kpis: map.remove("kpis"),
                        charts: map.remove("charts"),
                    },
                })
            }
            _ => Err(FeedError::Validation(
                "payload is neither an array nor an object".to_string(),
            )),
        }
    }

    fn collect_rows(items: Vec<Value>) -> Vec<serde_json::Map<String, Value>> {
        items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect()
    }

    /// Convert rows to a series, keyed by `key_field`. Rows without a usable
    /// key are dropped with a warning.
    pub fn series(&self, key_field: &str) -> Series {
        let mut dropped = 0usize;
        let series: Series = self
            .rows
            .iter()
            .filter_map(|row| {
                let point = Point::from_row(row, key_field);
                if point.is_none() {
                    dropped += 1;
                }
                point
            })
            .collect();
        if dropped > 0 {
            warn!(dropped, key_field, "dropped rows without a key field");
        }
        series
    }
}

/// HTTP fetch capability consumed by the orchestrator
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str, params: &BTreeMap<String, String>) -> Result<Payload>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut transport = Self::new(base_url);
        transport.api_key = Some(api_key.into());
        transport
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, params: &BTreeMap<String, String>) -> Result<Payload> {
        let mut request = self.client.get(self.url(path)).query(params);
        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_client_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(FeedError::ClientRequest {
                status: status.as_u16(),
                message,
            });
        }
        if !status.is_success() {
            return Err(FeedError::Transport(format!(
                "server returned {} for {}",
                status, path
            )));
        }

        let value: Value = response.json().await?;
        Payload::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_array_payload() {
        let payload = Payload::from_value(json!([
            {"date": "2024-03-01", "total_sales": 100.0},
            {"date": "2024-03-02", "total_sales": 110.0},
        ]))
        .unwrap();

        assert_eq!(payload.rows.len(), 2);
        let series = payload.series("date");
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].value("total_sales"), Some(110.0));
    }

    #[test]
    fn test_envelope_payload_keeps_extras() {
        let payload = Payload::from_value(json!({
            "data": [{"timestamp": 1_704_067_200, "value": 5.0}],
            "summary": {"total": 5.0},
            "kpis": [{"name": "revenue"}],
        }))
        .unwrap();

        assert_eq!(payload.rows.len(), 1);
        assert_eq!(payload.extras.summary, Some(json!({"total": 5.0})));
        assert!(payload.extras.kpis.is_some());
        assert!(payload.extras.charts.is_none());
    }

    #[test]
    fn test_malformed_payload_is_a_validation_error() {
        assert!(matches!(
            Payload::from_value(json!({"rows": []})),
            Err(FeedError::Validation(_))
        ));
        assert!(matches!(
            Payload::from_value(json!("nope")),
            Err(FeedError::Validation(_))
        ));
    }

    #[test]
    fn test_non_object_rows_are_skipped() {
        let payload = Payload::from_value(json!([{"date": "2024-03-01"}, 42, "x"])).unwrap();
        assert_eq!(payload.rows.len(), 1);
    }

    #[test]
    fn test_rows_without_key_are_dropped() {
        let payload = Payload::from_value(json!([
            {"date": "2024-03-01", "v": 1.0},
            {"v": 2.0},
        ]))
        .unwrap();
        assert_eq!(payload.series("date").len(), 1);
    }

    #[test]
    fn test_url_joining() {
        let transport = HttpTransport::new("http://localhost:8000/");
        assert_eq!(
            transport.url("/api/v1/analytics/sales"),
            "http://localhost:8000/api/v1/analytics/sales"
        );
    }
}
