//! Wire types shared by the clients and the proxy service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One point of an external time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesObservation {
    /// Provider date string; the leading component is the year.
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesResponse {
    #[serde(default)]
    pub observations: Vec<SeriesObservation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet: Option<Value>,
}

impl SeriesResponse {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Body of a proxy call: which upstream endpoint, with which query params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRequest {
    pub endpoint: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl ProxyRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}
