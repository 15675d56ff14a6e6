use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Consumer-side view of a published log payload.
///
/// Reserved fields are typed; every other key lands in `labels`. The legacy `runid`
/// spelling is accepted for entries written by older drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(alias = "runid")]
    pub run_id: String,
    pub driver: String,
    pub timestamp: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    #[serde(flatten)]
    pub labels: Map<String, Value>,
}

impl LogRecord {
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
