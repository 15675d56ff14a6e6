use super::label::{LabelValue, Labels};
use crate::error::DriverLogError;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Entry keys whose values are always computed by the logger.
///
/// `runid` is the legacy spelling; it is never emitted but still cannot be set by a label.
pub const RESERVED_KEYS: [&str; 6] = ["run_id", "runid", "driver", "timestamp", "message", "pipeline"];

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// A single structured log entry, built fresh for every emit.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub run_id: String,
    pub driver: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub pipeline: Option<String>,
    labels: Labels,
}

impl LogEntry {
    /// Creates an entry stamped with the current UTC time.
    pub fn new(
        run_id: impl Into<String>,
        driver: impl Into<String>,
        message: impl Into<String>,
        pipeline: Option<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            driver: driver.into(),
            timestamp: Utc::now(),
            message: message.into(),
            pipeline,
            labels: Labels::new(),
        }
    }

    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Merges labels after the reserved fields. Later labels replace earlier ones with the
    /// same key; labels named after a reserved key are dropped and their keys returned.
    pub fn merge_labels<I>(&mut self, labels: I) -> Vec<String>
    where
        I: IntoIterator<Item = (String, LabelValue)>,
    {
        let mut dropped = Vec::new();
        for (key, value) in labels {
            if is_reserved(&key) {
                dropped.push(key);
            } else {
                self.labels.insert(key, value);
            }
        }
        dropped
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// ISO-8601 timestamp with an explicit `+00:00` offset.
    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, false)
    }

    pub fn to_json(&self) -> Result<Map<String, Value>, DriverLogError> {
        let mut map = Map::with_capacity(5 + self.labels.len());
        map.insert("run_id".into(), Value::String(self.run_id.clone()));
        map.insert("driver".into(), Value::String(self.driver.clone()));
        map.insert("timestamp".into(), Value::String(self.timestamp_string()));
        map.insert("message".into(), Value::String(self.message.clone()));
        if let Some(pipeline) = &self.pipeline {
            map.insert("pipeline".into(), Value::String(pipeline.clone()));
        }
        for (key, value) in self.labels.iter() {
            if is_reserved(key) {
                continue;
            }
            map.insert(key.to_string(), value.to_json(key)?);
        }
        Ok(map)
    }

    /// Compact JSON payload as published to both channels.
    pub fn encode(&self) -> Result<Bytes, DriverLogError> {
        let map = self.to_json()?;
        Ok(Bytes::from(serde_json::to_vec(&map)?))
    }
}
