//! The dual-publish driver logger.
//!
//! Every emit builds a fresh entry, encodes it once and publishes the same payload twice:
//! first to the durable JetStream subject, then to the live core-NATS subject. Each
//! attempt has its own failure boundary and nothing is ever returned to the caller.

mod lines;
pub mod subject;

use crate::domain::{LabelValue, Labels, LogEntry, is_reserved};
use crate::error::DriverLogError;
use crate::port::{LogConnection, PublishChannel};
use bytes::Bytes;
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

pub use subject::{durable_subject, is_subject_token, live_subject};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Durable,
    Live,
}

impl Channel {
    fn as_str(self) -> &'static str {
        match self {
            Channel::Durable => "durable",
            Channel::Live => "live",
        }
    }
}

/// Structured logger for one driver run.
///
/// Identity and channels are fixed at construction. Cloning is cheap and clones share
/// the same channels, so a logger can be handed to spawned tasks freely.
#[derive(Clone)]
pub struct DriverLogger {
    run_id: Arc<str>,
    driver: Arc<str>,
    default_labels: Arc<Labels>,
    durable: Option<Arc<dyn PublishChannel>>,
    live: Option<Arc<dyn PublishChannel>>,
    durable_subject: Arc<str>,
    live_subject: Arc<str>,
}

impl DriverLogger {
    /// Creates a logger publishing through `connection`.
    ///
    /// With no connection, or when a channel cannot be obtained from it, the affected
    /// channel is skipped on every emit.
    pub fn new(
        run_id: impl Into<String>,
        driver_name: impl Into<String>,
        connection: Option<&dyn LogConnection>,
    ) -> Self {
        let run_id: String = run_id.into();
        let driver: String = driver_name.into();

        let (durable, live) = match connection {
            Some(connection) => (
                acquire(Channel::Durable, connection.durable_channel()),
                acquire(Channel::Live, connection.live_channel()),
            ),
            None => (None, None),
        };

        Self {
            durable_subject: durable_subject(&run_id).into(),
            live_subject: live_subject(&run_id, &driver).into(),
            run_id: run_id.into(),
            driver: driver.into(),
            default_labels: Arc::new(Labels::new()),
            durable,
            live,
        }
    }

    /// Adapter for the legacy `(driver, labels, connection)` construction.
    ///
    /// The run id is taken from the `run_id` label, or the older `runid` spelling; the
    /// remaining labels become default labels. A fresh UUID is used when neither is set.
    pub fn from_legacy_labels(
        driver_name: impl Into<String>,
        mut labels: Labels,
        connection: Option<&dyn LogConnection>,
    ) -> Self {
        let modern = labels.remove("run_id");
        let legacy = labels.remove("runid");
        let run_id = modern
            .as_ref()
            .and_then(run_id_from_label)
            .or_else(|| legacy.as_ref().and_then(run_id_from_label))
            .unwrap_or_else(|| {
                let generated = uuid::Uuid::new_v4().to_string();
                warn!(run_id = %generated, "Legacy labels carry no run_id, generated one");
                generated
            });

        Self::new(run_id, driver_name, connection).with_default_labels(labels)
    }

    /// Labels attached to every entry, after the reserved fields and before the labels
    /// of the individual emit call. Reserved keys are discarded here.
    #[must_use]
    pub fn with_default_labels(mut self, labels: Labels) -> Self {
        let mut kept = Labels::new();
        for (key, value) in labels {
            if is_reserved(&key) {
                debug!(key = %key, "Ignoring default label that shadows a reserved field");
            } else {
                kept.insert(key, value);
            }
        }
        self.default_labels = Arc::new(kept);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn driver_name(&self) -> &str {
        &self.driver
    }

    pub fn durable_subject(&self) -> &str {
        &self.durable_subject
    }

    pub fn live_subject(&self) -> &str {
        &self.live_subject
    }

    pub fn default_labels(&self) -> &Labels {
        &self.default_labels
    }

    pub fn has_durable_channel(&self) -> bool {
        self.durable.is_some()
    }

    pub fn has_live_channel(&self) -> bool {
        self.live.is_some()
    }

    /// Emits one structured entry to both channels, best effort.
    ///
    /// Never fails: encoding problems drop the entry and publish failures are only
    /// recorded as DEBUG diagnostics.
    pub async fn emit(&self, message: impl Into<String>, pipeline: Option<&str>, labels: Labels) {
        let Some(payload) = self.encode(message.into(), pipeline, labels) else {
            return;
        };

        self.attempt(Channel::Durable, payload.clone()).await;
        self.attempt(Channel::Live, payload).await;
    }

    /// Shorthand for [`emit`](Self::emit) without pipeline or labels.
    pub async fn emit_message(&self, message: impl Into<String>) {
        self.emit(message, None, Labels::new()).await;
    }

    fn encode(&self, message: String, pipeline: Option<&str>, labels: Labels) -> Option<Bytes> {
        let mut entry = LogEntry::new(
            &*self.run_id,
            &*self.driver,
            message,
            pipeline.map(String::from),
        );
        entry.merge_labels(self.default_labels.iter().map(|(k, v)| (k.to_string(), v.clone())));
        let dropped = entry.merge_labels(labels);
        if !dropped.is_empty() {
            debug!(run_id = %self.run_id, keys = ?dropped, "Dropped labels shadowing reserved fields");
        }

        match entry.encode() {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!(run_id = %self.run_id, error = %e, "Log entry could not be encoded, dropping it");
                None
            }
        }
    }

    async fn attempt(&self, channel: Channel, payload: Bytes) {
        let (handle, subject) = match channel {
            Channel::Durable => (self.durable.as_ref(), &self.durable_subject),
            Channel::Live => (self.live.as_ref(), &self.live_subject),
        };
        let Some(handle) = handle else {
            return;
        };

        // The call happens inside the guarded future so a panic while building the
        // publish future is caught as well.
        let outcome = AssertUnwindSafe(async { handle.publish(subject.to_string(), payload).await })
            .catch_unwind()
            .await;

        let error = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(_) => DriverLogError::PublishPanicked {
                subject: subject.to_string(),
            },
        };
        match channel {
            Channel::Durable => {
                debug!(run_id = %self.run_id, subject = %subject, error = %error, "Durable log publish failed");
            }
            Channel::Live => {
                debug!(run_id = %self.run_id, subject = %subject, error = %error, "Live log publish failed");
            }
        }
    }
}

impl fmt::Debug for DriverLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverLogger")
            .field("run_id", &self.run_id)
            .field("driver", &self.driver)
            .field("default_labels", &self.default_labels)
            .field("durable", &self.durable.is_some())
            .field("live", &self.live.is_some())
            .finish()
    }
}

fn acquire(
    channel: Channel,
    result: Result<Arc<dyn PublishChannel>, DriverLogError>,
) -> Option<Arc<dyn PublishChannel>> {
    match result {
        Ok(handle) => Some(handle),
        Err(e) => {
            debug!(channel = channel.as_str(), error = %e, "Log channel unavailable, running degraded");
            None
        }
    }
}

fn run_id_from_label(value: &LabelValue) -> Option<String> {
    match value {
        LabelValue::String(s) if !s.trim().is_empty() => Some(s.clone()),
        LabelValue::Int(i) => Some(i.to_string()),
        LabelValue::UInt(u) => Some(u.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OpaqueLabel;
    use crate::labels;
    use crate::test_support::{Behavior, ChannelKind, RecordingConnection};
    use serde_json::Value;
    use tracing_test::traced_test;

    struct Unrepresentable;

    impl OpaqueLabel for Unrepresentable {
        fn encode(&self) -> Result<Value, serde_json::Error> {
            Err(serde::ser::Error::custom("no encoding"))
        }

        fn render(&self) -> Result<String, fmt::Error> {
            Err(fmt::Error)
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_durable_failure_is_logged_and_live_still_attempted() {
        let connection = RecordingConnection::new().with_durable(Behavior::Fail);
        let logger = DriverLogger::new("r1", "ingest", Some(&connection));

        logger.emit_message("hello").await;

        assert!(logs_contain("Durable log publish failed"));
        assert!(!logs_contain("Live log publish failed"));
        assert_eq!(connection.calls_on(ChannelKind::Live).len(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_durable_panic_is_contained() {
        let connection = RecordingConnection::new().with_durable(Behavior::Panic);
        let logger = DriverLogger::new("r1", "ingest", Some(&connection));

        logger.emit_message("hello").await;

        assert!(logs_contain("panicked"));
        assert_eq!(connection.calls_on(ChannelKind::Live).len(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_live_failure_is_logged() {
        let connection = RecordingConnection::new().with_live(Behavior::Fail);
        let logger = DriverLogger::new("r1", "ingest", Some(&connection));

        logger.emit_message("hello").await;

        assert!(logs_contain("Live log publish failed"));
        assert!(logs_contain("live.logs.r1.ingest"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unencodable_entry_is_dropped_with_diagnostic() {
        let connection = RecordingConnection::new();
        let logger = DriverLogger::new("r1", "ingest", Some(&connection));

        logger
            .emit("hello", None, labels! { "payload" => LabelValue::opaque(Unrepresentable) })
            .await;

        assert!(logs_contain("could not be encoded"));
        assert!(connection.calls().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_reserved_labels_are_reported() {
        let connection = RecordingConnection::new();
        let logger = DriverLogger::new("r1", "ingest", Some(&connection));

        logger.emit("hello", None, labels! { "message" => "spoofed" }).await;

        assert!(logs_contain("Dropped labels shadowing reserved fields"));
        assert_eq!(connection.calls().len(), 2);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_disconnected_logger_is_silent() {
        let logger = DriverLogger::new("r1", "ingest", None);

        logger.emit_message("hello").await;

        assert!(!logger.has_durable_channel());
        assert!(!logger.has_live_channel());
        assert!(!logs_contain("failed"));
    }

    #[test]
    fn test_run_id_from_label() {
        assert_eq!(run_id_from_label(&LabelValue::from("r1")).as_deref(), Some("r1"));
        assert_eq!(run_id_from_label(&LabelValue::Int(7)).as_deref(), Some("7"));
        assert_eq!(run_id_from_label(&LabelValue::from("  ")), None);
        assert_eq!(run_id_from_label(&LabelValue::Null), None);
    }

    #[test]
    fn test_debug_hides_channels() {
        let logger = DriverLogger::new("r1", "ingest", None);
        let rendered = format!("{logger:?}");
        assert!(rendered.contains("run_id: \"r1\""));
        assert!(rendered.contains("durable: false"));
    }
}
