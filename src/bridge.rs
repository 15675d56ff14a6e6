//! `tracing` integration: forwards application events to a [`DriverLogger`].
//!
//! Each event becomes one emit carrying the event's fields as labels plus `level` and
//! `module`. Emits are spawned onto the current tokio runtime; without one the event is
//! dropped.

use crate::domain::Labels;
use crate::logger::DriverLogger;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

pub struct DriverLogLayer {
    logger: DriverLogger,
    max_level: Level,
    ignored_targets: Vec<String>,
}

impl DriverLogLayer {
    /// Forwards INFO and above. Events from this crate and from `async_nats` are never
    /// forwarded, otherwise publish diagnostics would be published again.
    pub fn new(logger: DriverLogger) -> Self {
        Self {
            logger,
            max_level: Level::INFO,
            ignored_targets: vec![env!("CARGO_CRATE_NAME").to_string(), "async_nats".to_string()],
        }
    }

    #[must_use]
    pub fn with_max_level(mut self, level: Level) -> Self {
        self.max_level = level;
        self
    }

    #[must_use]
    pub fn ignore_target(mut self, target: impl Into<String>) -> Self {
        self.ignored_targets.push(target.into());
        self
    }

    fn forwards(&self, metadata: &Metadata<'_>) -> bool {
        if *metadata.level() > self.max_level {
            return false;
        }
        !self.is_ignored(metadata.target())
    }

    fn is_ignored(&self, target: &str) -> bool {
        self.ignored_targets.iter().any(|ignored| {
            target == ignored
                || target
                    .strip_prefix(ignored.as_str())
                    .is_some_and(|rest| rest.starts_with("::"))
        })
    }
}

impl<S: Subscriber> Layer<S> for DriverLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !self.forwards(metadata) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        let mut labels = visitor.labels;
        labels.insert("level", metadata.level().as_str());
        labels.insert("module", metadata.module_path().unwrap_or("unknown"));

        let logger = self.logger.clone();
        let message = visitor.message.unwrap_or_default();
        runtime.spawn(async move {
            logger.emit(message, None, labels).await;
        });
    }
}

#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    labels: Labels,
}

impl Visit for EventVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.labels.insert(field.name(), value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.labels.insert(field.name(), value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.labels.insert(field.name(), value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.labels.insert(field.name(), value);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.labels.insert(field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.labels.insert(field.name(), format!("{value:?}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer() -> DriverLogLayer {
        DriverLogLayer::new(DriverLogger::new("r1", "ingest", None))
    }

    #[test]
    fn test_ignored_targets_match_whole_path_segments() {
        let layer = layer().ignore_target("noisy");
        assert!(layer.is_ignored("noisy"));
        assert!(layer.is_ignored("noisy::inner"));
        assert!(layer.is_ignored("async_nats::connection"));
        assert!(layer.is_ignored("conveyor_driver_log::logger"));
        assert!(!layer.is_ignored("noisy_neighbour"));
        assert!(!layer.is_ignored("my_driver::steps"));
    }

    #[test]
    fn test_default_level_is_info() {
        assert_eq!(layer().max_level, Level::INFO);
        assert_eq!(layer().with_max_level(Level::DEBUG).max_level, Level::DEBUG);
    }
}
