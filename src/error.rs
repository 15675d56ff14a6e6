use thiserror::Error;

/// Boxed transport error carried by publish and connect failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum DriverLogError {
    #[error("Label `{key}` can neither be encoded nor rendered as a string")]
    Unrepresentable { key: String },

    #[error("Failed to encode log entry: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Publish to {subject} failed: {source}")]
    Publish {
        subject: String,
        #[source]
        source: BoxError,
    },

    #[error("Publish to {subject} panicked")]
    PublishPanicked { subject: String },

    #[error("Publish channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("Failed to connect to NATS at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to flush NATS connection: {0}")]
    Flush(#[source] BoxError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DriverLogError {
    /// Wraps a transport error raised while publishing to `subject`.
    pub fn publish<E>(subject: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Publish {
            subject: subject.into(),
            source: Box::new(source),
        }
    }
}
