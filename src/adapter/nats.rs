use crate::error::DriverLogError;
use crate::port::{LogConnection, PublishChannel, PublishFuture};
use async_nats::jetstream;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const DEFAULT_NATS_URL: &str = "nats://localhost:4222";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct NatsSettings {
    pub url: String,
    pub connection_name: Option<String>,
    pub connect_timeout: Duration,
}

impl Default for NatsSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_NATS_URL.to_string(),
            connection_name: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// NATS connection shared by any number of loggers.
///
/// The durable channel publishes through JetStream and waits for the stream ack; the
/// live channel is a plain core-NATS publish.
#[derive(Clone, Debug)]
pub struct NatsConnection {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

impl NatsConnection {
    pub async fn connect(settings: &NatsSettings) -> Result<Self, DriverLogError> {
        let mut options =
            async_nats::ConnectOptions::new().connection_timeout(settings.connect_timeout);
        if let Some(name) = &settings.connection_name {
            options = options.name(name);
        }

        let client = options
            .connect(settings.url.as_str())
            .await
            .map_err(|e| DriverLogError::Connect {
                url: settings.url.clone(),
                source: Box::new(e),
            })?;
        info!(url = %settings.url, "Connected to NATS");

        Ok(Self::from_client(client))
    }

    pub fn from_client(client: async_nats::Client) -> Self {
        let jetstream = jetstream::new(client.clone());
        Self { client, jetstream }
    }

    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    /// Flushes buffered core-NATS publishes to the server.
    pub async fn flush(&self) -> Result<(), DriverLogError> {
        self.client
            .flush()
            .await
            .map_err(|e| DriverLogError::Flush(Box::new(e)))
    }
}

impl LogConnection for NatsConnection {
    fn durable_channel(&self) -> Result<Arc<dyn PublishChannel>, DriverLogError> {
        Ok(Arc::new(JetStreamChannel {
            context: self.jetstream.clone(),
        }))
    }

    fn live_channel(&self) -> Result<Arc<dyn PublishChannel>, DriverLogError> {
        Ok(Arc::new(CoreChannel {
            client: self.client.clone(),
        }))
    }
}

struct JetStreamChannel {
    context: jetstream::Context,
}

impl PublishChannel for JetStreamChannel {
    fn publish(&self, subject: String, payload: Bytes) -> PublishFuture<'_> {
        Box::pin(async move {
            let ack = self
                .context
                .publish(subject.clone(), payload)
                .await
                .map_err(|e| DriverLogError::publish(&subject, e))?;
            ack.await.map_err(|e| DriverLogError::publish(subject, e))?;
            Ok(())
        })
    }
}

struct CoreChannel {
    client: async_nats::Client,
}

impl PublishChannel for CoreChannel {
    fn publish(&self, subject: String, payload: Bytes) -> PublishFuture<'_> {
        Box::pin(async move {
            self.client
                .publish(subject.clone(), payload)
                .await
                .map_err(|e| DriverLogError::publish(subject, e))
        })
    }
}
