//! Shared test support utilities
//!
//! Provides `RecordingConnection`, a fake `LogConnection` whose two channels record every
//! publish attempt and can be told to succeed, fail, panic, hang or be unavailable.

use crate::error::DriverLogError;
use crate::port::{LogConnection, PublishChannel, PublishFuture};
use bytes::Bytes;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Durable,
    Live,
}

/// How a fake channel reacts to a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Behavior {
    #[default]
    Succeed,
    Fail,
    Panic,
    Hang,
    /// The channel cannot be obtained from the connection at all.
    Unavailable,
}

/// One recorded publish attempt, successful or not.
#[derive(Debug, Clone)]
pub struct PublishCall {
    pub channel: ChannelKind,
    pub subject: String,
    pub payload: Bytes,
}

impl PublishCall {
    pub fn json(&self) -> Map<String, Value> {
        serde_json::from_slice(&self.payload).expect("payload should be a JSON object")
    }
}

#[derive(Clone, Default)]
pub struct RecordingConnection {
    calls: Arc<Mutex<Vec<PublishCall>>>,
    durable: Behavior,
    live: Behavior,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_durable(mut self, behavior: Behavior) -> Self {
        self.durable = behavior;
        self
    }

    #[must_use]
    pub fn with_live(mut self, behavior: Behavior) -> Self {
        self.live = behavior;
        self
    }

    /// All publish attempts in the order they were made.
    pub fn calls(&self) -> Vec<PublishCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls_on(&self, channel: ChannelKind) -> Vec<PublishCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.channel == channel)
            .collect()
    }

    /// Polls until at least `count` attempts were recorded or `timeout` elapses.
    pub async fn wait_for_calls(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.calls().len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn channel(
        &self,
        channel: ChannelKind,
        behavior: Behavior,
    ) -> Result<Arc<dyn PublishChannel>, DriverLogError> {
        if behavior == Behavior::Unavailable {
            return Err(DriverLogError::ChannelUnavailable(format!(
                "{channel:?} channel disabled"
            )));
        }
        Ok(Arc::new(RecordingChannel {
            channel,
            behavior,
            calls: self.calls.clone(),
        }))
    }
}

impl LogConnection for RecordingConnection {
    fn durable_channel(&self) -> Result<Arc<dyn PublishChannel>, DriverLogError> {
        self.channel(ChannelKind::Durable, self.durable)
    }

    fn live_channel(&self) -> Result<Arc<dyn PublishChannel>, DriverLogError> {
        self.channel(ChannelKind::Live, self.live)
    }
}

struct RecordingChannel {
    channel: ChannelKind,
    behavior: Behavior,
    calls: Arc<Mutex<Vec<PublishCall>>>,
}

impl PublishChannel for RecordingChannel {
    fn publish(&self, subject: String, payload: Bytes) -> PublishFuture<'_> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(PublishCall {
                    channel: self.channel,
                    subject: subject.clone(),
                    payload,
                });

            match self.behavior {
                Behavior::Succeed | Behavior::Unavailable => Ok(()),
                Behavior::Fail => Err(DriverLogError::publish(
                    subject,
                    std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        "simulated transport failure",
                    ),
                )),
                Behavior::Panic => panic!("simulated transport panic on {subject}"),
                Behavior::Hang => std::future::pending().await,
            }
        })
    }
}
