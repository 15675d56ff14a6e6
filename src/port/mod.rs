//! Ports between the logger and the messaging transport.
//!
//! Both traits are dyn-compatible by using boxed futures instead of `impl Future`, so a
//! single connection can be shared as `Arc<dyn ...>` by many loggers.

use crate::error::DriverLogError;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type PublishFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DriverLogError>> + Send + 'a>>;

/// A publish capability bound to one delivery channel.
///
/// Implementations must be safe for concurrent use; the logger does no locking.
pub trait PublishChannel: Send + Sync {
    fn publish(&self, subject: String, payload: Bytes) -> PublishFuture<'_>;
}

/// A messaging connection able to hand out both publish capabilities.
pub trait LogConnection: Send + Sync {
    /// Capability for the durable, replayable stream.
    fn durable_channel(&self) -> Result<Arc<dyn PublishChannel>, DriverLogError>;

    /// Capability for the ephemeral live-tail topic.
    fn live_channel(&self) -> Result<Arc<dyn PublishChannel>, DriverLogError>;
}
