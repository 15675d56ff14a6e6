//! Structured driver logging over NATS.
//!
//! A [`DriverLogger`] publishes every entry twice: durably to the JetStream subject
//! `logs.<run_id>` and live to the core-NATS subject `live.logs.<run_id>.<driver>`.
//! Publishing is best effort and never fails the caller.

#![warn(rust_2018_idioms)]

pub mod adapter;
pub mod app;
pub mod bridge;
pub mod config;
pub mod domain;
pub mod error;
pub mod logger;
pub mod port;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use adapter::{NatsConnection, NatsSettings};
pub use bridge::DriverLogLayer;
pub use domain::{LabelValue, Labels, LogEntry, LogRecord};
pub use error::DriverLogError;
pub use logger::DriverLogger;
pub use port::{LogConnection, PublishChannel};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
