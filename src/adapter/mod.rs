pub mod nats;

pub use nats::{NatsConnection, NatsSettings};
