//! Domain types for driver logging.
//!
//! - `LogEntry`: the entry built per emit, with reserved-field protection
//! - `Labels` / `LabelValue`: the caller label bag
//! - `LogRecord`: consumer-side decoding of a published payload

pub mod label;
pub mod log_entry;
pub mod record;

pub use label::{LabelValue, Labels, OpaqueLabel, Rendered, Structured};
pub use log_entry::{LogEntry, RESERVED_KEYS, is_reserved};
pub use record::LogRecord;
