//! # Built-in bus subscribers.
//!
//! - [`LogWriter`]: logs every kernel event through `tracing`.

mod log;

pub use log::LogWriter;
