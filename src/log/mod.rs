// src/log/mod.rs

//! User-facing installer log.
//!
//! - [`level`] defines the ordered severities.
//! - [`message`] holds the immutable log entry and its line format.
//! - [`history`] is the bounded in-memory history.
//! - [`sink`] contains the durable, line-oriented destinations.
//! - [`service`] ties them together behind [`LogService`].
//!
//! This is separate from the crate's own `tracing` diagnostics, which are
//! configured in [`crate::logging`].

pub mod history;
pub mod level;
pub mod message;
pub mod service;
pub mod sink;

pub use history::{DEFAULT_HISTORY_CAPACITY, LogHistory};
pub use level::LogLevel;
pub use message::LogMessage;
pub use service::{LogConfig, LogService, LogSubscription, SubscriptionId};
pub use sink::{FileSink, LogSink, NullSink};
