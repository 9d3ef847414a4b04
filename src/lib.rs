//! eventnotify - severity-routed event notifications
//!
//! An application reports an event with a severity level and a set of detail
//! pairs. The `Dispatcher` maps the level to delivery channels (the SQLite
//! event log, email, instant messaging and SMS through carrier email
//! gateways), delivers to each of them and returns one result per channel.
//! The `monitor` module uses the dispatcher to report hosts that stop
//! answering pings or serving their web page.

pub mod channels;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatcher;
pub mod errors;
pub mod formatting;
pub mod monitor;
pub mod services;
pub mod severity;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export core types for convenience
pub use crate::core::*;
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use errors::{ChannelError, ConfigError};
pub use severity::SeverityPolicy;
