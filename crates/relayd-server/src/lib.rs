//! Relay daemon: HTTP/WebSocket transport, configuration, and the sysfs
//! GPIO actuation backend around the relayd-core state machine.

pub mod config;
pub mod error;
pub mod gpio;
pub mod server;

pub use config::Config;
pub use error::{Result, ServerError};
