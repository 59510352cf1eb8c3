//! Wire protocol definitions for relayd.
//!
//! This crate defines the closed, tagged message unions exchanged over the
//! persistent peer connection, one per direction. Payloads are validated
//! here at the boundary before they reach the router's state machine.

pub mod error;
pub mod message;

pub use error::ErrorCode;
pub use message::{ClientMessage, ClientRole, ServerMessage};
