//! Session registry and state-relay state machine for relayd.
//!
//! This crate is the single-writer core of the daemon: peer classification,
//! the fixed-capacity device slot pool, the per-slot channel state store,
//! and the router that turns one inbound peer message into a batch of
//! outbound deliveries. It performs no I/O; the server crate owns the
//! transport and drains the deliveries this crate plans.

pub mod actuator;
pub mod error;
pub mod registry;
pub mod router;
pub mod slots;
pub mod store;

pub use actuator::{ActuationError, Actuator, NullActuator};
pub use error::{CoreError, Result};
pub use registry::{PeerClass, PeerRegistry};
pub use router::{Outbound, Router};
pub use slots::SlotTable;
pub use store::ChannelStateStore;
