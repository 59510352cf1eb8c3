//! Wire-level error codes.

use serde::{Deserialize, Serialize};

/// Error codes carried in result acknowledgments.
///
/// Every failure is local to the request that caused it; none of these
/// corrupt shared state or affect unrelated peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The device slot pool is full.
    #[error("device slot pool is full")]
    CapacityExceeded,

    /// Channel number outside `[1, channels_per_slot]`.
    #[error("channel number out of range")]
    InvalidChannel,

    /// Channel is in range but absent from the startup capability probe.
    #[error("channel not available on this hardware")]
    ChannelUnavailable,

    /// Command targeted a slot with no bound device.
    #[error("no device bound to the target slot")]
    UnboundSlot,

    /// The external actuation call reported failure.
    #[error("actuation failed")]
    ActuationFailed,

    /// A classified action was attempted before registration.
    #[error("peer is not registered")]
    NotRegistered,

    /// A second registration was attempted on an already-classified peer.
    #[error("peer is already registered")]
    AlreadyRegistered,
}
