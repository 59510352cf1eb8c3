//! Error types for the relay core.

use relayd_proto::ErrorCode;

/// Errors produced by the core state machine.
///
/// Every variant is local to the request that caused it; none corrupt the
/// shared store or affect unrelated peers.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The device slot pool is full.
    #[error("slot pool is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    /// Channel number outside `[1, channels_per_slot]`.
    #[error("channel {channel} out of range (1..={channels})")]
    InvalidChannel { channel: u8, channels: u8 },

    /// Channel is in range but did not pass the startup capability probe.
    #[error("channel {channel} not available on this hardware")]
    ChannelUnavailable { channel: u8 },

    /// Command targeted a slot with no bound device.
    #[error("no device bound to slot {slot}")]
    UnboundSlot { slot: usize },

    /// A classified action was attempted before registration.
    #[error("peer is not registered")]
    NotRegistered,

    /// A second registration on an already-classified peer.
    #[error("peer is already registered")]
    AlreadyRegistered,

    /// The external actuation call reported failure.
    #[error("actuation failed: {0}")]
    Actuation(String),
}

impl CoreError {
    /// The wire error code this error maps to.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::CapacityExceeded { .. } => ErrorCode::CapacityExceeded,
            CoreError::InvalidChannel { .. } => ErrorCode::InvalidChannel,
            CoreError::ChannelUnavailable { .. } => ErrorCode::ChannelUnavailable,
            CoreError::UnboundSlot { .. } => ErrorCode::UnboundSlot,
            CoreError::NotRegistered => ErrorCode::NotRegistered,
            CoreError::AlreadyRegistered => ErrorCode::AlreadyRegistered,
            CoreError::Actuation(_) => ErrorCode::ActuationFailed,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
