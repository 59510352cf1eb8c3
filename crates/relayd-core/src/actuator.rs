//! The actuation seam between the router and real hardware.
//!
//! The router treats actuation as an opaque side-effecting call with a
//! success/failure result. Which channels exist at all is decided once, by a
//! capability probe at construction time; a channel absent from that set is
//! a routing precondition failure, not an exception path.

use std::collections::BTreeSet;

/// Failure reported by an actuation call. Propagated back to the requester
/// as a failed result; never fatal to the router.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ActuationError(pub String);

/// An opaque hardware (or hardware-less) actuation backend.
pub trait Actuator: Send {
    /// Channel indices that passed the capability probe, in ascending order.
    fn available_channels(&self) -> &BTreeSet<u8>;

    /// Drive one channel of one slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying hardware call fails. The caller
    /// reports it to the requesting peer and moves on.
    fn actuate(&mut self, slot: usize, channel: u8, state: bool) -> Result<(), ActuationError>;

    /// Best-effort: drive every available channel off. Failures are
    /// swallowed by the implementation; the store is cleared regardless.
    fn stop_all(&mut self);

    /// Graceful-shutdown hook: drive everything off and release any held
    /// hardware resources.
    fn shutdown(&mut self) {
        self.stop_all();
    }
}

impl Actuator for Box<dyn Actuator> {
    fn available_channels(&self) -> &BTreeSet<u8> {
        (**self).available_channels()
    }

    fn actuate(&mut self, slot: usize, channel: u8, state: bool) -> Result<(), ActuationError> {
        (**self).actuate(slot, channel, state)
    }

    fn stop_all(&mut self) {
        (**self).stop_all();
    }

    fn shutdown(&mut self) {
        (**self).shutdown();
    }
}

/// Actuator with no hardware behind it; every configured channel is
/// "available" and every call succeeds. Used for relay-only deployments
/// where devices do their own actuation, and in tests.
#[derive(Debug, Clone)]
pub struct NullActuator {
    available: BTreeSet<u8>,
}

impl NullActuator {
    /// All channels `1..=channels` available.
    #[must_use]
    pub fn new(channels: u8) -> Self {
        Self {
            available: (1..=channels).collect(),
        }
    }

    /// Only the given channels available.
    #[must_use]
    pub fn with_channels(channels: impl IntoIterator<Item = u8>) -> Self {
        Self {
            available: channels.into_iter().collect(),
        }
    }
}

impl Actuator for NullActuator {
    fn available_channels(&self) -> &BTreeSet<u8> {
        &self.available
    }

    fn actuate(&mut self, _slot: usize, _channel: u8, _state: bool) -> Result<(), ActuationError> {
        Ok(())
    }

    fn stop_all(&mut self) {}
}
