//! In-memory channel state store, one vector per slot.
//!
//! The single source of truth for "last known" state. Every slot has a
//! defined vector whether or not a device is currently bound to it; values
//! survive device disconnects and rebinds until explicitly resynchronized.

use relayd_types::{ChannelStateVector, PartialStateVector};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone)]
pub struct ChannelStateStore {
    slots: Vec<ChannelStateVector>,
    channels: u8,
}

impl ChannelStateStore {
    /// Create a store with `slots` all-off vectors of `channels` entries.
    #[must_use]
    pub fn new(slots: usize, channels: u8) -> Self {
        Self {
            slots: (0..slots)
                .map(|_| ChannelStateVector::new(usize::from(channels)))
                .collect(),
            channels,
        }
    }

    /// Channels per slot.
    #[must_use]
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Number of slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// The vector for one slot, or `None` for an out-of-range index.
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&ChannelStateVector> {
        self.slots.get(slot)
    }

    /// Clone of the full table in slot order, for snapshot pushes.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ChannelStateVector> {
        self.slots.clone()
    }

    /// Single-channel update. `channel` is the 1-based wire number.
    ///
    /// # Errors
    ///
    /// `InvalidChannel` if the channel is out of range, `UnboundSlot` if the
    /// slot index is.
    pub fn set(&mut self, slot: usize, channel: u8, value: bool) -> Result<()> {
        self.check_channel(channel)?;
        let vector = self
            .slots
            .get_mut(slot)
            .ok_or(CoreError::UnboundSlot { slot })?;
        vector.set(channel, value);
        Ok(())
    }

    /// Apply a full-or-partial snapshot to one slot; unspecified channels
    /// retain their prior value.
    ///
    /// # Errors
    ///
    /// `InvalidChannel` if the snapshot names more channels than exist,
    /// `UnboundSlot` if the slot index is out of range.
    pub fn merge(&mut self, slot: usize, partial: &PartialStateVector) -> Result<()> {
        if partial.len() > usize::from(self.channels) {
            let channel = u8::try_from(partial.len()).unwrap_or(u8::MAX);
            return Err(CoreError::InvalidChannel {
                channel,
                channels: self.channels,
            });
        }
        let vector = self
            .slots
            .get_mut(slot)
            .ok_or(CoreError::UnboundSlot { slot })?;
        vector.merge(partial);
        Ok(())
    }

    /// Force every channel of every slot off.
    pub fn clear_all(&mut self) {
        for vector in &mut self.slots {
            vector.clear();
        }
    }

    fn check_channel(&self, channel: u8) -> Result<()> {
        if channel == 0 || channel > self.channels {
            return Err(CoreError::InvalidChannel {
                channel,
                channels: self.channels,
            });
        }
        Ok(())
    }
}
