//! Fixed-capacity device slot pool.
//!
//! Slot indices are stable: a device keeps the index it was allocated for
//! the life of its connection, and releasing a slot never re-indexes the
//! remaining devices. The freed index simply becomes the new
//! lowest-available and is claimed by the next registering device.

use relayd_types::{PeerId, RosterEntry};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Default)]
struct SlotRecord {
    device: Option<PeerId>,
    name: Option<String>,
}

/// The ordered pool of device slots.
#[derive(Debug, Clone)]
pub struct SlotTable {
    slots: Vec<SlotRecord>,
}

impl SlotTable {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![SlotRecord::default(); capacity],
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Bind `peer` to the lowest unused slot index.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` when every slot is bound; nothing is mutated.
    pub fn allocate(&mut self, peer: PeerId, name: String) -> Result<usize> {
        let Some((index, record)) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, record)| record.device.is_none())
        else {
            return Err(CoreError::CapacityExceeded {
                capacity: self.slots.len(),
            });
        };
        record.device = Some(peer);
        record.name = Some(name);
        Ok(index)
    }

    /// Unbind whatever slot `peer` holds. Returns the freed index, or `None`
    /// if the peer held no slot. Other bindings are untouched.
    pub fn release(&mut self, peer: &PeerId) -> Option<usize> {
        let index = self.slot_of(peer)?;
        self.slots[index] = SlotRecord::default();
        Some(index)
    }

    /// The peer bound to `slot`, if any.
    #[must_use]
    pub fn bound_device(&self, slot: usize) -> Option<&PeerId> {
        self.slots.get(slot)?.device.as_ref()
    }

    /// The slot `peer` is bound to, if any.
    #[must_use]
    pub fn slot_of(&self, peer: &PeerId) -> Option<usize> {
        self.slots
            .iter()
            .position(|record| record.device.as_ref() == Some(peer))
    }

    /// Display name of the device bound to `slot`.
    #[must_use]
    pub fn name(&self, slot: usize) -> Option<&str> {
        self.slots.get(slot)?.name.as_deref()
    }

    /// All currently bound (slot, peer) pairs in slot order.
    #[must_use]
    pub fn bound(&self) -> impl Iterator<Item = (usize, &PeerId)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, record)| record.device.as_ref().map(|peer| (index, peer)))
    }

    /// Roster rows for every slot, bound or not, in slot order.
    #[must_use]
    pub fn entries(&self) -> Vec<RosterEntry> {
        self.slots
            .iter()
            .enumerate()
            .map(|(slot, record)| RosterEntry {
                slot,
                name: record.device.as_ref().and(record.name.clone()),
            })
            .collect()
    }
}
