//! Shared types for relayd components.
//!
//! This crate provides the core types used across relayd-proto, relayd-core,
//! and relayd-server. All types are serializable for wire transport.

use serde::{Deserialize, Serialize};

/// Unique identifier for a connected peer (control or device).
///
/// Assigned at transport connect time and never reused for the lifetime of
/// the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-slot relay channel states.
///
/// A fixed-size ordered tuple of booleans, one per channel. Channels are
/// numbered 1..=len on the wire; index 0 on the wire is never valid.
/// Serializes as a plain JSON array of booleans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelStateVector(Vec<bool>);

impl ChannelStateVector {
    /// Create an all-off vector with `channels` entries.
    #[must_use]
    pub fn new(channels: usize) -> Self {
        Self(vec![false; channels])
    }

    /// Number of channels in this vector.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.0.len()
    }

    /// Read a channel by its 1-based wire number. `None` if out of range.
    #[must_use]
    pub fn get(&self, channel: u8) -> Option<bool> {
        if channel == 0 {
            return None;
        }
        self.0.get(usize::from(channel) - 1).copied()
    }

    /// Write a channel by its 1-based wire number.
    ///
    /// Returns `false` (and changes nothing) if the channel is out of range.
    pub fn set(&mut self, channel: u8, value: bool) -> bool {
        if channel == 0 {
            return false;
        }
        match self.0.get_mut(usize::from(channel) - 1) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Force every channel off.
    pub fn clear(&mut self) {
        self.0.fill(false);
    }

    /// Apply a partial snapshot: specified channels take the new value,
    /// unspecified channels keep their prior value. Entries beyond this
    /// vector's length are ignored.
    pub fn merge(&mut self, partial: &PartialStateVector) {
        for (idx, entry) in partial.0.iter().enumerate() {
            if let (Some(value), Some(slot)) = (entry, self.0.get_mut(idx)) {
                *slot = *value;
            }
        }
    }

    /// Borrow the raw channel states, ordered by channel number.
    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }
}

impl From<Vec<bool>> for ChannelStateVector {
    fn from(v: Vec<bool>) -> Self {
        Self(v)
    }
}

/// A full-or-partial channel snapshot as reported by a device.
///
/// Position i corresponds to channel i+1; `null` entries mean "no report for
/// this channel". Serializes as a JSON array of `bool | null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct PartialStateVector(Vec<Option<bool>>);

impl PartialStateVector {
    /// Number of entries (reported or not) in this snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A full snapshot: every channel reported.
    #[must_use]
    pub fn full(states: &[bool]) -> Self {
        Self(states.iter().copied().map(Some).collect())
    }
}

impl From<Vec<Option<bool>>> for PartialStateVector {
    fn from(v: Vec<Option<bool>>) -> Self {
        Self(v)
    }
}

/// Connected peer counts by classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ClientCounts {
    pub control: usize,
    pub device: usize,
}

/// One row of the derived roster view: a slot and the display name of the
/// device bound to it, or `None` when the slot is unbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub slot: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Derived, read-only view of current slot occupancy and connection counts.
///
/// Recomputed on every membership change, never independently mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub devices: Vec<RosterEntry>,
    pub counts: ClientCounts,
}


#[cfg(test)]
mod merge_props {
    use super::*;
    use proptest::prelude::*;

    fn vector_strategy(len: usize) -> impl Strategy<Value = Vec<bool>> {
        proptest::collection::vec(any::<bool>(), len)
    }

    proptest! {
        #[test]
        fn merge_empty_partial_is_identity(states in vector_strategy(4)) {
            let mut v = ChannelStateVector::from(states.clone());
            v.merge(&PartialStateVector::from(vec![None; 4]));
            prop_assert_eq!(v.as_slice(), states.as_slice());
        }

        #[test]
        fn merge_is_idempotent(
            states in vector_strategy(4),
            partial in proptest::collection::vec(any::<Option<bool>>(), 4),
        ) {
            let partial = PartialStateVector::from(partial);
            let mut once = ChannelStateVector::from(states);
            once.merge(&partial);
            let mut twice = once.clone();
            twice.merge(&partial);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn merge_full_equals_replacement(
            states in vector_strategy(4),
            replacement in vector_strategy(4),
        ) {
            let mut v = ChannelStateVector::from(states);
            v.merge(&PartialStateVector::full(&replacement));
            prop_assert_eq!(v.as_slice(), replacement.as_slice());
        }
    }
}
