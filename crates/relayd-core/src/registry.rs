//! Peer registry: classification and membership sets.
//!
//! Every transport connection is attached here as unclassified; an explicit
//! registration moves it into exactly one of the control or device sets,
//! where it stays until detach. Membership snapshots are taken at call time
//! so fan-out never walks a live set.

use std::collections::HashMap;

use relayd_types::{ClientCounts, PeerId};

use crate::error::{CoreError, Result};

/// Classification of one attached peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerClass {
    Unclassified,
    Control,
    Device { slot: usize },
}

#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    peers: HashMap<PeerId, PeerClass>,
}

impl PeerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new transport connection as unclassified.
    pub fn attach(&mut self, peer: PeerId) {
        self.peers.insert(peer, PeerClass::Unclassified);
    }

    /// Remove a connection entirely, returning its final classification.
    pub fn detach(&mut self, peer: &PeerId) -> Option<PeerClass> {
        self.peers.remove(peer)
    }

    #[must_use]
    pub fn class(&self, peer: &PeerId) -> Option<&PeerClass> {
        self.peers.get(peer)
    }

    /// Classify an attached peer as control.
    ///
    /// # Errors
    ///
    /// `NotRegistered` if the peer was never attached, `AlreadyRegistered`
    /// if it is already classified.
    pub fn classify_control(&mut self, peer: &PeerId) -> Result<()> {
        self.classify(peer, PeerClass::Control)
    }

    /// Classify an attached peer as the device bound to `slot`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::classify_control`].
    pub fn classify_device(&mut self, peer: &PeerId, slot: usize) -> Result<()> {
        self.classify(peer, PeerClass::Device { slot })
    }

    fn classify(&mut self, peer: &PeerId, class: PeerClass) -> Result<()> {
        let entry = self.peers.get_mut(peer).ok_or(CoreError::NotRegistered)?;
        if *entry != PeerClass::Unclassified {
            return Err(CoreError::AlreadyRegistered);
        }
        *entry = class;
        Ok(())
    }

    #[must_use]
    pub fn is_control(&self, peer: &PeerId) -> bool {
        matches!(self.peers.get(peer), Some(PeerClass::Control))
    }

    /// Slot index of a device peer, `None` for anything else.
    #[must_use]
    pub fn device_slot(&self, peer: &PeerId) -> Option<usize> {
        match self.peers.get(peer) {
            Some(PeerClass::Device { slot }) => Some(*slot),
            _ => None,
        }
    }

    /// Snapshot of the control set at call time.
    #[must_use]
    pub fn controls(&self) -> Vec<PeerId> {
        self.members(|class| matches!(class, PeerClass::Control))
    }

    /// Snapshot of the device set at call time.
    #[must_use]
    pub fn devices(&self) -> Vec<PeerId> {
        self.members(|class| matches!(class, PeerClass::Device { .. }))
    }

    /// Snapshot of every attached peer, classified or not.
    #[must_use]
    pub fn all_peers(&self) -> Vec<PeerId> {
        self.peers.keys().cloned().collect()
    }

    #[must_use]
    pub fn counts(&self) -> ClientCounts {
        ClientCounts {
            control: self.controls().len(),
            device: self.devices().len(),
        }
    }

    fn members(&self, predicate: impl Fn(&PeerClass) -> bool) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|(_, class)| predicate(class))
            .map(|(peer, _)| peer.clone())
            .collect()
    }
}
