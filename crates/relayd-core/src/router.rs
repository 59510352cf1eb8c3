//! The protocol state machine.
//!
//! One inbound peer message (or lifecycle event) becomes one batch of
//! outbound deliveries, planned while holding the single serialization
//! point. Recipient sets are snapshotted at call time; actually writing to
//! the wire is the transport layer's problem.

use chrono::Utc;
use tracing::{debug, info, warn};

use relayd_proto::{ClientMessage, ClientRole, ErrorCode, ServerMessage};
use relayd_types::{ChannelStateVector, ClientCounts, PartialStateVector, PeerId, Roster};

use crate::actuator::Actuator;
use crate::error::{CoreError, Result};
use crate::registry::{PeerClass, PeerRegistry};
use crate::slots::SlotTable;
use crate::store::ChannelStateStore;

/// One planned delivery: `message` goes to `to`, best-effort.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub to: PeerId,
    pub message: ServerMessage,
}

impl Outbound {
    fn new(to: &PeerId, message: ServerMessage) -> Self {
        Self {
            to: to.clone(),
            message,
        }
    }
}

/// Router owning all shared relay state: peer registry, slot pool, channel
/// state store, and the actuation seam.
///
/// Not internally synchronized; the caller funnels every mutation through
/// one serialization point.
pub struct Router<A: Actuator> {
    registry: PeerRegistry,
    slots: SlotTable,
    store: ChannelStateStore,
    actuator: A,
}

impl<A: Actuator> Router<A> {
    #[must_use]
    pub fn new(slots: usize, channels: u8, actuator: A) -> Self {
        Self {
            registry: PeerRegistry::new(),
            slots: SlotTable::new(slots),
            store: ChannelStateStore::new(slots, channels),
            actuator,
        }
    }

    /// Track a new transport connection. No broadcast until it registers.
    pub fn connect(&mut self, peer: PeerId) {
        debug!("peer attached: {peer}");
        self.registry.attach(peer);
    }

    /// Handle a transport disconnect: release registry and slot entries and
    /// announce the membership change.
    pub fn disconnect(&mut self, peer: &PeerId) -> Vec<Outbound> {
        match self.registry.detach(peer) {
            Some(PeerClass::Device { slot }) => {
                let name = self.slots.name(slot).map(String::from);
                self.slots.release(peer);
                info!("device left slot {slot}: {peer}");
                let mut out =
                    self.fan_out_controls(ServerMessage::DeviceDisconnected { slot, name });
                out.extend(self.membership_update());
                out
            }
            Some(PeerClass::Control) => {
                debug!("control peer left: {peer}");
                self.membership_update()
            }
            Some(PeerClass::Unclassified) => {
                debug!("unclassified peer left: {peer}");
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Process one validated inbound message from `peer`.
    ///
    /// Messages sent from the wrong classification (or before registration)
    /// are ignored without any state change, per the protocol contract.
    pub fn handle(&mut self, peer: &PeerId, message: ClientMessage) -> Vec<Outbound> {
        match message {
            ClientMessage::Register { role, name } => self.register(peer, role, name),

            ClientMessage::RelayControl {
                slot,
                channel,
                state,
            } => {
                if self.registry.is_control(peer) {
                    self.relay_control(peer, slot, channel, state)
                } else {
                    debug!("ignoring relay_control from non-control peer {peer}");
                    Vec::new()
                }
            }

            ClientMessage::EmergencyStop => {
                if self.registry.is_control(peer) {
                    self.emergency_stop(peer)
                } else {
                    debug!("ignoring emergency_stop from non-control peer {peer}");
                    Vec::new()
                }
            }

            ClientMessage::RelayStateUpdate { channel, state } => {
                match self.registry.device_slot(peer) {
                    Some(slot) => self.relay_state_update(peer, slot, channel, state),
                    None => {
                        debug!("ignoring relay_state_update from non-device peer {peer}");
                        Vec::new()
                    }
                }
            }

            ClientMessage::RelayStateSync { states } => match self.registry.device_slot(peer) {
                Some(slot) => self.relay_state_sync(peer, slot, &states),
                None => {
                    debug!("ignoring relay_state_sync from non-device peer {peer}");
                    Vec::new()
                }
            },
        }
    }

    fn register(&mut self, peer: &PeerId, role: ClientRole, name: Option<String>) -> Vec<Outbound> {
        let name = name.unwrap_or_else(|| "unknown".to_string());
        match role {
            ClientRole::Control => match self.registry.classify_control(peer) {
                Ok(()) => {
                    info!("control peer registered: {peer} ({name})");
                    let mut out = vec![
                        Outbound::new(
                            peer,
                            ServerMessage::Registered {
                                role: ClientRole::Control,
                                slot: None,
                            },
                        ),
                        Outbound::new(
                            peer,
                            ServerMessage::RelayState {
                                slots: self.store.snapshot(),
                            },
                        ),
                        Outbound::new(
                            peer,
                            ServerMessage::AvailableChannels {
                                channels: self.available_channels(),
                            },
                        ),
                    ];
                    out.extend(self.membership_update());
                    out
                }
                Err(err) => self.reject(peer, &err),
            },

            ClientRole::Device => {
                match self.registry.class(peer) {
                    Some(PeerClass::Unclassified) => {}
                    Some(_) => return self.reject(peer, &CoreError::AlreadyRegistered),
                    None => return self.reject(peer, &CoreError::NotRegistered),
                }
                match self.slots.allocate(peer.clone(), name.clone()) {
                    Ok(slot) => {
                        if let Err(err) = self.registry.classify_device(peer, slot) {
                            self.slots.release(peer);
                            return self.reject(peer, &err);
                        }
                        info!("device registered: {peer} ({name}) -> slot {slot}");
                        let mut out = vec![Outbound::new(
                            peer,
                            ServerMessage::Registered {
                                role: ClientRole::Device,
                                slot: Some(slot),
                            },
                        )];
                        out.extend(
                            self.fan_out_controls(ServerMessage::DeviceConnected { slot, name }),
                        );
                        out.extend(self.membership_update());
                        out
                    }
                    Err(err) => {
                        warn!("device registration rejected for {peer}: {err}");
                        self.reject(peer, &err)
                    }
                }
            }
        }
    }

    fn relay_control(
        &mut self,
        peer: &PeerId,
        slot: usize,
        channel: u8,
        state: bool,
    ) -> Vec<Outbound> {
        let ack = |success: bool, error: Option<ErrorCode>| {
            Outbound::new(
                peer,
                ServerMessage::RelayControlResult {
                    success,
                    slot,
                    channel,
                    state,
                    error,
                },
            )
        };

        let device = match self.admit_command(slot, channel) {
            Ok(device) => device,
            Err(err) => {
                debug!("relay_control from {peer} rejected: {err}");
                return vec![ack(false, Some(err.code()))];
            }
        };

        if let Err(err) = self.actuator.actuate(slot, channel, state) {
            let err = CoreError::Actuation(err.to_string());
            warn!("actuation failed for slot {slot} ch{channel}: {err}");
            return vec![ack(false, Some(err.code()))];
        }

        debug!("relay_control slot {slot} ch{channel} -> {state} (from {peer})");
        vec![
            Outbound::new(&device, ServerMessage::RelayControl { channel, state }),
            ack(true, None),
        ]
    }

    /// Validate a command target and resolve the device it is routed to.
    ///
    /// # Errors
    ///
    /// `InvalidChannel` for a channel outside the configured range,
    /// `ChannelUnavailable` for one that failed the startup capability
    /// probe, `UnboundSlot` when no device holds the target slot. The store
    /// is untouched in every case; it only changes on device confirmation.
    fn admit_command(&self, slot: usize, channel: u8) -> Result<PeerId> {
        if channel == 0 || channel > self.store.channels() {
            return Err(CoreError::InvalidChannel {
                channel,
                channels: self.store.channels(),
            });
        }
        if !self.actuator.available_channels().contains(&channel) {
            return Err(CoreError::ChannelUnavailable { channel });
        }
        self.slots
            .bound_device(slot)
            .cloned()
            .ok_or(CoreError::UnboundSlot { slot })
    }

    fn emergency_stop(&mut self, peer: &PeerId) -> Vec<Outbound> {
        warn!("emergency stop requested by {peer}");
        self.actuator.stop_all();
        self.store.clear_all();

        let mut out: Vec<Outbound> = self
            .slots
            .bound()
            .map(|(_, device)| Outbound::new(device, ServerMessage::EmergencyStopAll))
            .collect();

        let snapshot = self.store.snapshot();
        out.extend(self.fan_out_controls(ServerMessage::RelayState { slots: snapshot }));

        let notice = ServerMessage::EmergencyStopExecuted {
            timestamp: Utc::now().to_rfc3339(),
            by: peer.to_string(),
        };
        for recipient in self.registry.all_peers() {
            out.push(Outbound::new(&recipient, notice.clone()));
        }

        out.push(Outbound::new(
            peer,
            ServerMessage::EmergencyStopResult {
                success: true,
                error: None,
            },
        ));
        out
    }

    fn relay_state_update(
        &mut self,
        peer: &PeerId,
        slot: usize,
        channel: u8,
        state: bool,
    ) -> Vec<Outbound> {
        match self.store.set(slot, channel, state) {
            Ok(()) => {
                debug!("device {peer} confirmed slot {slot} ch{channel} = {state}");
                self.fan_out_controls(ServerMessage::RelayStateUpdate {
                    slot,
                    channel,
                    state,
                })
            }
            Err(err) => self.reject(peer, &err),
        }
    }

    fn relay_state_sync(
        &mut self,
        peer: &PeerId,
        slot: usize,
        states: &PartialStateVector,
    ) -> Vec<Outbound> {
        match self.store.merge(slot, states) {
            Ok(()) => {
                debug!("device {peer} resynchronized slot {slot}");
                self.fan_out_controls(ServerMessage::RelayState {
                    slots: self.store.snapshot(),
                })
            }
            Err(err) => self.reject(peer, &err),
        }
    }

    /// Membership-changed notification: roster plus counts, to every
    /// control peer.
    fn membership_update(&self) -> Vec<Outbound> {
        let devices = self.slots.entries();
        let counts = self.registry.counts();
        let mut out = Vec::new();
        for control in self.registry.controls() {
            out.push(Outbound::new(
                &control,
                ServerMessage::DeviceList {
                    devices: devices.clone(),
                },
            ));
            out.push(Outbound::new(
                &control,
                ServerMessage::ClientCount {
                    control: counts.control,
                    device: counts.device,
                },
            ));
        }
        out
    }

    /// Independent delivery to a snapshot of the control set.
    fn fan_out_controls(&self, message: ServerMessage) -> Vec<Outbound> {
        self.registry
            .controls()
            .into_iter()
            .map(|control| Outbound {
                to: control,
                message: message.clone(),
            })
            .collect()
    }

    fn reject(&self, peer: &PeerId, err: &CoreError) -> Vec<Outbound> {
        vec![Outbound::new(
            peer,
            ServerMessage::Error {
                code: err.code(),
                message: err.to_string(),
            },
        )]
    }

    /// Release the actuation backend on daemon shutdown.
    pub fn shutdown(&mut self) {
        self.actuator.shutdown();
    }

    // Read-only accessors for the status surface.

    #[must_use]
    pub fn counts(&self) -> ClientCounts {
        self.registry.counts()
    }

    #[must_use]
    pub fn roster(&self) -> Roster {
        Roster {
            devices: self.slots.entries(),
            counts: self.registry.counts(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<ChannelStateVector> {
        self.store.snapshot()
    }

    #[must_use]
    pub fn available_channels(&self) -> Vec<u8> {
        self.actuator.available_channels().iter().copied().collect()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    #[must_use]
    pub fn channels(&self) -> u8 {
        self.store.channels()
    }
}
