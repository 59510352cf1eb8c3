//! Peer-facing message catalog.
//!
//! Messages are JSON objects tagged by an `event` field, one message per
//! WebSocket text frame. `ClientMessage` is everything a peer may send;
//! `ServerMessage` is everything the server may push. Anything that does not
//! parse into these closed unions is rejected before reaching the router.

use serde::{Deserialize, Serialize};

use relayd_types::{ChannelStateVector, PartialStateVector, RosterEntry};

use crate::error::ErrorCode;

/// Declared peer classification, carried in the `register` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Issues commands and observes state.
    Control,
    /// Bound to exactly one slot; executes commands and reports actual state.
    Device,
}

impl std::fmt::Display for ClientRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientRole::Control => write!(f, "control"),
            ClientRole::Device => write!(f, "device"),
        }
    }
}

/// Messages a peer may send to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Declare this connection's classification. Valid exactly once.
    Register {
        #[serde(rename = "type")]
        role: ClientRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// Control → server: drive one channel of one slot.
    ///
    /// `slot` defaults to 0 for single-device deployments.
    RelayControl {
        #[serde(default)]
        slot: usize,
        channel: u8,
        state: bool,
    },

    /// Control → server: force every channel of every slot off.
    EmergencyStop,

    /// Device → server: confirmed state of one channel of the sender's slot.
    RelayStateUpdate { channel: u8, state: bool },

    /// Device → server: full or partial snapshot of the sender's slot,
    /// used for reconciliation after reconnect or periodic resync.
    RelayStateSync { states: PartialStateVector },
}

/// Messages the server may push to a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Registration acknowledgment; `slot` is set for device peers.
    Registered {
        role: ClientRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slot: Option<usize>,
    },

    /// Request rejection echoed to the offending peer only: registration
    /// failures and invalid device reports. No broadcast, no state change.
    Error { code: ErrorCode, message: String },

    /// Full state snapshot, one vector per slot in slot order.
    RelayState { slots: Vec<ChannelStateVector> },

    /// Channel indices that passed the startup capability probe.
    AvailableChannels { channels: Vec<u8> },

    /// One confirmed channel change, fanned out to control peers.
    RelayStateUpdate {
        slot: usize,
        channel: u8,
        state: bool,
    },

    /// Command forwarded to the bound device of the targeted slot.
    RelayControl { channel: u8, state: bool },

    /// Acknowledgment of a `relay_control` request, echoing its parameters.
    RelayControlResult {
        success: bool,
        slot: usize,
        channel: u8,
        state: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorCode>,
    },

    /// Stop-all command forwarded to every bound device.
    EmergencyStopAll,

    /// Acknowledgment of an `emergency_stop` request to its originator.
    EmergencyStopResult {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorCode>,
    },

    /// Execution notice broadcast to every connection, control and device.
    EmergencyStopExecuted { timestamp: String, by: String },

    /// Connected peer counts, pushed to control peers on membership change.
    ClientCount { control: usize, device: usize },

    /// Roster of slots and bound device names.
    DeviceList { devices: Vec<RosterEntry> },

    /// A device joined and was bound to `slot`.
    DeviceConnected { slot: usize, name: String },

    /// The device bound to `slot` disconnected; the slot is now unbound.
    DeviceDisconnected {
        slot: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl ClientMessage {
    /// Parse one inbound frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or does not match any
    /// known event shape.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize this message to a JSON frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ServerMessage {
    /// Serialize this message to a JSON frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse one frame; used by clients and tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or does not match any
    /// known event shape.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
