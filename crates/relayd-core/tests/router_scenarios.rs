//! End-to-end router scenarios for relayd-core
//!
//! These tests drive full registration / command / confirmation / disconnect
//! sequences through the router and assert on the planned deliveries,
//! without any transport attached.

use std::collections::BTreeSet;

use relayd_core::{ActuationError, Actuator, NullActuator, Outbound, Router};
use relayd_proto::{ClientMessage, ClientRole, ErrorCode, ServerMessage};
use relayd_types::PeerId;

/// Attach and register one peer, discarding the join traffic.
fn join(router: &mut Router<impl Actuator>, role: ClientRole, name: &str) -> PeerId {
    let peer = PeerId::new();
    router.connect(peer.clone());
    router.handle(
        &peer,
        ClientMessage::Register {
            role,
            name: Some(name.to_string()),
        },
    );
    peer
}

fn messages_for<'a>(out: &'a [Outbound], peer: &PeerId) -> Vec<&'a ServerMessage> {
    out.iter()
        .filter(|delivery| &delivery.to == peer)
        .map(|delivery| &delivery.message)
        .collect()
}

#[test]
fn test_slot_lifecycle_reuses_freed_index() {
    let mut router = Router::new(2, 4, NullActuator::new(4));

    let first = join(&mut router, ClientRole::Device, "rig-a");
    let second = join(&mut router, ClientRole::Device, "rig-b");
    assert_eq!(router.counts().device, 2);

    // Pool full: a third device is turned away and nothing else moves
    let third = PeerId::new();
    router.connect(third.clone());
    let out = router.handle(
        &third,
        ClientMessage::Register {
            role: ClientRole::Device,
            name: Some("rig-c".to_string()),
        },
    );
    assert_eq!(out.len(), 1, "rejection is private to the late peer");
    assert!(matches!(
        &out[0].message,
        ServerMessage::Error {
            code: ErrorCode::CapacityExceeded,
            ..
        }
    ));
    assert_eq!(router.counts().device, 2, "existing bindings unchanged");

    // First device leaves; second keeps its index
    router.disconnect(&first);
    assert_eq!(router.roster().devices[0].name, None);
    assert_eq!(router.roster().devices[1].name.as_deref(), Some("rig-b"));

    // The rejected peer retries and claims the freed lowest index
    let out = router.handle(
        &third,
        ClientMessage::Register {
            role: ClientRole::Device,
            name: Some("rig-c".to_string()),
        },
    );
    assert!(matches!(
        messages_for(&out, &third)[0],
        ServerMessage::Registered {
            role: ClientRole::Device,
            slot: Some(0),
        }
    ));
    assert_eq!(router.roster().devices[0].name.as_deref(), Some("rig-c"));
    drop(second);
}

#[test]
fn test_command_round_trip_with_device_confirmation() {
    let mut router = Router::new(2, 4, NullActuator::new(4));
    let device = join(&mut router, ClientRole::Device, "rig");
    let ui1 = join(&mut router, ClientRole::Control, "ui1");
    let ui2 = join(&mut router, ClientRole::Control, "ui2");

    // Command goes to the bound device plus an ack to the requester
    let out = router.handle(
        &ui1,
        ClientMessage::RelayControl {
            slot: 0,
            channel: 2,
            state: true,
        },
    );
    assert!(matches!(
        messages_for(&out, &device)[0],
        ServerMessage::RelayControl {
            channel: 2,
            state: true,
        }
    ));
    assert!(matches!(
        messages_for(&out, &ui1)[0],
        ServerMessage::RelayControlResult { success: true, .. }
    ));
    assert!(
        messages_for(&out, &ui2).is_empty(),
        "no broadcast before the device confirms"
    );
    assert_eq!(
        router.snapshot()[0].get(2),
        Some(false),
        "store unchanged until confirmation"
    );

    // Device confirms; every control sees exactly one update
    let out = router.handle(
        &device,
        ClientMessage::RelayStateUpdate {
            channel: 2,
            state: true,
        },
    );
    for ui in [&ui1, &ui2] {
        let mine = messages_for(&out, ui);
        assert_eq!(mine.len(), 1, "exactly one update per control");
        assert!(matches!(
            mine[0],
            ServerMessage::RelayStateUpdate {
                slot: 0,
                channel: 2,
                state: true,
            }
        ));
    }
    assert_eq!(router.snapshot()[0].get(2), Some(true));
}

#[test]
fn test_repeated_command_is_idempotent() {
    let mut router = Router::new(1, 4, NullActuator::new(4));
    let device = join(&mut router, ClientRole::Device, "rig");
    let ui = join(&mut router, ClientRole::Control, "ui");

    let command = ClientMessage::RelayControl {
        slot: 0,
        channel: 1,
        state: true,
    };
    let first = router.handle(&ui, command.clone());
    let second = router.handle(&ui, command);

    for out in [&first, &second] {
        assert!(matches!(
            messages_for(out, &device)[0],
            ServerMessage::RelayControl {
                channel: 1,
                state: true,
            }
        ));
        assert!(matches!(
            messages_for(out, &ui)[0],
            ServerMessage::RelayControlResult { success: true, .. }
        ));
    }

    router.handle(
        &device,
        ClientMessage::RelayStateUpdate {
            channel: 1,
            state: true,
        },
    );
    router.handle(
        &device,
        ClientMessage::RelayStateUpdate {
            channel: 1,
            state: true,
        },
    );
    assert_eq!(router.snapshot()[0].get(1), Some(true));
}

#[test]
fn test_state_survives_disconnect_until_resync() {
    let mut router = Router::new(2, 4, NullActuator::new(4));
    let old = join(&mut router, ClientRole::Device, "rig-old");
    router.handle(
        &old,
        ClientMessage::RelayStateUpdate {
            channel: 3,
            state: true,
        },
    );
    router.disconnect(&old);

    // A control joining afterwards still sees the retained vector
    let ui = PeerId::new();
    router.connect(ui.clone());
    let out = router.handle(
        &ui,
        ClientMessage::Register {
            role: ClientRole::Control,
            name: None,
        },
    );
    let snapshot = messages_for(&out, &ui)
        .into_iter()
        .find_map(|message| match message {
            ServerMessage::RelayState { slots } => Some(slots.clone()),
            _ => None,
        })
        .expect("join snapshot");
    assert_eq!(snapshot[0].get(3), Some(true), "vector retained after disconnect");

    // Replacement device rebinds slot 0 and resynchronizes
    let new = join(&mut router, ClientRole::Device, "rig-new");
    let out = router.handle(
        &new,
        ClientMessage::RelayStateSync {
            states: vec![Some(false), Some(false), Some(false), Some(false)].into(),
        },
    );
    assert!(matches!(
        messages_for(&out, &ui)[0],
        ServerMessage::RelayState { .. }
    ));
    assert_eq!(router.snapshot()[0].get(3), Some(false));
}

#[test]
fn test_emergency_stop_reaches_every_connection_once() {
    let mut router = Router::new(2, 4, NullActuator::new(4));
    let rig_a = join(&mut router, ClientRole::Device, "rig-a");
    let rig_b = join(&mut router, ClientRole::Device, "rig-b");
    let ui1 = join(&mut router, ClientRole::Control, "ui1");
    let ui2 = join(&mut router, ClientRole::Control, "ui2");
    let lurker = PeerId::new();
    router.connect(lurker.clone());

    router.handle(
        &rig_a,
        ClientMessage::RelayStateUpdate {
            channel: 1,
            state: true,
        },
    );
    router.handle(
        &rig_b,
        ClientMessage::RelayStateUpdate {
            channel: 4,
            state: true,
        },
    );

    let out = router.handle(&ui1, ClientMessage::EmergencyStop);

    // Every channel of every slot is off afterwards
    for slot in router.snapshot() {
        assert_eq!(slot.as_slice(), &[false; 4]);
    }

    // Each bound device gets the stop command
    for rig in [&rig_a, &rig_b] {
        assert_eq!(
            messages_for(&out, rig)
                .iter()
                .filter(|m| matches!(m, ServerMessage::EmergencyStopAll))
                .count(),
            1
        );
    }

    // Each control gets the cleared snapshot
    for ui in [&ui1, &ui2] {
        assert!(messages_for(&out, ui).iter().any(
            |m| matches!(m, ServerMessage::RelayState { slots } if slots.iter().all(|s| s.as_slice() == [false; 4]))
        ));
    }

    // Exactly one execution notice per attached connection, lurker included
    for peer in [&rig_a, &rig_b, &ui1, &ui2, &lurker] {
        assert_eq!(
            messages_for(&out, peer)
                .iter()
                .filter(|m| matches!(m, ServerMessage::EmergencyStopExecuted { .. }))
                .count(),
            1,
            "one notice per connection"
        );
    }

    // Result goes to the originator only
    assert!(messages_for(&out, &ui1).iter().any(|m| matches!(
        m,
        ServerMessage::EmergencyStopResult {
            success: true,
            error: None,
        }
    )));
    for other in [&rig_a, &rig_b, &ui2, &lurker] {
        assert!(!messages_for(&out, other)
            .iter()
            .any(|m| matches!(m, ServerMessage::EmergencyStopResult { .. })));
    }
}

/// Actuator whose calls all fail, for exercising the failure ack path.
struct BrokenActuator {
    available: BTreeSet<u8>,
}

impl Actuator for BrokenActuator {
    fn available_channels(&self) -> &BTreeSet<u8> {
        &self.available
    }

    fn actuate(&mut self, _slot: usize, _channel: u8, _state: bool) -> Result<(), ActuationError> {
        Err(ActuationError("line stuck low".to_string()))
    }

    fn stop_all(&mut self) {}
}

#[test]
fn test_actuation_failure_acked_without_delivery() {
    let mut router = Router::new(
        1,
        4,
        BrokenActuator {
            available: (1..=4).collect(),
        },
    );
    let device = join(&mut router, ClientRole::Device, "rig");
    let ui = join(&mut router, ClientRole::Control, "ui");

    let out = router.handle(
        &ui,
        ClientMessage::RelayControl {
            slot: 0,
            channel: 1,
            state: true,
        },
    );
    assert!(messages_for(&out, &device).is_empty(), "command not forwarded");
    assert!(matches!(
        messages_for(&out, &ui)[0],
        ServerMessage::RelayControlResult {
            success: false,
            error: Some(ErrorCode::ActuationFailed),
            ..
        }
    ));
    assert_eq!(router.snapshot()[0].get(1), Some(false));
}

#[test]
fn test_membership_traffic_on_device_join_and_leave() {
    let mut router = Router::new(2, 4, NullActuator::new(4));
    let ui = join(&mut router, ClientRole::Control, "ui");

    let device = PeerId::new();
    router.connect(device.clone());
    let out = router.handle(
        &device,
        ClientMessage::Register {
            role: ClientRole::Device,
            name: Some("bench-rig".to_string()),
        },
    );
    let mine = messages_for(&out, &ui);
    assert!(mine.iter().any(|m| matches!(
        m,
        ServerMessage::DeviceConnected { slot: 0, name } if name == "bench-rig"
    )));
    assert!(mine.iter().any(|m| matches!(
        m,
        ServerMessage::ClientCount {
            control: 1,
            device: 1,
        }
    )));
    assert!(mine.iter().any(|m| matches!(
        m,
        ServerMessage::DeviceList { devices }
            if devices[0].name.as_deref() == Some("bench-rig") && devices[1].name.is_none()
    )));

    let out = router.disconnect(&device);
    let mine = messages_for(&out, &ui);
    assert!(mine.iter().any(|m| matches!(
        m,
        ServerMessage::DeviceDisconnected { slot: 0, name: Some(n) } if n == "bench-rig"
    )));
    assert!(mine.iter().any(|m| matches!(
        m,
        ServerMessage::ClientCount {
            control: 1,
            device: 0,
        }
    )));
}
