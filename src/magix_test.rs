use serde_json::json;

use super::*;
use crate::attributes::{BridgeAttributes, create_attributes, read_attributes};
use crate::events::EventKind;
use crate::memory::{MemoryRoom, RecordingFrame};

const REMOTE: ObserverId = 99;

fn room_with_bridge() -> MemoryRoom {
    let mut room = MemoryRoom::live("r1");
    let attrs = BridgeAttributes {
        url: "https://a.example".to_owned(),
        width: 800.0,
        height: 600.0,
        display_scope_path: "/doc".to_owned(),
        last_event: None,
        use_clicker: false,
        use_selector: false,
    };
    create_attributes(&mut room, &attrs).expect("create");
    room
}

// =============================================================
// register / unregister
// =============================================================

#[test]
fn registered_event_is_relayed_to_frame() {
    let mut room = room_with_bridge();
    let frame = RecordingFrame::new();
    let mut relay = MagixRelay::new();
    relay.register(&mut room, "tick", frame.clone());

    room.receive_remote("tick", json!({ "n": 1 }), REMOTE);

    let posted = frame.posted();
    assert_eq!(posted.len(), 1);
    let OutboundMessage::ReceiveMagixEvent(event) = &posted[0] else {
        panic!("expected relayed event, got {:?}", posted[0]);
    };
    assert_eq!(event.event, "tick");
    assert_eq!(event.author_id, Some(REMOTE));
}

#[test]
fn own_events_are_not_echoed() {
    let mut room = room_with_bridge();
    let frame = RecordingFrame::new();
    let mut relay = MagixRelay::new();
    relay.register(&mut room, "tick", frame.clone());

    let own = room.observer_id();
    room.receive_remote("tick", json!({}), own);

    assert!(frame.posted().is_empty());
}

#[test]
fn other_event_names_are_not_relayed() {
    let mut room = room_with_bridge();
    let frame = RecordingFrame::new();
    let mut relay = MagixRelay::new();
    relay.register(&mut room, "tick", frame.clone());

    room.receive_remote("tock", json!({}), REMOTE);

    assert!(frame.posted().is_empty());
}

#[test]
fn re_registering_replaces_listener() {
    let mut room = room_with_bridge();
    let frame = RecordingFrame::new();
    let mut relay = MagixRelay::new();
    relay.register(&mut room, "tick", frame.clone());
    relay.register(&mut room, "tick", frame.clone());

    assert_eq!(relay.len(), 1);
    assert_eq!(room.magix_listener_count("tick"), 1);

    room.receive_remote("tick", json!({}), REMOTE);
    assert_eq!(frame.posted_kinds(), vec![EventKind::ReceiveMagixEvent]);
}

#[test]
fn unregister_detaches_listener() {
    let mut room = room_with_bridge();
    let frame = RecordingFrame::new();
    let mut relay = MagixRelay::new();
    relay.register(&mut room, "tick", frame.clone());

    assert!(relay.unregister(&mut room, "tick"));
    assert!(!relay.is_registered("tick"));
    assert_eq!(room.magix_listener_count("tick"), 0);

    room.receive_remote("tick", json!({}), REMOTE);
    assert!(frame.posted().is_empty());
}

#[test]
fn unregister_unknown_is_noop() {
    let mut room = room_with_bridge();
    let mut relay = MagixRelay::new();
    assert!(!relay.unregister(&mut room, "missing"));
    assert!(relay.is_empty());
}

#[test]
fn unregister_all_silences_every_event() {
    let mut room = room_with_bridge();
    let frame = RecordingFrame::new();
    let mut relay = MagixRelay::new();
    relay.register(&mut room, "a", frame.clone());
    relay.register(&mut room, "b", frame.clone());
    relay.register(&mut room, "c", frame.clone());

    assert_eq!(relay.unregister_all(&mut room), 3);
    assert!(relay.is_empty());
    assert_eq!(room.total_magix_listeners(), 0);

    for name in ["a", "b", "c"] {
        room.receive_remote(name, json!({}), REMOTE);
    }
    assert!(frame.posted().is_empty());
}

// =============================================================
// dispatch
// =============================================================

#[test]
fn dispatch_broadcasts_and_records_last_event() {
    let mut room = room_with_bridge();
    assert!(dispatch(&mut room, "tick", json!({ "n": 3 })).expect("dispatch"));

    assert_eq!(room.broadcasts(), vec![("tick".to_owned(), json!({ "n": 3 }))]);
    let last = read_attributes(&room).expect("read").last_event.expect("last event");
    assert_eq!(last.name, "tick");
    assert_eq!(last.payload, json!({ "n": 3 }));
}

#[test]
fn dispatch_in_replay_never_broadcasts() {
    let mut room = MemoryRoom::replay("r1");
    for payload in [json!(null), json!(1), json!({ "deep": [1, 2, 3] })] {
        assert!(!dispatch(&mut room, "tick", payload).expect("dispatch"));
    }
    assert_eq!(room.broadcast_count(), 0);
}

#[test]
fn dispatch_readonly_is_dropped() {
    let mut room = room_with_bridge();
    room.set_writable(false);
    assert!(!dispatch(&mut room, "tick", json!({})).expect("dispatch"));
    assert_eq!(room.broadcast_count(), 0);
    assert!(read_attributes(&room).expect("read").last_event.is_none());
}
