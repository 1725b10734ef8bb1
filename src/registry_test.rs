use std::cell::{Cell, RefCell};

use super::*;
use crate::bus::Topic;
use crate::frame::FrameHost;
use crate::memory::{MemoryRoom, RecordingFrame};
use crate::room::RoomPhase;

fn options() -> InsertOptions {
    InsertOptions {
        url: "https://a.example".to_owned(),
        width: 800.0,
        height: 600.0,
        display_scope_path: "/doc".to_owned(),
        use_clicker: true,
        use_selector: false,
    }
}

fn registry(policy: DuplicatePolicy) -> BridgeRegistry<MemoryRoom> {
    let config = BridgeConfig { duplicate_policy: policy, ..BridgeConfig::default() };
    BridgeRegistry::new(config, Rc::new(EventBus::new()))
}

fn record_topics(bus: &EventBus, topics: &[Topic]) -> Rc<RefCell<Vec<Topic>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    bus.on(topics, move |event| sink.borrow_mut().push(event.topic()));
    seen
}

// =============================================================
// InsertOptions
// =============================================================

#[test]
fn options_validate() {
    assert!(options().validate().is_ok());
    for bad in [
        InsertOptions { url: "  ".to_owned(), ..options() },
        InsertOptions { width: 0.0, ..options() },
        InsertOptions { height: -1.0, ..options() },
        InsertOptions { width: f64::NAN, ..options() },
        InsertOptions { display_scope_path: String::new(), ..options() },
    ] {
        assert!(matches!(bad.validate(), Err(BridgeError::InvalidOptions(_))), "{bad:?}");
    }
}

#[test]
fn options_become_attributes() {
    let attrs = options().to_attributes();
    assert_eq!(attrs.display_scope_path, "/doc");
    assert!(attrs.use_clicker);
    assert!(attrs.last_event.is_none());
}

// =============================================================
// insert
// =============================================================

#[test]
fn insert_creates_attributes_and_binds() {
    let mut registry = registry(DuplicatePolicy::ReturnExisting);
    let room = MemoryRoom::live("r1");
    let frame = RecordingFrame::new();

    let insertion = registry.insert(room.clone(), &options(), Some(frame.clone())).expect("insert");

    assert!(matches!(insertion, Insertion::Created(_)));
    assert_eq!(insertion.handle().borrow().lifecycle(), Lifecycle::Bound);
    assert!(room.bridge_attributes().is_some());
    assert_eq!(frame.source().as_deref(), Some("https://a.example"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn insert_without_element_waits_for_mount() {
    let mut registry = registry(DuplicatePolicy::ReturnExisting);
    let insertion = registry.insert(MemoryRoom::live("r1"), &options(), None).expect("insert");
    let handle = insertion.into_handle();
    assert_eq!(handle.borrow().lifecycle(), Lifecycle::Creating);

    registry.bus().emit(&BusEvent::WrapperDidMount { room_id: "r1".to_owned(), element: RecordingFrame::new() });
    assert_eq!(handle.borrow().lifecycle(), Lifecycle::Bound);
}

#[test]
fn rooms_waiting_on_one_registry_bind_separately() {
    let mut registry = registry(DuplicatePolicy::ReturnExisting);
    let a = registry.insert(MemoryRoom::live("room-a"), &options(), None).expect("insert").into_handle();
    let b = registry.insert(MemoryRoom::live("room-b"), &options(), None).expect("insert").into_handle();

    let frame_a = RecordingFrame::new();
    let delivered =
        registry.bus().emit(&BusEvent::WrapperDidMount { room_id: "room-a".to_owned(), element: frame_a.clone() });

    assert_eq!(delivered, 1);
    assert_eq!(a.borrow().lifecycle(), Lifecycle::Bound);
    assert_eq!(b.borrow().lifecycle(), Lifecycle::Creating);
    assert!(b.borrow().frame().is_none());
    assert_eq!(frame_a.source_writes(), 1);
}

#[test]
fn duplicate_insert_returns_existing() {
    let mut registry = registry(DuplicatePolicy::ReturnExisting);
    let room = MemoryRoom::live("r1");
    let first = registry.insert(room.clone(), &options(), Some(RecordingFrame::new())).expect("insert");
    let second = registry.insert(room, &options(), Some(RecordingFrame::new())).expect("insert");

    assert!(matches!(second, Insertion::Existing(_)));
    assert!(Rc::ptr_eq(first.handle(), second.handle()));
    assert_eq!(registry.len(), 1);
}

#[test]
fn duplicate_insert_rejected_by_policy() {
    let mut registry = registry(DuplicatePolicy::Reject);
    let room = MemoryRoom::live("r1");
    registry.insert(room.clone(), &options(), None).expect("insert");
    let err = registry.insert(room, &options(), None).unwrap_err();
    assert!(matches!(err, BridgeError::AlreadyInserted { ref room_id } if room_id == "r1"));
}

#[test]
fn invalid_options_create_nothing() {
    let mut registry = registry(DuplicatePolicy::ReturnExisting);
    let room = MemoryRoom::live("r1");
    let bad = InsertOptions { width: 0.0, ..options() };
    assert!(registry.insert(room.clone(), &bad, None).is_err());
    assert!(room.bridge_attributes().is_none());
    assert!(registry.is_empty());
}

#[test]
fn insert_into_room_with_attributes_attaches() {
    let mut owner = registry(DuplicatePolicy::ReturnExisting);
    let room = MemoryRoom::live("r1");
    owner.insert(room.clone(), &options(), None).expect("insert");

    let mut joiner = registry(DuplicatePolicy::ReturnExisting);
    let other_options = InsertOptions { url: "https://ignored.example".to_owned(), ..options() };
    let insertion = joiner.insert(room.clone(), &other_options, None).expect("insert");

    assert!(matches!(insertion, Insertion::Attached(_)));
    let attrs = insertion.handle().borrow().attributes().expect("attrs");
    assert_eq!(attrs.url, "https://a.example");
}

// =============================================================
// attach
// =============================================================

#[test]
fn attach_announces_start_and_end() {
    let room = MemoryRoom::live("r1");
    registry(DuplicatePolicy::ReturnExisting).insert(room.clone(), &options(), None).expect("insert");

    let mut joiner = registry(DuplicatePolicy::ReturnExisting);
    let seen = record_topics(joiner.bus(), &[Topic::StartCreate, Topic::OnCreate]);
    joiner.attach(room, Some(RecordingFrame::new())).expect("attach");

    assert_eq!(*seen.borrow(), vec![Topic::StartCreate, Topic::OnCreate]);
}

#[test]
fn attach_without_attributes_fails() {
    let mut registry = registry(DuplicatePolicy::ReturnExisting);
    let err = registry.attach(MemoryRoom::live("r1"), None).unwrap_err();
    assert!(matches!(err, BridgeError::MissingAttributes));
    assert!(registry.get("r1").is_none());
}

#[test]
fn attach_in_replay_writes_nothing() {
    let room = MemoryRoom::replay("r1");
    let mut writer = room.clone();
    create_attributes(&mut writer, &options().to_attributes()).expect("create");
    let before = room.bridge_attributes();

    let mut registry = registry(DuplicatePolicy::ReturnExisting);
    registry.attach(room.clone(), Some(RecordingFrame::new())).expect("attach");

    assert_eq!(room.bridge_attributes(), before);
    assert_eq!(room.broadcast_count(), 0);
}

// =============================================================
// remove
// =============================================================

#[test]
fn remove_destroys_and_deletes_attributes() {
    let mut registry = registry(DuplicatePolicy::ReturnExisting);
    let room = MemoryRoom::live("r1");
    let handle = registry.insert(room.clone(), &options(), Some(RecordingFrame::new())).expect("insert").into_handle();

    assert!(registry.remove("r1"));
    assert!(!registry.remove("r1"));

    assert_eq!(handle.borrow().lifecycle(), Lifecycle::Destroyed);
    assert!(room.bridge_attributes().is_none());
    assert_eq!(room.bridge_removals(), 1);
    assert!(registry.get("r1").is_none());
}

#[test]
fn remove_runs_host_teardown() {
    let mut registry = registry(DuplicatePolicy::ReturnExisting);
    let handle =
        registry.insert(MemoryRoom::live("r1"), &options(), Some(RecordingFrame::new())).expect("insert").into_handle();
    let detached = Rc::new(Cell::new(false));
    let flag = Rc::clone(&detached);
    handle.borrow_mut().on_destroy(move || flag.set(true));

    assert!(registry.remove("r1"));
    assert!(detached.get());
}

#[test]
fn readonly_remove_keeps_shared_attributes() {
    let mut registry = registry(DuplicatePolicy::ReturnExisting);
    let room = MemoryRoom::live("r1");
    registry.insert(room.clone(), &options(), None).expect("insert");
    room.set_phase(RoomPhase::Disconnected);

    assert!(registry.remove("r1"));
    assert!(room.bridge_attributes().is_some());
}

#[test]
fn destroyed_bridge_can_be_recreated() {
    let mut registry = registry(DuplicatePolicy::Reject);
    let room = MemoryRoom::live("r1");
    let first = registry.insert(room.clone(), &options(), None).expect("insert").into_handle();
    first.borrow_mut().destroy();

    let second = registry.insert(room, &options(), None).expect("reinsert");
    assert!(!Rc::ptr_eq(&first, second.handle()));
    assert_eq!(registry.len(), 1);
}
