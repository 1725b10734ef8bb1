use serde_json::json;

use super::*;

#[test]
fn live_room_is_operable() {
    let room = MemoryRoom::live("r1");
    assert!(crate::room::can_operate(&room));
    assert_eq!(room.player_phase(), None);
    assert_eq!(room.disable_device_inputs(), Some(false));
    assert_eq!(room.scene_path(), DEFAULT_SCENE_PATH);
}

#[test]
fn replay_has_no_input_switch() {
    let room = MemoryRoom::replay("r1");
    assert!(!crate::room::can_operate(&room));
    assert_eq!(room.player_phase(), Some(PlayerPhase::WaitingFirstFrame));
    assert_eq!(room.disable_device_inputs(), None);
    assert!(room.state().member_state.is_none());
}

#[test]
fn clones_share_state() {
    let room = MemoryRoom::live("r1");
    let other = room.clone();
    other.set_writable(false);
    assert!(!room.is_writable());
}

#[test]
fn attribute_updates_merge_shallowly() {
    let mut room = MemoryRoom::live("r1");
    room.create_bridge(json!({ "url": "a", "width": 1 }));
    room.update_bridge_attributes(json!({ "width": 2, "extra": true }));
    assert_eq!(room.bridge_attributes(), Some(json!({ "url": "a", "width": 2, "extra": true })));
}

#[test]
fn update_without_bridge_is_ignored() {
    let mut room = MemoryRoom::live("r1");
    room.update_bridge_attributes(json!({ "width": 2 }));
    assert!(room.bridge_attributes().is_none());
}

#[test]
fn open_scene_tracks_index_in_directory() {
    let room = MemoryRoom::live("r1");
    room.add_scenes("/doc", &["a".to_owned(), "b".to_owned(), "c".to_owned()]);
    let delta = room.open_scene("/doc/b");
    assert_eq!(room.scene_index(), 1);
    let scene = delta.scene_state.expect("scene delta");
    assert_eq!(scene.scenes.len(), 3);
    assert_eq!(scene.scene_path, "/doc/b");
}

#[test]
fn set_scene_index_moves_path() {
    let mut room = MemoryRoom::live("r1");
    room.add_scenes("/doc", &["1".to_owned(), "2".to_owned()]);
    room.open_scene("/doc/1");
    room.set_scene_index(1);
    assert_eq!(room.scene_path(), "/doc/2");
    assert_eq!(room.scene_index_writes(), vec![1]);
}

#[test]
fn dispatch_echoes_with_local_author() {
    let mut room = MemoryRoom::live("r1");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    room.add_magix_listener("tick", Box::new(move |event: &MagixEvent| sink.borrow_mut().push(event.author_id)));

    room.dispatch_magix_event("tick", json!(1));

    assert_eq!(*seen.borrow(), vec![Some(room.observer_id())]);
    assert_eq!(room.broadcasts(), vec![("tick".to_owned(), json!(1))]);
}

#[test]
fn removed_listener_stops_receiving() {
    let mut room = MemoryRoom::live("r1");
    let id = room.add_magix_listener("tick", Box::new(|_: &MagixEvent| {}));
    assert_eq!(room.receive_remote("tick", json!(null), 7), 1);
    room.remove_magix_listener("tick", id);
    assert_eq!(room.receive_remote("tick", json!(null), 7), 0);
    assert_eq!(room.total_magix_listeners(), 0);
}

#[test]
fn callbacks_register_symmetrically() {
    let mut room = MemoryRoom::live("r1");
    let id = room.add_callback(Callback::RoomStateChanged);
    assert!(room.has_callback(Callback::RoomStateChanged));
    room.remove_callback(id);
    assert_eq!(room.callback_count(), 0);
}

#[test]
fn recording_frame_records_calls() {
    let frame = RecordingFrame::new();
    frame.set_source("https://a.example");
    frame.set_size(10.0, 20.0);
    frame.set_visible(false);
    assert_eq!(frame.source_writes(), 1);
    assert_eq!(frame.size(), Some((10.0, 20.0)));
    assert_eq!(frame.visible(), Some(false));
    assert!(frame.take_posted().is_empty());
}
