//! In-memory room and frame.
//!
//! [`MemoryRoom`] is a complete [`Room`] kept in process memory: replicated
//! attributes, scene directories, the custom event bus and callback
//! registrations. It backs the simulator CLI and every bridge test.
//! [`RecordingFrame`] is a [`FrameHost`] that records what the bridge did to
//! it instead of touching a DOM.
//!
//! Both are cheap handles (`Rc` inside), so a test can keep one clone for
//! scripting while the bridge owns another.

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde_json::Value;
use uuid::Uuid;

use crate::camera::CameraState;
use crate::events::{EventKind, OutboundMessage};
use crate::frame::FrameHost;
use crate::room::{
    Callback, CameraBound, DisplayerMode, DisplayerState, ListenerId, MagixEvent, MagixListener, MemberState,
    ObserverId, PlayerPhase, Room, RoomPhase, SceneDescriptor, SceneState, StateDelta,
};

/// Scene every fresh room opens on.
pub const DEFAULT_SCENE_PATH: &str = "/init";

const LOCAL_OBSERVER: ObserverId = 1;

struct RoomInner {
    mode: DisplayerMode,
    observer: ObserverId,
    writable: bool,
    phase: RoomPhase,
    player_phase: Option<PlayerPhase>,
    disable_device_inputs: Option<bool>,
    camera: CameraState,
    member: Option<MemberState>,
    scene_path: String,
    scene_index: usize,
    scenes: BTreeMap<String, Vec<String>>,
    attributes: Option<Value>,
    magix: HashMap<String, Vec<(ListenerId, MagixListener)>>,
    callbacks: Vec<(ListenerId, Callback)>,
    broadcasts: Vec<(String, Value)>,
    camera_fits: Vec<CameraBound>,
    scene_index_writes: Vec<usize>,
    bridge_removals: usize,
}

impl RoomInner {
    fn new(mode: DisplayerMode) -> Self {
        let live = mode == DisplayerMode::Live;
        let mut scenes = BTreeMap::new();
        scenes.insert("/".to_owned(), vec!["init".to_owned()]);
        Self {
            mode,
            observer: LOCAL_OBSERVER,
            writable: live,
            phase: RoomPhase::Connected,
            player_phase: if live { None } else { Some(PlayerPhase::WaitingFirstFrame) },
            disable_device_inputs: if live { Some(false) } else { None },
            camera: CameraState { width: 1280.0, height: 720.0, ..CameraState::default() },
            member: live.then(|| MemberState { current_appliance_name: "pencil".to_owned() }),
            scene_path: DEFAULT_SCENE_PATH.to_owned(),
            scene_index: 0,
            scenes,
            attributes: None,
            magix: HashMap::new(),
            callbacks: Vec::new(),
            broadcasts: Vec::new(),
            camera_fits: Vec::new(),
            scene_index_writes: Vec::new(),
            bridge_removals: 0,
        }
    }

    fn current_dir(&self) -> String {
        split_scene_path(&self.scene_path).0
    }

    fn scene_state(&self) -> SceneState {
        let scenes = self
            .scenes
            .get(&self.current_dir())
            .map(|names| names.iter().map(|name| SceneDescriptor { name: name.clone() }).collect())
            .unwrap_or_default();
        SceneState { scene_path: self.scene_path.clone(), index: self.scene_index, scenes }
    }

    fn open(&mut self, path: &str) {
        let (dir, name) = split_scene_path(path);
        self.scene_index = self
            .scenes
            .get(&dir)
            .and_then(|names| names.iter().position(|n| *n == name))
            .unwrap_or(0);
        self.scene_path = path.to_owned();
    }
}

/// Split `/dir/name` into (`/dir`, `name`). Top-level scenes live in `/`.
fn split_scene_path(path: &str) -> (String, String) {
    match path.rsplit_once('/') {
        Some(("", name)) => ("/".to_owned(), name.to_owned()),
        Some((dir, name)) => (dir.to_owned(), name.to_owned()),
        None => ("/".to_owned(), path.to_owned()),
    }
}

/// A live room or replay player held entirely in memory.
#[derive(Clone)]
pub struct MemoryRoom {
    id: Rc<str>,
    inner: Rc<RefCell<RoomInner>>,
}

impl std::fmt::Debug for MemoryRoom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("MemoryRoom")
            .field("id", &self.id)
            .field("mode", &inner.mode)
            .field("scene_path", &inner.scene_path)
            .finish_non_exhaustive()
    }
}

impl MemoryRoom {
    fn with_mode(id: &str, mode: DisplayerMode) -> Self {
        Self { id: Rc::from(id), inner: Rc::new(RefCell::new(RoomInner::new(mode))) }
    }

    /// A connected, writable live room.
    #[must_use]
    pub fn live(id: &str) -> Self {
        Self::with_mode(id, DisplayerMode::Live)
    }

    /// A replay player waiting for its first frame.
    #[must_use]
    pub fn replay(id: &str) -> Self {
        Self::with_mode(id, DisplayerMode::Replay)
    }

    // --- Scripting ---

    pub fn set_writable(&self, writable: bool) {
        self.inner.borrow_mut().writable = writable;
    }

    pub fn set_phase(&self, phase: RoomPhase) {
        self.inner.borrow_mut().phase = phase;
    }

    pub fn set_player_phase(&self, phase: PlayerPhase) {
        self.inner.borrow_mut().player_phase = Some(phase);
    }

    pub fn set_disable_device_inputs(&self, disabled: bool) {
        self.inner.borrow_mut().disable_device_inputs = Some(disabled);
    }

    /// Move the camera. Returns the delta the room would report.
    pub fn set_camera(&self, camera: CameraState) -> StateDelta {
        self.inner.borrow_mut().camera = camera;
        StateDelta { camera_state: Some(camera), ..StateDelta::default() }
    }

    /// Switch the local member's tool. Returns the delta the room would report.
    pub fn set_tool(&self, tool: &str) -> StateDelta {
        let member = MemberState { current_appliance_name: tool.to_owned() };
        self.inner.borrow_mut().member = Some(member.clone());
        StateDelta { member_state: Some(member), ..StateDelta::default() }
    }

    /// Append scenes to a directory, creating it when missing.
    pub fn add_scenes(&self, dir: &str, names: &[String]) {
        self.inner.borrow_mut().scenes.entry(dir.to_owned()).or_default().extend_from_slice(names);
    }

    /// Open a scene by full path. Returns the delta the room would report.
    pub fn open_scene(&self, path: &str) -> StateDelta {
        let mut inner = self.inner.borrow_mut();
        inner.open(path);
        StateDelta { scene_state: Some(inner.scene_state()), ..StateDelta::default() }
    }

    /// Deliver a broadcast from another participant to the magix listeners.
    /// Returns how many listeners saw it.
    pub fn receive_remote(&self, event: &str, payload: Value, author: ObserverId) -> usize {
        self.fan_out(&MagixEvent { event: event.to_owned(), payload, author_id: Some(author) })
    }

    fn fan_out(&self, event: &MagixEvent) -> usize {
        // Listeners are taken out for the call so they may re-enter the room.
        let Some(mut listeners) = self.inner.borrow_mut().magix.remove(&event.event) else {
            return 0;
        };
        for (_, listener) in &mut listeners {
            listener(event);
        }
        let delivered = listeners.len();
        let mut inner = self.inner.borrow_mut();
        let slot = inner.magix.entry(event.event.clone()).or_default();
        listeners.append(slot);
        *slot = listeners;
        delivered
    }

    // --- Inspection ---

    /// Every custom event broadcast through the room, in order.
    #[must_use]
    pub fn broadcasts(&self) -> Vec<(String, Value)> {
        self.inner.borrow().broadcasts.clone()
    }

    #[must_use]
    pub fn broadcast_count(&self) -> usize {
        self.inner.borrow().broadcasts.len()
    }

    #[must_use]
    pub fn magix_listener_count(&self, event: &str) -> usize {
        self.inner.borrow().magix.get(event).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn total_magix_listeners(&self) -> usize {
        self.inner.borrow().magix.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.inner.borrow().callbacks.len()
    }

    #[must_use]
    pub fn has_callback(&self, callback: Callback) -> bool {
        self.inner.borrow().callbacks.iter().any(|(_, c)| *c == callback)
    }

    /// Camera fits requested through [`Room::move_camera_to_contain`].
    #[must_use]
    pub fn camera_fits(&self) -> Vec<CameraBound> {
        self.inner.borrow().camera_fits.clone()
    }

    #[must_use]
    pub fn scene_index(&self) -> usize {
        self.inner.borrow().scene_index
    }

    /// Indexes written through [`Room::set_scene_index`], in order.
    #[must_use]
    pub fn scene_index_writes(&self) -> Vec<usize> {
        self.inner.borrow().scene_index_writes.clone()
    }

    #[must_use]
    pub fn scene_path(&self) -> String {
        self.inner.borrow().scene_path.clone()
    }

    #[must_use]
    pub fn bridge_removals(&self) -> usize {
        self.inner.borrow().bridge_removals
    }
}

impl Room for MemoryRoom {
    fn room_id(&self) -> &str {
        &self.id
    }

    fn mode(&self) -> DisplayerMode {
        self.inner.borrow().mode
    }

    fn observer_id(&self) -> ObserverId {
        self.inner.borrow().observer
    }

    fn is_writable(&self) -> bool {
        self.inner.borrow().writable
    }

    fn phase(&self) -> RoomPhase {
        self.inner.borrow().phase
    }

    fn player_phase(&self) -> Option<PlayerPhase> {
        self.inner.borrow().player_phase
    }

    fn disable_device_inputs(&self) -> Option<bool> {
        self.inner.borrow().disable_device_inputs
    }

    fn state(&self) -> DisplayerState {
        let inner = self.inner.borrow();
        DisplayerState { camera_state: inner.camera, scene_state: inner.scene_state(), member_state: inner.member.clone() }
    }

    fn bridge_attributes(&self) -> Option<Value> {
        self.inner.borrow().attributes.clone()
    }

    fn create_bridge(&mut self, attributes: Value) {
        self.inner.borrow_mut().attributes = Some(attributes);
    }

    fn update_bridge_attributes(&mut self, patch: Value) {
        let mut inner = self.inner.borrow_mut();
        let Some(Value::Object(current)) = inner.attributes.as_mut() else {
            return;
        };
        if let Value::Object(fields) = patch {
            current.extend(fields);
        }
    }

    fn remove_bridge(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.attributes = None;
        inner.bridge_removals += 1;
    }

    fn scenes_in(&self, dir: &str) -> Option<Vec<String>> {
        self.inner.borrow().scenes.get(dir).cloned()
    }

    fn put_scenes(&mut self, dir: &str, names: &[String]) {
        self.inner.borrow_mut().scenes.insert(dir.to_owned(), names.to_vec());
    }

    fn set_scene_path(&mut self, path: &str) {
        self.inner.borrow_mut().open(path);
    }

    fn set_scene_index(&mut self, index: usize) {
        let mut inner = self.inner.borrow_mut();
        inner.scene_index_writes.push(index);
        let dir = inner.current_dir();
        let name = inner.scenes.get(&dir).and_then(|names| names.get(index)).cloned();
        if let Some(name) = name {
            inner.scene_path = if dir == "/" { format!("/{name}") } else { format!("{dir}/{name}") };
        }
        inner.scene_index = index;
    }

    fn move_camera_to_contain(&mut self, bound: CameraBound) {
        self.inner.borrow_mut().camera_fits.push(bound);
    }

    fn dispatch_magix_event(&mut self, event: &str, payload: Value) {
        let observer = {
            let mut inner = self.inner.borrow_mut();
            inner.broadcasts.push((event.to_owned(), payload.clone()));
            inner.observer
        };
        self.fan_out(&MagixEvent { event: event.to_owned(), payload, author_id: Some(observer) });
    }

    fn add_magix_listener(&mut self, event: &str, listener: MagixListener) -> ListenerId {
        let id = Uuid::new_v4();
        self.inner.borrow_mut().magix.entry(event.to_owned()).or_default().push((id, listener));
        id
    }

    fn remove_magix_listener(&mut self, event: &str, id: ListenerId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(listeners) = inner.magix.get_mut(event) {
            listeners.retain(|(listener_id, _)| *listener_id != id);
            if listeners.is_empty() {
                inner.magix.remove(event);
            }
        }
    }

    fn add_callback(&mut self, callback: Callback) -> ListenerId {
        let id = Uuid::new_v4();
        self.inner.borrow_mut().callbacks.push((id, callback));
        id
    }

    fn remove_callback(&mut self, id: ListenerId) {
        self.inner.borrow_mut().callbacks.retain(|(callback_id, _)| *callback_id != id);
    }
}

// =============================================================================
// RecordingFrame
// =============================================================================

/// A hosting element that records every call.
#[derive(Debug, Default)]
pub struct RecordingFrame {
    source: RefCell<Option<String>>,
    source_writes: Cell<usize>,
    size: Cell<Option<(f64, f64)>>,
    style: RefCell<Option<String>>,
    visible: Cell<Option<bool>>,
    posted: RefCell<Vec<OutboundMessage>>,
}

impl RecordingFrame {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Messages posted into the iframe, in order.
    #[must_use]
    pub fn posted(&self) -> Vec<OutboundMessage> {
        self.posted.borrow().clone()
    }

    #[must_use]
    pub fn posted_kinds(&self) -> Vec<EventKind> {
        self.posted.borrow().iter().map(OutboundMessage::kind).collect()
    }

    /// Drain the posted messages.
    pub fn take_posted(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.posted.borrow_mut())
    }

    #[must_use]
    pub fn style(&self) -> Option<String> {
        self.style.borrow().clone()
    }

    /// Last visibility set, `None` when never set.
    #[must_use]
    pub fn visible(&self) -> Option<bool> {
        self.visible.get()
    }

    #[must_use]
    pub fn size(&self) -> Option<(f64, f64)> {
        self.size.get()
    }

    #[must_use]
    pub fn source_writes(&self) -> usize {
        self.source_writes.get()
    }
}

impl FrameHost for RecordingFrame {
    fn source(&self) -> Option<String> {
        self.source.borrow().clone()
    }

    fn set_source(&self, url: &str) {
        *self.source.borrow_mut() = Some(url.to_owned());
        self.source_writes.set(self.source_writes.get() + 1);
    }

    fn set_size(&self, width: f64, height: f64) {
        self.size.set(Some((width, height)));
    }

    fn set_style(&self, css: &str) {
        *self.style.borrow_mut() = Some(css.to_owned());
    }

    fn set_visible(&self, visible: bool) {
        self.visible.set(Some(visible));
    }

    fn post_message(&self, message: &OutboundMessage) {
        self.posted.borrow_mut().push(message.clone());
    }
}
