//! Host room interface.
//!
//! DESIGN
//! ======
//! The whiteboard SDK (state replication, camera, scenes, the custom event
//! bus) is an external collaborator. The bridge consumes it only through the
//! [`Room`] trait, implemented by the host glue for a live room or a replay
//! player.
//!
//! Listener registration is explicit and token-based: every `add_*` call
//! returns a [`ListenerId`] that must be handed back to the matching
//! `remove_*` call. State-change callbacks are delivered by the host calling
//! into the bridge; magix listeners are closures owned by the room until
//! removed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::camera::CameraState;

/// Stable per-session identifier of the local participant.
pub type ObserverId = u64;

/// Token returned by listener registration, used to unregister symmetrically.
pub type ListenerId = Uuid;

/// Listener closure invoked by the room for each broadcast of a custom event.
pub type MagixListener = Box<dyn FnMut(&MagixEvent)>;

/// Whether the displayer is a live room or a read-only replay player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayerMode {
    Live,
    Replay,
}

/// Connection phase of a live room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomPhase {
    Connecting,
    Connected,
    Reconnecting,
    Disconnecting,
    Disconnected,
}

/// Playback phase of a replay player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerPhase {
    WaitingFirstFrame,
    Playing,
    Pause,
    Stopped,
    Ended,
    Buffering,
}

/// Host callbacks the bridge subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
    /// `onRoomStateChanged`, live rooms.
    RoomStateChanged,
    /// `onPlayerStateChanged`, replay players.
    PlayerStateChanged,
    /// `onPhaseChanged`, replay players.
    PhaseChanged,
}

impl Callback {
    /// SDK callback name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoomStateChanged => "onRoomStateChanged",
            Self::PlayerStateChanged => "onPlayerStateChanged",
            Self::PhaseChanged => "onPhaseChanged",
        }
    }

    /// The state-change callback for a displayer mode.
    #[must_use]
    pub fn state_changed(mode: DisplayerMode) -> Self {
        match mode {
            DisplayerMode::Live => Self::RoomStateChanged,
            DisplayerMode::Replay => Self::PlayerStateChanged,
        }
    }
}

/// A single scene inside a scene directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneDescriptor {
    pub name: String,
}

/// Scene (page) state of the displayer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneState {
    /// Full path of the current scene, e.g. `/doc/3`.
    pub scene_path: String,
    /// Index of the current scene inside its directory.
    pub index: usize,
    /// Scenes of the current directory.
    #[serde(default)]
    pub scenes: Vec<SceneDescriptor>,
}

/// Tool state of the local member.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberState {
    #[serde(default)]
    pub current_appliance_name: String,
}

/// Full displayer state snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayerState {
    pub camera_state: CameraState,
    pub scene_state: SceneState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_state: Option<MemberState>,
}

/// Partial state as delivered by a state-change callback.
///
/// Unrecognized keys are kept in `other` so the delta can be forwarded to the
/// iframe unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_state: Option<CameraState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_state: Option<SceneState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_state: Option<MemberState>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A custom (magix) event as broadcast through the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagixEvent {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    /// Author of the broadcast. Absent for events replayed from attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<ObserverId>,
}

/// How the camera moves when fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnimationMode {
    #[default]
    Immediately,
    Continuous,
}

/// World-space rectangle the camera should contain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraBound {
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
    pub animation_mode: AnimationMode,
}

/// The host room or replay player.
pub trait Room {
    /// Identifier of the room, unique per host process.
    fn room_id(&self) -> &str;

    fn mode(&self) -> DisplayerMode;

    fn observer_id(&self) -> ObserverId;

    /// Whether the local participant may write to the room.
    fn is_writable(&self) -> bool;

    /// Connection phase. Meaningful for live rooms only.
    fn phase(&self) -> RoomPhase;

    /// Playback phase. `None` for live rooms.
    fn player_phase(&self) -> Option<PlayerPhase>;

    /// Whether device input is globally disabled. `None` when the displayer
    /// has no such switch (replay players), which counts as disabled.
    fn disable_device_inputs(&self) -> Option<bool>;

    fn state(&self) -> DisplayerState;

    // --- Replicated bridge attributes ---

    /// Raw replicated bridge attributes, `None` when no bridge was created in the room.
    fn bridge_attributes(&self) -> Option<Value>;

    /// Create the bridge's replicated attributes.
    fn create_bridge(&mut self, attributes: Value);

    /// Shallow-merge a partial update into the replicated attributes.
    fn update_bridge_attributes(&mut self, patch: Value);

    /// Remove the bridge and its attributes from the room.
    fn remove_bridge(&mut self);

    // --- Scenes and camera ---

    /// Scene names under a directory, `None` when the directory does not exist.
    fn scenes_in(&self, dir: &str) -> Option<Vec<String>>;

    fn put_scenes(&mut self, dir: &str, names: &[String]);

    fn set_scene_path(&mut self, path: &str);

    fn set_scene_index(&mut self, index: usize);

    fn move_camera_to_contain(&mut self, bound: CameraBound);

    // --- Custom events ---

    fn dispatch_magix_event(&mut self, event: &str, payload: Value);

    fn add_magix_listener(&mut self, event: &str, listener: MagixListener) -> ListenerId;

    fn remove_magix_listener(&mut self, event: &str, id: ListenerId);

    // --- Callbacks ---

    fn add_callback(&mut self, callback: Callback) -> ListenerId;

    fn remove_callback(&mut self, id: ListenerId);
}

/// The write-permission gate: not replay, writable, and connected.
#[must_use]
pub fn can_operate<R: Room + ?Sized>(room: &R) -> bool {
    room.mode() == DisplayerMode::Live && room.is_writable() && room.phase() == RoomPhase::Connected
}

/// Device input counts as disabled when the displayer does not expose the switch.
#[must_use]
pub fn input_disabled<R: Room + ?Sized>(room: &R) -> bool {
    room.disable_device_inputs().unwrap_or(true)
}
