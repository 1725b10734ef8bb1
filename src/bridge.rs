//! Bridge controller: binds one iframe to one room and keeps them in sync.
//!
//! ARCHITECTURE
//! ============
//! The controller is sans-IO. The host feeds it events through the
//! `handle_*` methods (room callbacks, iframe `load`, window `message`) and it
//! answers by driving the [`Room`] and the [`FrameHost`](crate::frame::FrameHost). Nothing here waits.
//!
//! Lifecycle:
//!
//! ```text
//! Creating ──bind──▶ Bound ──destroy──▶ Destroyed
//!     └──────────────destroy──────────────┘
//! ```
//!
//! `Bound` carries a visibility sub-state decided by the visibility gate. The
//! displayer mode (live or replay) is fixed when the bridge is built.
//!
//! A bridge is shared as a [`BridgeHandle`]. Bus handlers installed by the
//! bridge listen to their own room only, hold a weak reference to it and only
//! touch it through `try_borrow*`, so a signal emitted while the bridge is
//! busy is logged, never a panic. Host-side listeners (window `message`,
//! iframe `load`) are registered with [`IframeBridge::on_destroy`] and removed
//! by [`IframeBridge::destroy`].

#[cfg(test)]
#[path = "bridge_test.rs"]
mod bridge_test;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::attributes::{AttributesPatch, BridgeAttributes, read_attributes, write_attributes};
use crate::bus::{BusEvent, EventBus, SubscriptionId, Topic};
use crate::camera::CameraState;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::events::{EventKind, InboundMessage, InitPayload, MessageError, OutboundMessage};
use crate::frame::{FrameElement, expected_origin, same_source};
use crate::geometry::{StackingInput, compute_transform, stacking_for};
use crate::magix::{self, MagixRelay};
use crate::pages;
use crate::room::{
    AnimationMode, Callback, CameraBound, DisplayerMode, ListenerId, MagixEvent, MemberState, PlayerPhase, Room,
    StateDelta, input_disabled,
};
use crate::visibility::{self, Visibility};

/// Shared handle to a bridge.
pub type BridgeHandle<R> = Rc<RefCell<IframeBridge<R>>>;

type TeardownHook = Box<dyn FnOnce()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Built, waiting for the hosting element.
    Creating,
    /// Attached to an element and synchronizing.
    Bound,
    Destroyed,
}

/// Outcome of [`IframeBridge::handle_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The message reached the handler for its kind.
    Handled(EventKind),
    Ignored(IgnoreReason),
}

/// Why an inbound message was dropped before reaching a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No element is bound.
    NotBound,
    /// The sender is not the iframe's current source origin.
    OriginMismatch,
    UnknownKind,
    /// Not an envelope, or the payload does not fit the kind.
    Malformed,
}

pub struct IframeBridge<R: Room + 'static> {
    room: R,
    config: BridgeConfig,
    bus: Rc<EventBus>,
    lifecycle: Lifecycle,
    mode: DisplayerMode,
    frame: Option<FrameElement>,
    relay: MagixRelay,
    state_listener: Option<ListenerId>,
    phase_listener: Option<ListenerId>,
    mount_subscription: Option<SubscriptionId>,
    ready_subscription: Option<SubscriptionId>,
    /// The iframe has loaded at least once since binding.
    loaded: bool,
    visibility: Option<Visibility>,
    /// Host listener removals, run once by `destroy`.
    teardown: Vec<TeardownHook>,
    this: Weak<RefCell<Self>>,
}

impl<R: Room + 'static> std::fmt::Debug for IframeBridge<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IframeBridge")
            .field("room_id", &self.room.room_id())
            .field("lifecycle", &self.lifecycle)
            .field("mode", &self.mode)
            .field("visibility", &self.visibility)
            .field("relay", &self.relay)
            .finish_non_exhaustive()
    }
}

impl<R: Room + 'static> IframeBridge<R> {
    /// Build an unbound bridge over `room`.
    pub fn new(room: R, config: BridgeConfig, bus: Rc<EventBus>) -> BridgeHandle<R> {
        let mode = room.mode();
        Rc::new_cyclic(|this| {
            RefCell::new(Self {
                room,
                config,
                bus,
                lifecycle: Lifecycle::Creating,
                mode,
                frame: None,
                relay: MagixRelay::new(),
                state_listener: None,
                phase_listener: None,
                mount_subscription: None,
                ready_subscription: None,
                loaded: false,
                visibility: None,
                teardown: Vec::new(),
                this: this.clone(),
            })
        })
    }

    // --- Accessors ---

    pub fn room(&self) -> &R {
        &self.room
    }

    pub fn room_mut(&mut self) -> &mut R {
        &mut self.room
    }

    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    #[must_use]
    pub fn mode(&self) -> DisplayerMode {
        self.mode
    }

    /// Visibility decided by the last gate run, `None` before binding.
    #[must_use]
    pub fn visibility(&self) -> Option<Visibility> {
        self.visibility
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    #[must_use]
    pub fn frame(&self) -> Option<&FrameElement> {
        self.frame.as_ref()
    }

    #[must_use]
    pub fn relay(&self) -> &MagixRelay {
        &self.relay
    }

    #[must_use]
    pub fn is_waiting_for_mount(&self) -> bool {
        self.mount_subscription.is_some_and(|id| self.bus.is_subscribed(id))
    }

    /// Current replicated attributes.
    ///
    /// # Errors
    ///
    /// See [`read_attributes`].
    pub fn attributes(&self) -> Result<BridgeAttributes, BridgeError> {
        read_attributes(&self.room)
    }

    // --- Binding ---

    /// Bind now when the element is available, otherwise once the hosting UI
    /// signals `WrapperDidMount` or `WrapperDidUpdate` for this room on the
    /// bus. The subscription is dropped by the bind it triggers, so a signal
    /// that arrives while the bridge is busy leaves it waiting for the next one.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Destroyed`] after teardown, or any [`bind`](Self::bind) error.
    pub fn bind_when_mounted(&mut self, element: Option<FrameElement>) -> Result<(), BridgeError> {
        if self.lifecycle == Lifecycle::Destroyed {
            return Err(BridgeError::Destroyed);
        }
        if let Some(element) = element {
            return self.bind(element);
        }
        if self.is_waiting_for_mount() {
            return Ok(());
        }
        let this = self.this.clone();
        let topics = [Topic::WrapperDidMount, Topic::WrapperDidUpdate];
        let id = self.bus.on_room(self.room.room_id(), &topics, move |event| {
            let (Some(element), Some(bridge)) = (event.element(), this.upgrade()) else {
                return;
            };
            let Ok(mut bridge) = bridge.try_borrow_mut() else {
                warn!(?event, "bridge: mount signal while bridge is busy, still waiting");
                return;
            };
            if let Err(err) = bridge.bind(element) {
                warn!(error = %err, "bridge: bind on mount failed");
            }
        });
        self.mount_subscription = Some(id);
        debug!(room_id = self.room.room_id(), "bridge: waiting for hosting element");
        Ok(())
    }

    /// Attach the hosting element: point it at the attribute URL, install the
    /// room callbacks, and lay it out.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Destroyed`] after teardown, or an attribute read error.
    pub fn bind(&mut self, element: FrameElement) -> Result<(), BridgeError> {
        if self.lifecycle == Lifecycle::Destroyed {
            return Err(BridgeError::Destroyed);
        }
        let attributes = read_attributes(&self.room)?;
        if let Some(id) = self.mount_subscription.take() {
            self.bus.off(id);
        }
        element.set_source(&attributes.url);
        element.set_size(attributes.width, attributes.height);
        self.frame = Some(element);
        self.loaded = false;
        self.install_listeners();
        self.lifecycle = Lifecycle::Bound;
        info!(room_id = self.room.room_id(), mode = ?self.mode, url = %attributes.url, "bridge: bound");

        self.refresh_with(&attributes);
        Ok(())
    }

    fn install_listeners(&mut self) {
        if self.state_listener.is_none() {
            self.state_listener = Some(self.room.add_callback(Callback::state_changed(self.mode)));
        }
        if self.mode == DisplayerMode::Replay && self.phase_listener.is_none() {
            self.phase_listener = Some(self.room.add_callback(Callback::PhaseChanged));
        }
        if self.ready_subscription.is_none() {
            let this = self.this.clone();
            let id = self.bus.on_room(self.room.room_id(), &[Topic::Ready], move |_| {
                let Some(bridge) = this.upgrade() else {
                    return;
                };
                let Ok(bridge) = bridge.try_borrow() else {
                    warn!("bridge: ready signal while bridge is busy, dropped");
                    return;
                };
                if let Err(err) = bridge.replay_last_event() {
                    warn!(error = %err, "bridge: last event replay failed");
                }
            });
            self.ready_subscription = Some(id);
        }
    }

    /// Point the element at a new source.
    fn rebind_source(&self, attributes: &BridgeAttributes) {
        if let Some(frame) = &self.frame {
            info!(room_id = self.room.room_id(), url = %attributes.url, "bridge: iframe source changed");
            frame.set_source(&attributes.url);
            frame.set_size(attributes.width, attributes.height);
        }
    }

    // --- Layout ---

    fn refresh_with(&mut self, attributes: &BridgeAttributes) {
        let state = self.room.state();
        self.apply_geometry(attributes, &state.camera_state, state.member_state.as_ref());
        self.apply_visibility(attributes, &state.scene_state.scene_path);
    }

    fn refresh(&mut self) {
        match read_attributes(&self.room) {
            Ok(attributes) => self.refresh_with(&attributes),
            Err(err) => warn!(error = %err, "bridge: layout skipped, attributes unreadable"),
        }
    }

    fn apply_geometry(&self, attributes: &BridgeAttributes, camera: &CameraState, member: Option<&MemberState>) {
        let Some(frame) = &self.frame else {
            return;
        };
        let allowed = self.config.allowed_tools(attributes.use_selector);
        let stacking = stacking_for(&StackingInput {
            tool: member.map_or("", |m| m.current_appliance_name.as_str()),
            allowed: &allowed,
            readonly: !self.room.is_writable(),
            input_disabled: input_disabled(&self.room),
        });
        let transform = compute_transform(camera, attributes.size(), stacking);
        frame.set_style(&transform.to_css());
    }

    fn apply_visibility(&mut self, attributes: &BridgeAttributes, scene_path: &str) {
        let Some(frame) = &self.frame else {
            return;
        };
        let decision = visibility::gate(scene_path, &attributes.display_scope_path);
        frame.set_visible(decision.is_visible());
        self.visibility = Some(decision);
        let room_id = self.room.room_id().to_owned();
        let signal =
            if decision.is_visible() { BusEvent::DisplayIframe { room_id } } else { BusEvent::HideIframe { room_id } };
        self.bus.emit(&signal);
    }

    // --- Host events ---

    /// The iframe document finished loading: send `Init` and lay out.
    ///
    /// # Errors
    ///
    /// Returns an attribute read error.
    pub fn handle_iframe_load(&mut self) -> Result<(), BridgeError> {
        if self.lifecycle != Lifecycle::Bound {
            return Ok(());
        }
        let attributes = read_attributes(&self.room)?;
        self.post(&OutboundMessage::Init(self.init_payload(attributes.clone())));
        self.loaded = true;
        self.bus.emit(&BusEvent::IframeLoad { room_id: self.room.room_id().to_owned() });
        self.refresh_with(&attributes);
        Ok(())
    }

    /// Validate and dispatch a `postMessage` event received by the window.
    ///
    /// Messages from any origin other than the iframe's current source are
    /// dropped before parsing.
    pub fn handle_message(&mut self, origin: &str, data: &Value) -> Dispatch {
        let Some(frame) = self.frame.as_ref().filter(|_| self.lifecycle == Lifecycle::Bound) else {
            return Dispatch::Ignored(IgnoreReason::NotBound);
        };
        let expected = expected_origin(&**frame);
        if expected.as_deref() != Some(origin) {
            debug!(origin, expected = ?expected, "bridge: message from foreign origin dropped");
            return Dispatch::Ignored(IgnoreReason::OriginMismatch);
        }
        let message = match InboundMessage::parse(data) {
            Ok(message) => message,
            Err(MessageError::UnknownKind(kind)) => {
                debug!(%kind, "bridge: unknown message kind ignored");
                return Dispatch::Ignored(IgnoreReason::UnknownKind);
            }
            Err(err) => {
                warn!(error = %err, "bridge: malformed message dropped");
                return Dispatch::Ignored(IgnoreReason::Malformed);
            }
        };
        let kind = message.kind();
        if let Err(err) = self.dispatch_inbound(message) {
            warn!(kind = kind.as_str(), error = %err, "bridge: message handler failed");
        }
        Dispatch::Handled(kind)
    }

    fn dispatch_inbound(&mut self, message: InboundMessage) -> Result<(), BridgeError> {
        match message {
            InboundMessage::SetAttributes(patch) => {
                self.set_attributes(&patch)?;
            }
            InboundMessage::RegisterMagixEvent(event) => self.register_magix_event(&event),
            InboundMessage::RemoveMagixEvent(event) => {
                self.relay.unregister(&mut self.room, &event);
            }
            InboundMessage::RemoveAllMagixEvent => {
                self.relay.unregister_all(&mut self.room);
            }
            InboundMessage::DispatchMagixEvent(dispatch) => {
                self.dispatch_magix_event(&dispatch.event, dispatch.payload)?;
            }
            InboundMessage::NextPage => {
                self.next_page()?;
            }
            InboundMessage::PrevPage => {
                self.prev_page()?;
            }
            InboundMessage::PageTo(page) => {
                self.go_to_page(&page)?;
            }
            InboundMessage::SetPage(count) => {
                self.set_page(&count)?;
            }
            InboundMessage::GetAttributes => self.get_attributes()?,
            InboundMessage::SdkCreate => self.sdk_create()?,
        }
        Ok(())
    }

    /// Room (or player) state changed. Forwards the delta to the iframe and
    /// updates whatever layout it affects.
    pub fn handle_state_changed(&mut self, delta: &StateDelta) {
        if self.lifecycle != Lifecycle::Bound {
            return;
        }
        self.post(&OutboundMessage::RoomStateChanged(delta.clone()));

        let attributes = match read_attributes(&self.room) {
            Ok(attributes) => attributes,
            Err(err) => {
                warn!(error = %err, "bridge: state change layout skipped, attributes unreadable");
                return;
            }
        };
        if delta.camera_state.is_some() || delta.member_state.is_some() {
            let state = self.room.state();
            let camera = delta.camera_state.unwrap_or(state.camera_state);
            let member = delta.member_state.clone().or(state.member_state);
            self.apply_geometry(&attributes, &camera, member.as_ref());
        }
        if let Some(scene) = &delta.scene_state {
            self.apply_visibility(&attributes, &scene.scene_path);
        }
    }

    /// Replay player phase changed. Entering `Playing` recomputes the layout.
    pub fn handle_phase_changed(&mut self, phase: PlayerPhase) {
        if self.lifecycle != Lifecycle::Bound || self.mode != DisplayerMode::Replay {
            return;
        }
        if phase == PlayerPhase::Playing {
            debug!(room_id = self.room.room_id(), "bridge: replay playing, layout refreshed");
            self.refresh();
        }
    }

    /// The replicated attributes changed, locally or remotely.
    ///
    /// # Errors
    ///
    /// Returns an attribute read error.
    pub fn handle_attributes_updated(&mut self) -> Result<(), BridgeError> {
        if self.lifecycle != Lifecycle::Bound {
            return Ok(());
        }
        let attributes = read_attributes(&self.room)?;
        if let Some(frame) = &self.frame {
            if frame.source().is_some_and(|source| !same_source(&source, &attributes.url)) {
                self.rebind_source(&attributes);
            }
            frame.set_size(attributes.width, attributes.height);
        }
        self.refresh_with(&attributes);
        self.post(&OutboundMessage::AttributesUpdate(attributes));
        Ok(())
    }

    // --- Commands ---

    /// Write attributes through the permission gate. A new `url` rebinds the
    /// element and a new display scope re-runs the visibility gate, both
    /// without waiting for the replicated echo. Returns whether the write went out.
    ///
    /// # Errors
    ///
    /// Returns an attribute serialization or read error.
    pub fn set_attributes(&mut self, patch: &AttributesPatch) -> Result<bool, BridgeError> {
        let mut attributes = read_attributes(&self.room)?;
        if !write_attributes(&mut self.room, patch)? {
            return Ok(false);
        }
        attributes.merge(patch);
        if patch.url.is_some() {
            self.rebind_source(&attributes);
        }
        if patch.display_scope_path.is_some() {
            let scene_path = self.room.state().scene_state.scene_path;
            self.apply_visibility(&attributes, &scene_path);
        }
        Ok(true)
    }

    /// Relay broadcasts of `event` into the iframe.
    pub fn register_magix_event(&mut self, event: &str) {
        match self.frame.clone() {
            Some(frame) => self.relay.register(&mut self.room, event, frame),
            None => debug!(event, "bridge: register ignored, no element bound"),
        }
    }

    /// Broadcast a custom event on behalf of the iframe.
    ///
    /// # Errors
    ///
    /// See [`magix::dispatch`].
    pub fn dispatch_magix_event(&mut self, event: &str, payload: Value) -> Result<bool, BridgeError> {
        magix::dispatch(&mut self.room, event, payload)
    }

    fn display_scope(&self) -> Result<String, BridgeError> {
        Ok(read_attributes(&self.room)?.display_scope_path)
    }

    /// # Errors
    ///
    /// See [`pages::next_page`].
    pub fn next_page(&mut self) -> Result<Option<usize>, BridgeError> {
        let scope = self.display_scope()?;
        pages::next_page(&mut self.room, &scope)
    }

    /// # Errors
    ///
    /// See [`pages::prev_page`].
    pub fn prev_page(&mut self) -> Result<Option<usize>, BridgeError> {
        pages::prev_page(&mut self.room)
    }

    /// # Errors
    ///
    /// See [`pages::go_to_page`].
    pub fn go_to_page(&mut self, page: &Value) -> Result<Option<usize>, BridgeError> {
        pages::go_to_page(&mut self.room, page)
    }

    /// # Errors
    ///
    /// Returns an attribute read error.
    pub fn set_page(&mut self, count: &Value) -> Result<bool, BridgeError> {
        let scope = self.display_scope()?;
        Ok(pages::set_page(&mut self.room, &scope, count))
    }

    /// Answer an attribute query from the iframe.
    ///
    /// # Errors
    ///
    /// Returns an attribute read error.
    pub fn get_attributes(&self) -> Result<(), BridgeError> {
        self.post(&OutboundMessage::GetAttributes(read_attributes(&self.room)?));
        Ok(())
    }

    /// The iframe SDK announced itself: send `Init` again.
    ///
    /// # Errors
    ///
    /// Returns an attribute read error.
    pub fn sdk_create(&self) -> Result<(), BridgeError> {
        let attributes = read_attributes(&self.room)?;
        self.post(&OutboundMessage::Init(self.init_payload(attributes)));
        Ok(())
    }

    /// Re-post the last dispatched event so a reloaded iframe can restore
    /// its state. Only after the iframe has loaded. Returns whether anything was posted.
    ///
    /// # Errors
    ///
    /// Returns an attribute read error.
    pub fn replay_last_event(&self) -> Result<bool, BridgeError> {
        if !self.loaded || self.frame.is_none() {
            return Ok(false);
        }
        let Some(last) = read_attributes(&self.room)?.last_event else {
            return Ok(false);
        };
        self.post(&OutboundMessage::ReceiveMagixEvent(MagixEvent {
            event: last.name,
            payload: last.payload,
            author_id: None,
        }));
        Ok(true)
    }

    /// Fit the camera to the iframe rectangle centered on world origin. Does
    /// nothing while the current scene is outside the display scope.
    ///
    /// # Errors
    ///
    /// Returns an attribute read error.
    pub fn scale_iframe_to_fit(&mut self, animation_mode: AnimationMode) -> Result<bool, BridgeError> {
        let attributes = read_attributes(&self.room)?;
        let scene_path = self.room.state().scene_state.scene_path;
        if !visibility::in_display_scope(&scene_path, &attributes.display_scope_path) {
            return Ok(false);
        }
        self.room.move_camera_to_contain(CameraBound {
            origin_x: -attributes.width / 2.0,
            origin_y: -attributes.height / 2.0,
            width: attributes.width,
            height: attributes.height,
            animation_mode,
        });
        Ok(true)
    }

    /// Resize the element and write the new size through the permission gate.
    /// Returns whether the size was written to the room.
    ///
    /// # Errors
    ///
    /// Returns an attribute serialization or read error.
    pub fn set_iframe_size(&mut self, width: f64, height: f64) -> Result<bool, BridgeError> {
        let Some(frame) = &self.frame else {
            return Ok(false);
        };
        frame.set_size(width, height);
        if !write_attributes(&mut self.room, &AttributesPatch::size(width, height))? {
            return Ok(false);
        }
        self.refresh();
        Ok(true)
    }

    // --- Teardown ---

    /// Register a host-side cleanup, such as removing DOM listeners, that
    /// `destroy` runs. Runs at once when the bridge is already destroyed.
    pub fn on_destroy(&mut self, hook: impl FnOnce() + 'static) {
        if self.lifecycle == Lifecycle::Destroyed {
            hook();
            return;
        }
        self.teardown.push(Box::new(hook));
    }

    /// Detach every listener, release the element and announce `Destroyed`.
    /// Safe before binding and idempotent.
    pub fn destroy(&mut self) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }
        let hooks = self.teardown.len();
        for hook in self.teardown.drain(..) {
            hook();
        }
        for id in [self.mount_subscription.take(), self.ready_subscription.take()].into_iter().flatten() {
            self.bus.off(id);
        }
        let relayed = self.relay.unregister_all(&mut self.room);
        for id in [self.state_listener.take(), self.phase_listener.take()].into_iter().flatten() {
            self.room.remove_callback(id);
        }
        self.frame = None;
        self.visibility = None;
        self.loaded = false;
        self.lifecycle = Lifecycle::Destroyed;
        let room_id = self.room.room_id().to_owned();
        info!(%room_id, relayed, hooks, "bridge: destroyed");
        self.bus.emit(&BusEvent::Destroyed { room_id });
    }

    // --- Internals ---

    fn init_payload(&self, attributes: BridgeAttributes) -> InitPayload {
        let room_state = self.room.state();
        InitPayload {
            attributes,
            current_page: pages::current_page(&room_state.scene_state),
            room_state,
            observer_id: self.room.observer_id(),
        }
    }

    fn post(&self, message: &OutboundMessage) {
        if let Some(frame) = &self.frame {
            frame.post_message(message);
        }
    }
}
