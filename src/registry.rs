//! Bridge factory: at most one live bridge per room.
//!
//! The registry is an explicit context object. Whoever hosts bridges owns one
//! and passes it around; there is no process-wide instance. A destroyed
//! bridge no longer counts, so a room can get a fresh bridge after teardown.

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{info, warn};

use crate::attributes::{BridgeAttributes, create_attributes, read_attributes};
use crate::bridge::{BridgeHandle, IframeBridge, Lifecycle};
use crate::bus::{BusEvent, EventBus};
use crate::config::{BridgeConfig, DuplicatePolicy};
use crate::error::BridgeError;
use crate::frame::FrameElement;
use crate::room::{Room, can_operate};

/// Parameters of a new bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOptions {
    pub url: String,
    pub width: f64,
    pub height: f64,
    /// Scene-path prefix under which the iframe is shown.
    pub display_scope_path: String,
    /// Written into the room attributes for wire compatibility only.
    pub use_clicker: bool,
    pub use_selector: bool,
}

impl InsertOptions {
    /// # Errors
    ///
    /// [`BridgeError::InvalidOptions`] for an empty url, a non-positive size
    /// or an empty display scope.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.url.trim().is_empty() {
            return Err(BridgeError::InvalidOptions("url is empty".to_owned()));
        }
        if !(self.width.is_finite() && self.width > 0.0 && self.height.is_finite() && self.height > 0.0) {
            return Err(BridgeError::InvalidOptions(format!(
                "size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.display_scope_path.is_empty() {
            return Err(BridgeError::InvalidOptions("display scope path is empty".to_owned()));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_attributes(&self) -> BridgeAttributes {
        BridgeAttributes {
            url: self.url.clone(),
            width: self.width,
            height: self.height,
            display_scope_path: self.display_scope_path.clone(),
            last_event: None,
            use_clicker: self.use_clicker,
            use_selector: self.use_selector,
        }
    }
}

/// How [`BridgeRegistry::insert`] satisfied the request.
pub enum Insertion<R: Room + 'static> {
    /// A new bridge and new replicated attributes.
    Created(BridgeHandle<R>),
    /// The room already carried attributes from another participant.
    Attached(BridgeHandle<R>),
    /// A live bridge already existed for the room.
    Existing(BridgeHandle<R>),
}

impl<R: Room + 'static> Insertion<R> {
    #[must_use]
    pub fn handle(&self) -> &BridgeHandle<R> {
        match self {
            Self::Created(handle) | Self::Attached(handle) | Self::Existing(handle) => handle,
        }
    }

    #[must_use]
    pub fn into_handle(self) -> BridgeHandle<R> {
        match self {
            Self::Created(handle) | Self::Attached(handle) | Self::Existing(handle) => handle,
        }
    }
}

impl<R: Room + 'static> std::fmt::Debug for Insertion<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created(_) => "Created",
            Self::Attached(_) => "Attached",
            Self::Existing(_) => "Existing",
        };
        f.write_str(name)
    }
}

/// Live bridges keyed by room id.
pub struct BridgeRegistry<R: Room + 'static> {
    config: BridgeConfig,
    bus: Rc<EventBus>,
    bridges: HashMap<String, BridgeHandle<R>>,
}

impl<R: Room + 'static> BridgeRegistry<R> {
    #[must_use]
    pub fn new(config: BridgeConfig, bus: Rc<EventBus>) -> Self {
        Self { config, bus, bridges: HashMap::new() }
    }

    #[must_use]
    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Live bridge of a room.
    #[must_use]
    pub fn get(&self, room_id: &str) -> Option<BridgeHandle<R>> {
        self.bridges
            .get(room_id)
            .filter(|handle| handle.try_borrow().map_or(true, |bridge| bridge.lifecycle() != Lifecycle::Destroyed))
            .cloned()
    }

    /// Number of live bridges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bridges.keys().filter(|id| self.get(id).is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply the duplicate policy when `room_id` already has a live bridge.
    fn existing(&self, room_id: &str) -> Result<Option<BridgeHandle<R>>, BridgeError> {
        let Some(handle) = self.get(room_id) else {
            return Ok(None);
        };
        match self.config.duplicate_policy {
            DuplicatePolicy::ReturnExisting => {
                warn!(%room_id, "registry: bridge already inserted, returning existing instance");
                Ok(Some(handle))
            }
            DuplicatePolicy::Reject => Err(BridgeError::AlreadyInserted { room_id: room_id.to_owned() }),
        }
    }

    /// Create a bridge in `room`. Binds at once when `element` is given,
    /// otherwise on the hosting UI's mount signal.
    ///
    /// A room that already carries bridge attributes is attached to instead
    /// of overwritten.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidOptions`], [`BridgeError::AlreadyInserted`] under
    /// the reject policy, or an attribute error.
    pub fn insert(
        &mut self,
        mut room: R,
        options: &InsertOptions,
        element: Option<FrameElement>,
    ) -> Result<Insertion<R>, BridgeError> {
        options.validate()?;
        let room_id = room.room_id().to_owned();
        if let Some(handle) = self.existing(&room_id)? {
            return Ok(Insertion::Existing(handle));
        }
        if room.bridge_attributes().is_some() {
            return self.attach(room, element).map(Insertion::Attached);
        }

        create_attributes(&mut room, &options.to_attributes())?;
        let handle = IframeBridge::new(room, self.config.clone(), Rc::clone(&self.bus));
        handle.borrow_mut().bind_when_mounted(element)?;
        info!(%room_id, url = %options.url, "registry: bridge created");
        self.bridges.insert(room_id, Rc::clone(&handle));
        Ok(Insertion::Created(handle))
    }

    /// Join a bridge another participant created. No attributes are written.
    ///
    /// Emits `StartCreate` before and `OnCreate` after.
    ///
    /// # Errors
    ///
    /// [`BridgeError::MissingAttributes`] when the room has no bridge,
    /// [`BridgeError::AlreadyInserted`] under the reject policy, or an
    /// attribute parse error.
    pub fn attach(&mut self, room: R, element: Option<FrameElement>) -> Result<BridgeHandle<R>, BridgeError> {
        let room_id = room.room_id().to_owned();
        if let Some(handle) = self.existing(&room_id)? {
            return Ok(handle);
        }
        self.bus.emit(&BusEvent::StartCreate { room_id: room_id.clone() });
        read_attributes(&room)?;

        let handle = IframeBridge::new(room, self.config.clone(), Rc::clone(&self.bus));
        handle.borrow_mut().bind_when_mounted(element)?;
        info!(%room_id, "registry: attached to existing bridge");
        self.bridges.insert(room_id.clone(), Rc::clone(&handle));
        self.bus.emit(&BusEvent::OnCreate { room_id });
        Ok(handle)
    }

    /// Destroy the room's bridge and, when permitted, remove its replicated
    /// attributes. Returns whether a bridge was registered.
    pub fn remove(&mut self, room_id: &str) -> bool {
        let Some(handle) = self.bridges.remove(room_id) else {
            return false;
        };
        let Ok(mut bridge) = handle.try_borrow_mut() else {
            warn!(%room_id, "registry: bridge busy, removal deferred");
            self.bridges.insert(room_id.to_owned(), Rc::clone(&handle));
            return false;
        };
        bridge.destroy();
        if can_operate(bridge.room()) {
            bridge.room_mut().remove_bridge();
        }
        true
    }
}

impl<R: Room + 'static> std::fmt::Debug for BridgeRegistry<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut rooms: Vec<&String> = self.bridges.keys().collect();
        rooms.sort();
        f.debug_struct("BridgeRegistry").field("config", &self.config).field("rooms", &rooms).finish()
    }
}
