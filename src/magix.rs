//! Magix event relay: custom room events forwarded into the iframe.
//!
//! DESIGN
//! ======
//! The relay owns a table `event name -> ListenerId`. The listener closure
//! itself lives in the room; the id is the token needed to detach it again.
//! At most one listener exists per name: registering a name again detaches
//! the previous listener before attaching the new one, so a later broadcast
//! is delivered once.
//!
//! Listeners drop events authored by the local observer. The iframe that
//! dispatched an event already knows about it.

#[cfg(test)]
#[path = "magix_test.rs"]
mod magix_test;

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::attributes::{AttributesPatch, write_attributes};
use crate::error::BridgeError;
use crate::events::OutboundMessage;
use crate::frame::FrameElement;
use crate::room::{ListenerId, MagixEvent, MagixListener, ObserverId, Room, can_operate};

/// Subscription table for custom events relayed into the iframe.
#[derive(Debug, Default)]
pub struct MagixRelay {
    listeners: HashMap<String, ListenerId>,
}

impl MagixRelay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Relay broadcasts of `event` into `frame`. Replaces any previous listener for the name.
    pub fn register<R: Room + ?Sized>(&mut self, room: &mut R, event: &str, frame: FrameElement) {
        if let Some(previous) = self.listeners.remove(event) {
            room.remove_magix_listener(event, previous);
        }
        let observer = room.observer_id();
        let id = room.add_magix_listener(event, relay_listener(observer, frame));
        self.listeners.insert(event.to_owned(), id);
        debug!(event, %id, "magix: listener registered");
    }

    /// Detach the listener for `event`. Returns `false` when none was registered.
    pub fn unregister<R: Room + ?Sized>(&mut self, room: &mut R, event: &str) -> bool {
        let Some(id) = self.listeners.remove(event) else {
            debug!(event, "magix: unregister of unknown event ignored");
            return false;
        };
        room.remove_magix_listener(event, id);
        true
    }

    /// Detach every listener and clear the table. Returns how many were detached.
    pub fn unregister_all<R: Room + ?Sized>(&mut self, room: &mut R) -> usize {
        let count = self.listeners.len();
        for (event, id) in self.listeners.drain() {
            room.remove_magix_listener(&event, id);
        }
        count
    }

    #[must_use]
    pub fn is_registered(&self, event: &str) -> bool {
        self.listeners.contains_key(event)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

fn relay_listener(observer: ObserverId, frame: FrameElement) -> MagixListener {
    Box::new(move |event: &MagixEvent| {
        if event.author_id == Some(observer) {
            return;
        }
        frame.post_message(&OutboundMessage::ReceiveMagixEvent(event.clone()));
    })
}

/// Broadcast a custom event to the room and record it as the last event.
///
/// Dropped without touching the room when the write-permission gate is
/// closed. Returns whether the event was broadcast.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidAttributes`] if the last-event record cannot be serialized.
pub fn dispatch<R: Room + ?Sized>(room: &mut R, event: &str, payload: Value) -> Result<bool, BridgeError> {
    if !can_operate(room) {
        debug!(event, "magix: dispatch dropped, displayer cannot operate");
        return Ok(false);
    }
    write_attributes(room, &AttributesPatch::last_event(event, payload.clone()))?;
    room.dispatch_magix_event(event, payload);
    Ok(true)
}
