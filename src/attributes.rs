//! Attribute store adapter: typed view over the room-replicated bridge state.
//!
//! The room owns the attributes; this module never caches them. Reads parse
//! the current replicated JSON, writes send a sparse patch that the room
//! merges shallowly.

#[cfg(test)]
#[path = "attributes_test.rs"]
mod attributes_test;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::BridgeError;
use crate::geometry::IframeSize;
use crate::room::{Room, can_operate};

/// The most recent custom event dispatched by the iframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastEvent {
    pub name: String,
    #[serde(default)]
    pub payload: Value,
}

/// Replicated bridge attributes, shared by every participant of the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeAttributes {
    /// Iframe content source.
    pub url: String,
    /// Logical iframe width in CSS pixels.
    pub width: f64,
    /// Logical iframe height in CSS pixels.
    pub height: f64,
    /// Scene-path prefix under which the iframe is visible.
    #[serde(rename = "displaySceneDir")]
    pub display_scope_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event: Option<LastEvent>,
    /// Carried for wire compatibility only, never consulted for stacking. Whether a tool
    /// raises the iframe is decided by [`BridgeConfig::interactive_tools`].
    ///
    /// [`BridgeConfig::interactive_tools`]: crate::config::BridgeConfig::interactive_tools
    #[serde(default)]
    pub use_clicker: bool,
    /// Also raise the iframe while the selector tool is active.
    #[serde(default)]
    pub use_selector: bool,
}

impl BridgeAttributes {
    #[must_use]
    pub fn size(&self) -> IframeSize {
        IframeSize { width: self.width, height: self.height }
    }

    /// Apply a sparse update in place. Absent fields are left unchanged.
    pub fn merge(&mut self, patch: &AttributesPatch) {
        if let Some(url) = &patch.url {
            self.url.clone_from(url);
        }
        if let Some(width) = patch.width {
            self.width = width;
        }
        if let Some(height) = patch.height {
            self.height = height;
        }
        if let Some(path) = &patch.display_scope_path {
            self.display_scope_path.clone_from(path);
        }
        if let Some(event) = &patch.last_event {
            self.last_event = Some(event.clone());
        }
        if let Some(flag) = patch.use_clicker {
            self.use_clicker = flag;
        }
        if let Some(flag) = patch.use_selector {
            self.use_selector = flag;
        }
    }
}

/// Sparse update for bridge attributes. Only present fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributesPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(rename = "displaySceneDir", skip_serializing_if = "Option::is_none")]
    pub display_scope_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event: Option<LastEvent>,
    /// Stored verbatim, see [`BridgeAttributes::use_clicker`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_clicker: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_selector: Option<bool>,
}

impl AttributesPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub fn size(width: f64, height: f64) -> Self {
        Self { width: Some(width), height: Some(height), ..Self::default() }
    }

    #[must_use]
    pub fn last_event(name: &str, payload: Value) -> Self {
        Self { last_event: Some(LastEvent { name: name.to_owned(), payload }), ..Self::default() }
    }
}

/// Current replicated attributes.
///
/// # Errors
///
/// [`BridgeError::MissingAttributes`] when the room has no bridge, and
/// [`BridgeError::InvalidAttributes`] when the stored JSON does not parse.
pub fn read_attributes<R: Room + ?Sized>(room: &R) -> Result<BridgeAttributes, BridgeError> {
    let raw = room.bridge_attributes().ok_or(BridgeError::MissingAttributes)?;
    Ok(serde_json::from_value(raw)?)
}

/// Create the replicated attributes. The creation write is never gated.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidAttributes`] if the attributes cannot be serialized.
pub fn create_attributes<R: Room + ?Sized>(room: &mut R, attributes: &BridgeAttributes) -> Result<(), BridgeError> {
    let value = serde_json::to_value(attributes)?;
    room.create_bridge(value);
    Ok(())
}

/// Merge a patch into the replicated attributes.
///
/// Returns `Ok(false)` without touching the room when the write-permission
/// gate is closed or the patch is empty.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidAttributes`] if the patch cannot be serialized.
pub fn write_attributes<R: Room + ?Sized>(room: &mut R, patch: &AttributesPatch) -> Result<bool, BridgeError> {
    if !can_operate(room) {
        debug!(room_id = room.room_id(), "attributes: write dropped, displayer cannot operate");
        return Ok(false);
    }
    if patch.is_empty() {
        return Ok(false);
    }
    let value = serde_json::to_value(patch)?;
    room.update_bridge_attributes(value);
    Ok(true)
}
