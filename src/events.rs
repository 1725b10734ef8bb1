//! Event taxonomy: the message kinds exchanged across the iframe boundary.
//!
//! ARCHITECTURE
//! ============
//! Every message is an envelope `{ kind, payload? }` carried by the browser's
//! `postMessage`. Inbound envelopes are parsed in two steps: the `kind`
//! string selects an [`EventKind`], then the payload is decoded for that
//! kind only. Unknown kinds are not an error for the bridge (they are
//! dropped), but they are reported distinctly so the caller can log them.
//!
//! Kind strings match the iframe-side SDK, including its historical
//! `ReciveMagixEvent` spelling.

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attributes::{AttributesPatch, BridgeAttributes};
use crate::room::{DisplayerState, MagixEvent, ObserverId, StateDelta};

/// Every message kind known to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Init,
    AttributesUpdate,
    SetAttributes,
    RegisterMagixEvent,
    RemoveMagixEvent,
    RemoveAllMagixEvent,
    RoomStateChanged,
    DispatchMagixEvent,
    ReceiveMagixEvent,
    NextPage,
    PrevPage,
    SdkCreate,
    SetPage,
    GetAttributes,
    PageTo,
}

impl EventKind {
    pub const ALL: [Self; 15] = [
        Self::Init,
        Self::AttributesUpdate,
        Self::SetAttributes,
        Self::RegisterMagixEvent,
        Self::RemoveMagixEvent,
        Self::RemoveAllMagixEvent,
        Self::RoomStateChanged,
        Self::DispatchMagixEvent,
        Self::ReceiveMagixEvent,
        Self::NextPage,
        Self::PrevPage,
        Self::SdkCreate,
        Self::SetPage,
        Self::GetAttributes,
        Self::PageTo,
    ];

    /// Wire string of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::AttributesUpdate => "AttributesUpdate",
            Self::SetAttributes => "SetAttributes",
            Self::RegisterMagixEvent => "RegisterMagixEvent",
            Self::RemoveMagixEvent => "RemoveMagixEvent",
            Self::RemoveAllMagixEvent => "RemoveAllMagixEvent",
            Self::RoomStateChanged => "RoomStateChanged",
            Self::DispatchMagixEvent => "DispatchMagixEvent",
            Self::ReceiveMagixEvent => "ReciveMagixEvent",
            Self::NextPage => "NextPage",
            Self::PrevPage => "PrevPage",
            Self::SdkCreate => "SDKCreate",
            Self::SetPage => "SetPage",
            Self::GetAttributes => "GetAttributes",
            Self::PageTo => "PageTo",
        }
    }

    /// Parse a wire string.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }

    /// Whether the iframe may send this kind to the bridge.
    #[must_use]
    pub fn is_inbound(self) -> bool {
        matches!(
            self,
            Self::SetAttributes
                | Self::RegisterMagixEvent
                | Self::RemoveMagixEvent
                | Self::RemoveAllMagixEvent
                | Self::DispatchMagixEvent
                | Self::NextPage
                | Self::PrevPage
                | Self::PageTo
                | Self::SetPage
                | Self::GetAttributes
                | Self::SdkCreate
        )
    }
}

/// Raw message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

/// Error returned by [`InboundMessage::parse`].
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The data is not a `{ kind, payload? }` object.
    #[error("not a message envelope: {0}")]
    NotEnvelope(serde_json::Error),
    /// The kind is not one the iframe may send.
    #[error("unknown message kind: {0}")]
    UnknownKind(String),
    /// The payload does not match the kind.
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Payload of `DispatchMagixEvent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchPayload {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

/// A command sent by the iframe.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    SetAttributes(AttributesPatch),
    RegisterMagixEvent(String),
    RemoveMagixEvent(String),
    RemoveAllMagixEvent,
    DispatchMagixEvent(DispatchPayload),
    NextPage,
    PrevPage,
    /// Target page number, validated by the page navigator.
    PageTo(Value),
    /// Declared page count, validated by the page navigator.
    SetPage(Value),
    GetAttributes,
    SdkCreate,
}

impl InboundMessage {
    /// Decode a raw `postMessage` payload.
    ///
    /// # Errors
    ///
    /// See [`MessageError`].
    pub fn parse(data: &Value) -> Result<Self, MessageError> {
        let envelope = Envelope::deserialize(data).map_err(MessageError::NotEnvelope)?;
        let kind = EventKind::parse(&envelope.kind)
            .filter(|kind| kind.is_inbound())
            .ok_or_else(|| MessageError::UnknownKind(envelope.kind.clone()))?;
        let payload = envelope.payload;
        let decode = |source| MessageError::Malformed { kind: kind.as_str(), source };

        Ok(match kind {
            EventKind::SetAttributes => Self::SetAttributes(serde_json::from_value(payload).map_err(decode)?),
            EventKind::RegisterMagixEvent => Self::RegisterMagixEvent(serde_json::from_value(payload).map_err(decode)?),
            EventKind::RemoveMagixEvent => Self::RemoveMagixEvent(serde_json::from_value(payload).map_err(decode)?),
            EventKind::RemoveAllMagixEvent => Self::RemoveAllMagixEvent,
            EventKind::DispatchMagixEvent => Self::DispatchMagixEvent(serde_json::from_value(payload).map_err(decode)?),
            EventKind::NextPage => Self::NextPage,
            EventKind::PrevPage => Self::PrevPage,
            EventKind::PageTo => Self::PageTo(payload),
            EventKind::SetPage => Self::SetPage(payload),
            EventKind::GetAttributes => Self::GetAttributes,
            EventKind::SdkCreate => Self::SdkCreate,
            EventKind::Init
            | EventKind::AttributesUpdate
            | EventKind::RoomStateChanged
            | EventKind::ReceiveMagixEvent => return Err(MessageError::UnknownKind(envelope.kind)),
        })
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SetAttributes(_) => EventKind::SetAttributes,
            Self::RegisterMagixEvent(_) => EventKind::RegisterMagixEvent,
            Self::RemoveMagixEvent(_) => EventKind::RemoveMagixEvent,
            Self::RemoveAllMagixEvent => EventKind::RemoveAllMagixEvent,
            Self::DispatchMagixEvent(_) => EventKind::DispatchMagixEvent,
            Self::NextPage => EventKind::NextPage,
            Self::PrevPage => EventKind::PrevPage,
            Self::PageTo(_) => EventKind::PageTo,
            Self::SetPage(_) => EventKind::SetPage,
            Self::GetAttributes => EventKind::GetAttributes,
            Self::SdkCreate => EventKind::SdkCreate,
        }
    }
}

/// Payload of the `Init` message sent when the iframe loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    pub attributes: BridgeAttributes,
    pub room_state: DisplayerState,
    pub current_page: usize,
    pub observer_id: ObserverId,
}

/// A message sent by the bridge to the iframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum OutboundMessage {
    Init(InitPayload),
    AttributesUpdate(BridgeAttributes),
    RoomStateChanged(StateDelta),
    #[serde(rename = "ReciveMagixEvent")]
    ReceiveMagixEvent(MagixEvent),
    GetAttributes(BridgeAttributes),
}

impl OutboundMessage {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Init(_) => EventKind::Init,
            Self::AttributesUpdate(_) => EventKind::AttributesUpdate,
            Self::RoomStateChanged(_) => EventKind::RoomStateChanged,
            Self::ReceiveMagixEvent(_) => EventKind::ReceiveMagixEvent,
            Self::GetAttributes(_) => EventKind::GetAttributes,
        }
    }
}
