//! Iframe bridge for the collaborative whiteboard.
//!
//! Embeds one iframe in a whiteboard room and keeps the two in sync: the
//! iframe follows the whiteboard camera, is shown only on the scenes it
//! belongs to, and talks to the room through a small `postMessage` protocol
//! (replicated attributes, custom events, page navigation). The room itself
//! is an external collaborator reached through the [`room::Room`] trait; the
//! iframe element is reached through [`frame::FrameHost`].
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`registry`] | Factory keeping at most one bridge per room |
//! | [`bridge`] | Bridge controller state machine and inbound dispatch |
//! | [`geometry`] | Camera state to CSS transform, stacking policy |
//! | [`visibility`] | Display-scope gate |
//! | [`attributes`] | Typed view over the replicated bridge attributes |
//! | [`magix`] | Custom event relay into the iframe |
//! | [`pages`] | Page navigation over scenes |
//! | [`events`] | Message kinds and envelopes |
//! | [`bus`] | Internal pub/sub bus for mount timing and lifecycle signals |
//! | [`room`] | Host room interface and the write-permission gate |
//! | [`frame`] | Hosting element interface and origin checks |
//! | [`camera`] | Camera state and screen/world conversions |
//! | [`config`] | Configuration from environment variables |
//! | [`error`] | Error taxonomy |
//! | [`memory`] | In-memory room and recording frame |
//! | `web` | Browser binding (feature `web`) |

pub mod attributes;
pub mod bridge;
pub mod bus;
pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod geometry;
pub mod magix;
pub mod memory;
pub mod pages;
pub mod registry;
pub mod room;
pub mod visibility;
#[cfg(feature = "web")]
pub mod web;

pub use bridge::{BridgeHandle, Dispatch, IframeBridge, Lifecycle};
pub use bus::{BusEvent, EventBus, Topic};
pub use config::{BridgeConfig, DuplicatePolicy};
pub use error::BridgeError;
pub use registry::{BridgeRegistry, InsertOptions, Insertion};
