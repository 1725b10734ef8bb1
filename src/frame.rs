//! Hosting element interface.
//!
//! The UI layer renders exactly one iframe and hands the bridge a
//! [`FrameElement`] when it mounts. The bridge never looks the element up by
//! itself. All methods take `&self`: the element is shared between the
//! bridge and the magix listeners that post into it, the same way a DOM node
//! is.

#[cfg(test)]
#[path = "frame_test.rs"]
mod frame_test;

use std::rc::Rc;

use url::Url;

use crate::events::OutboundMessage;

/// The iframe element as seen by the bridge.
pub trait FrameHost {
    /// Current `src`, `None` when unset.
    fn source(&self) -> Option<String>;

    fn set_source(&self, url: &str);

    /// Set the element size in CSS pixels.
    fn set_size(&self, width: f64, height: f64);

    /// Replace the inline style.
    fn set_style(&self, css: &str);

    fn set_visible(&self, visible: bool);

    /// Post a message into the iframe's content window.
    fn post_message(&self, message: &OutboundMessage);
}

/// Shared handle to the hosting iframe element.
pub type FrameElement = Rc<dyn FrameHost>;

/// Origin (`scheme://host[:port]`) of a URL, `None` when it does not parse.
#[must_use]
pub fn origin_of(url: &str) -> Option<String> {
    match Url::parse(url) {
        Ok(parsed) => Some(parsed.origin().ascii_serialization()),
        Err(_) => None,
    }
}

/// Origin the bridge accepts messages from: the origin of the frame's current source.
#[must_use]
pub fn expected_origin(frame: &dyn FrameHost) -> Option<String> {
    frame.source().as_deref().and_then(origin_of)
}

/// Whether an element `src` already points at `url`. Both sides are compared
/// in their parsed form, since browsers report `src` normalized
/// (`https://a.example` reads back as `https://a.example/`). Unparseable
/// values fall back to an exact string match.
#[must_use]
pub fn same_source(source: &str, url: &str) -> bool {
    match (Url::parse(source), Url::parse(url)) {
        (Ok(source), Ok(url)) => source == url,
        _ => source == url,
    }
}
