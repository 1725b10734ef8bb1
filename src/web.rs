//! Browser binding: a real `<iframe>` as the hosting element.
//!
//! [`IframeElement`] implements [`FrameHost`] over `HtmlIFrameElement`.
//! [`WebBinding`] wires the window `message` event and the iframe `load`
//! event into a bridge, and unwires them when dropped or when the bridge is
//! destroyed.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Event, HtmlIFrameElement, MessageEvent, Window};

use crate::bridge::BridgeHandle;
use crate::bus::{BusEvent, EventBus};
use crate::config::BridgeConfig;
use crate::events::OutboundMessage;
use crate::frame::{FrameElement, FrameHost};
use crate::room::Room;

/// The hosting `<iframe>`.
pub struct IframeElement {
    element: HtmlIFrameElement,
    target_origin: String,
}

impl IframeElement {
    #[must_use]
    pub fn new(element: HtmlIFrameElement, target_origin: &str) -> Self {
        Self { element, target_origin: target_origin.to_owned() }
    }

    #[must_use]
    pub fn element(&self) -> &HtmlIFrameElement {
        &self.element
    }
}

impl FrameHost for IframeElement {
    fn source(&self) -> Option<String> {
        let src = self.element.src();
        if src.is_empty() { None } else { Some(src) }
    }

    fn set_source(&self, url: &str) {
        self.element.set_src(url);
    }

    fn set_size(&self, width: f64, height: f64) {
        self.element.set_width(&format!("{width}px"));
        self.element.set_height(&format!("{height}px"));
    }

    fn set_style(&self, css: &str) {
        self.element.style().set_css_text(css);
    }

    fn set_visible(&self, visible: bool) {
        self.element.set_hidden(!visible);
    }

    fn post_message(&self, message: &OutboundMessage) {
        let Some(window) = self.element.content_window() else {
            debug!(kind = message.kind().as_str(), "web: iframe has no content window, message dropped");
            return;
        };
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "web: outbound message serialization failed");
                return;
            }
        };
        let value = match js_sys::JSON::parse(&text) {
            Ok(value) => value,
            Err(err) => {
                warn!(?err, "web: outbound message parse failed");
                return;
            }
        };
        if let Err(err) = window.post_message(&value, &self.target_origin) {
            warn!(?err, "web: postMessage failed");
        }
    }
}

/// Look up the hosting iframe by its well-known id.
#[must_use]
pub fn find_iframe(element_id: &str) -> Option<HtmlIFrameElement> {
    let element = web_sys::window()?.document()?.get_element_by_id(element_id)?;
    match element.dyn_into::<HtmlIFrameElement>() {
        Ok(iframe) => Some(iframe),
        Err(_) => {
            warn!(element_id, "web: hosting element is not an iframe");
            None
        }
    }
}

/// Called by the hosting UI after it rendered the iframe: signals
/// `WrapperDidMount` for `room_id` with the element. Returns `false` when the
/// element is missing.
pub fn announce_mount(bus: &EventBus, config: &BridgeConfig, room_id: &str) -> bool {
    let Some(iframe) = find_iframe(&config.element_id) else {
        return false;
    };
    let element: FrameElement = Rc::new(IframeElement::new(iframe, &config.target_origin));
    bus.emit(&BusEvent::WrapperDidMount { room_id: room_id.to_owned(), element });
    true
}

fn message_json(data: &JsValue) -> Option<Value> {
    let text: String = match js_sys::JSON::stringify(data) {
        Ok(text) => text.into(),
        Err(err) => {
            debug!(?err, "web: message data is not serializable");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(error = %err, "web: message data is not JSON");
            None
        }
    }
}

/// The two DOM listeners, removable from either the binding or the bridge.
struct WebListeners {
    window: Window,
    element: HtmlIFrameElement,
    on_message: Closure<dyn FnMut(MessageEvent)>,
    on_load: Closure<dyn FnMut(Event)>,
    attached: Cell<bool>,
}

impl WebListeners {
    fn install(&self) -> Result<(), JsValue> {
        self.attached.set(true);
        self.window.add_event_listener_with_callback("message", self.on_message.as_ref().unchecked_ref())?;
        self.element.add_event_listener_with_callback("load", self.on_load.as_ref().unchecked_ref())?;
        Ok(())
    }

    fn detach(&self) {
        if !self.attached.replace(false) {
            return;
        }
        if let Err(err) =
            self.window.remove_event_listener_with_callback("message", self.on_message.as_ref().unchecked_ref())
        {
            warn!(?err, "web: removing message listener failed");
        }
        if let Err(err) = self.element.remove_event_listener_with_callback("load", self.on_load.as_ref().unchecked_ref())
        {
            warn!(?err, "web: removing load listener failed");
        }
        debug!("web: listeners detached");
    }
}

/// DOM listeners routing browser events into a bridge.
///
/// The listeners come off when the binding is dropped or when the bridge is
/// destroyed, whichever happens first.
pub struct WebBinding {
    listeners: Rc<WebListeners>,
}

impl WebBinding {
    /// Install the window `message` listener and the iframe `load` listener,
    /// and register their removal with the bridge's teardown.
    ///
    /// # Errors
    ///
    /// Returns the DOM error when there is no window or a listener cannot be
    /// added, or an error when the bridge is borrowed elsewhere.
    pub fn attach<R: Room + 'static>(bridge: &BridgeHandle<R>, element: HtmlIFrameElement) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;

        let weak = Rc::downgrade(bridge);
        let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            let Some(bridge) = weak.upgrade() else {
                return;
            };
            let Some(data) = message_json(&event.data()) else {
                return;
            };
            match bridge.try_borrow_mut() {
                Ok(mut bridge) => {
                    let outcome = bridge.handle_message(&event.origin(), &data);
                    debug!(?outcome, "web: message handled");
                }
                Err(_) => warn!("web: message while bridge is busy, dropped"),
            }
        });

        let weak = Rc::downgrade(bridge);
        let on_load = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            let Some(bridge) = weak.upgrade() else {
                return;
            };
            let Ok(mut bridge) = bridge.try_borrow_mut() else {
                warn!("web: iframe load while bridge is busy, dropped");
                return;
            };
            if let Err(err) = bridge.handle_iframe_load() {
                warn!(error = %err, "web: iframe load handling failed");
            }
        });

        let listeners = Rc::new(WebListeners { window, element, on_message, on_load, attached: Cell::new(false) });
        let Ok(mut controller) = bridge.try_borrow_mut() else {
            return Err(JsValue::from_str("bridge is busy"));
        };
        if let Err(err) = listeners.install() {
            listeners.detach();
            return Err(err);
        }
        let teardown = Rc::clone(&listeners);
        controller.on_destroy(move || teardown.detach());

        Ok(Self { listeners })
    }

    /// Remove both listeners. Later calls do nothing.
    pub fn detach(&self) {
        self.listeners.detach();
    }
}

impl Drop for WebBinding {
    fn drop(&mut self) {
        self.detach();
    }
}
