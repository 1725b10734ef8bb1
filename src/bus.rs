//! Internal pub/sub bus.
//!
//! Sequences DOM-mount timing against controller initialization and lets the
//! hosting UI observe the bridge lifecycle. Handlers are plain closures keyed
//! by a [`SubscriptionId`]; a subscription listens to one or more [`Topic`]s,
//! may be one-shot, and may be scoped to a single room with
//! [`EventBus::on_room`]. A bridge only ever listens to its own room.
//!
//! Single-threaded. Handlers are taken out of the table while they run, so a
//! handler may emit, subscribe or unsubscribe (itself included) without
//! re-borrowing the table. A handler that is already running is skipped by a
//! nested emit of the same topic.

#[cfg(test)]
#[path = "bus_test.rs"]
mod bus_test;

use std::cell::RefCell;
use std::fmt;

use uuid::Uuid;

use crate::frame::FrameElement;

/// Token returned by [`EventBus::on`] and [`EventBus::once`].
pub type SubscriptionId = Uuid;

type Handler = Box<dyn FnMut(&BusEvent)>;

/// Signal categories carried by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A bridge starts attaching to a room that already holds attributes.
    StartCreate,
    /// Attaching finished.
    OnCreate,
    /// The hosting UI rendered the iframe element.
    WrapperDidMount,
    /// The hosting UI re-rendered the iframe element.
    WrapperDidUpdate,
    /// The iframe document finished loading.
    IframeLoad,
    /// The iframe content is ready for replayed state.
    Ready,
    DisplayIframe,
    HideIframe,
    /// A bridge was torn down. A new one may be created afterwards.
    Destroyed,
}

/// A signal on the bus. Every signal names the room it concerns, so one bus
/// can serve the bridges of several rooms.
#[derive(Clone)]
pub enum BusEvent {
    StartCreate { room_id: String },
    OnCreate { room_id: String },
    WrapperDidMount { room_id: String, element: FrameElement },
    WrapperDidUpdate { room_id: String, element: FrameElement },
    IframeLoad { room_id: String },
    Ready { room_id: String },
    DisplayIframe { room_id: String },
    HideIframe { room_id: String },
    Destroyed { room_id: String },
}

impl BusEvent {
    #[must_use]
    pub fn topic(&self) -> Topic {
        match self {
            Self::StartCreate { .. } => Topic::StartCreate,
            Self::OnCreate { .. } => Topic::OnCreate,
            Self::WrapperDidMount { .. } => Topic::WrapperDidMount,
            Self::WrapperDidUpdate { .. } => Topic::WrapperDidUpdate,
            Self::IframeLoad { .. } => Topic::IframeLoad,
            Self::Ready { .. } => Topic::Ready,
            Self::DisplayIframe { .. } => Topic::DisplayIframe,
            Self::HideIframe { .. } => Topic::HideIframe,
            Self::Destroyed { .. } => Topic::Destroyed,
        }
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        match self {
            Self::StartCreate { room_id }
            | Self::OnCreate { room_id }
            | Self::WrapperDidMount { room_id, .. }
            | Self::WrapperDidUpdate { room_id, .. }
            | Self::IframeLoad { room_id }
            | Self::Ready { room_id }
            | Self::DisplayIframe { room_id }
            | Self::HideIframe { room_id }
            | Self::Destroyed { room_id } => room_id,
        }
    }

    /// The hosting element carried by mount signals.
    #[must_use]
    pub fn element(&self) -> Option<FrameElement> {
        match self {
            Self::WrapperDidMount { element, .. } | Self::WrapperDidUpdate { element, .. } => Some(element.clone()),
            _ => None,
        }
    }
}

impl fmt::Debug for BusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(&format!("{:?}", self.topic())).field("room_id", &self.room_id()).finish_non_exhaustive()
    }
}

struct Subscription {
    id: SubscriptionId,
    topics: Vec<Topic>,
    /// Only signals naming this room are delivered. `None` hears every room.
    room: Option<String>,
    once: bool,
    /// `None` while the handler is running.
    handler: Option<Handler>,
}

/// Closure-based event emitter.
#[derive(Default)]
pub struct EventBus {
    subscriptions: RefCell<Vec<Subscription>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus").field("subscriptions", &self.subscriptions.borrow().len()).finish()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every signal of the given topics.
    pub fn on(&self, topics: &[Topic], handler: impl FnMut(&BusEvent) + 'static) -> SubscriptionId {
        self.subscribe(topics, None, false, Box::new(handler))
    }

    /// Subscribe to the signals of the given topics that name `room_id`.
    pub fn on_room(
        &self,
        room_id: &str,
        topics: &[Topic],
        handler: impl FnMut(&BusEvent) + 'static,
    ) -> SubscriptionId {
        self.subscribe(topics, Some(room_id.to_owned()), false, Box::new(handler))
    }

    /// Subscribe to the first signal of any of the given topics. The
    /// subscription is consumed by that signal, whichever topic it carries.
    pub fn once(&self, topics: &[Topic], handler: impl FnMut(&BusEvent) + 'static) -> SubscriptionId {
        self.subscribe(topics, None, true, Box::new(handler))
    }

    fn subscribe(&self, topics: &[Topic], room: Option<String>, once: bool, handler: Handler) -> SubscriptionId {
        let id = Uuid::new_v4();
        self.subscriptions.borrow_mut().push(Subscription {
            id,
            topics: topics.to_vec(),
            room,
            once,
            handler: Some(handler),
        });
        id
    }

    /// Remove a subscription. Returns `false` when it was already gone.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.borrow_mut();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// Deliver a signal to its subscribers in subscription order. Returns how
    /// many handlers ran.
    pub fn emit(&self, event: &BusEvent) -> usize {
        let topic = event.topic();
        let room_id = event.room_id();
        let targets: Vec<(SubscriptionId, bool)> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|s| s.topics.contains(&topic))
            .filter(|s| s.room.as_deref().is_none_or(|room| room == room_id))
            .map(|s| (s.id, s.once))
            .collect();

        let mut delivered = 0;
        for (id, once) in targets {
            let Some(mut handler) = self.take_handler(id, once) else {
                continue;
            };
            handler(event);
            delivered += 1;
            if !once {
                self.restore_handler(id, handler);
            }
        }
        delivered
    }

    fn take_handler(&self, id: SubscriptionId, once: bool) -> Option<Handler> {
        let mut subscriptions = self.subscriptions.borrow_mut();
        let index = subscriptions.iter().position(|s| s.id == id)?;
        if once {
            subscriptions.remove(index).handler
        } else {
            subscriptions[index].handler.take()
        }
    }

    fn restore_handler(&self, id: SubscriptionId, handler: Handler) {
        if let Some(subscription) = self.subscriptions.borrow_mut().iter_mut().find(|s| s.id == id) {
            subscription.handler = Some(handler);
        }
    }

    /// Number of subscriptions listening to `topic`.
    #[must_use]
    pub fn listener_count(&self, topic: Topic) -> usize {
        self.subscriptions.borrow().iter().filter(|s| s.topics.contains(&topic)).count()
    }

    #[must_use]
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscriptions.borrow().iter().any(|s| s.id == id)
    }
}
