use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::*;
use crate::frame::FrameHost;
use crate::memory::RecordingFrame;

fn counter() -> (Rc<Cell<usize>>, impl FnMut(&BusEvent) + 'static) {
    let count = Rc::new(Cell::new(0));
    let sink = Rc::clone(&count);
    (count, move |_: &BusEvent| sink.set(sink.get() + 1))
}

fn room() -> String {
    "r1".to_owned()
}

fn mount_event() -> BusEvent {
    BusEvent::WrapperDidMount { room_id: room(), element: RecordingFrame::new() }
}

// =============================================================
// on / off
// =============================================================

#[test]
fn on_receives_every_signal_of_topic() {
    let bus = EventBus::new();
    let (count, handler) = counter();
    bus.on(&[Topic::IframeLoad], handler);

    assert_eq!(bus.emit(&BusEvent::IframeLoad { room_id: room() }), 1);
    assert_eq!(bus.emit(&BusEvent::IframeLoad { room_id: room() }), 1);
    assert_eq!(bus.emit(&BusEvent::Ready { room_id: room() }), 0);
    assert_eq!(count.get(), 2);
}

#[test]
fn off_stops_delivery() {
    let bus = EventBus::new();
    let (count, handler) = counter();
    let id = bus.on(&[Topic::Ready], handler);

    assert!(bus.off(id));
    assert!(!bus.off(id));
    bus.emit(&BusEvent::Ready { room_id: room() });
    assert_eq!(count.get(), 0);
    assert_eq!(bus.listener_count(Topic::Ready), 0);
}

#[test]
fn handlers_run_in_subscription_order() {
    let bus = EventBus::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    for n in 0..3 {
        let order = Rc::clone(&order);
        bus.on(&[Topic::HideIframe], move |_| order.borrow_mut().push(n));
    }
    bus.emit(&BusEvent::HideIframe { room_id: room() });
    assert_eq!(*order.borrow(), vec![0, 1, 2]);
}

// =============================================================
// once
// =============================================================

#[test]
fn once_fires_exactly_once() {
    let bus = EventBus::new();
    let (count, handler) = counter();
    let id = bus.once(&[Topic::WrapperDidMount], handler);

    bus.emit(&mount_event());
    bus.emit(&mount_event());

    assert_eq!(count.get(), 1);
    assert!(!bus.is_subscribed(id));
}

#[test]
fn once_over_two_topics_is_consumed_by_either() {
    let bus = EventBus::new();
    let (count, handler) = counter();
    bus.once(&[Topic::WrapperDidMount, Topic::WrapperDidUpdate], handler);

    bus.emit(&BusEvent::WrapperDidUpdate { room_id: room(), element: RecordingFrame::new() });
    bus.emit(&mount_event());

    assert_eq!(count.get(), 1);
    assert_eq!(bus.listener_count(Topic::WrapperDidMount), 0);
    assert_eq!(bus.listener_count(Topic::WrapperDidUpdate), 0);
}

// =============================================================
// room scope
// =============================================================

#[test]
fn room_subscription_hears_only_its_room() {
    let bus = EventBus::new();
    let (count, handler) = counter();
    bus.on_room("r1", &[Topic::Ready], handler);

    assert_eq!(bus.emit(&BusEvent::Ready { room_id: "r2".to_owned() }), 0);
    assert_eq!(bus.emit(&BusEvent::Ready { room_id: room() }), 1);
    assert_eq!(count.get(), 1);
}

#[test]
fn unscoped_subscription_hears_every_room() {
    let bus = EventBus::new();
    let (count, handler) = counter();
    bus.on(&[Topic::HideIframe], handler);

    bus.emit(&BusEvent::HideIframe { room_id: "r1".to_owned() });
    bus.emit(&BusEvent::HideIframe { room_id: "r2".to_owned() });
    assert_eq!(count.get(), 2);
}

#[test]
fn event_names_its_room() {
    assert_eq!(mount_event().room_id(), "r1");
    assert_eq!(BusEvent::Destroyed { room_id: "r9".to_owned() }.room_id(), "r9");
}

// =============================================================
// reentrancy
// =============================================================

#[test]
fn handler_may_unsubscribe_itself() {
    let bus = Rc::new(EventBus::new());
    let id_slot = Rc::new(Cell::new(None));
    let count = Rc::new(Cell::new(0));

    let id = {
        let handle = Rc::clone(&bus);
        let id_slot = Rc::clone(&id_slot);
        let count = Rc::clone(&count);
        bus.on(&[Topic::Ready], move |_| {
            count.set(count.get() + 1);
            if let Some(id) = id_slot.get() {
                handle.off(id);
            }
        })
    };
    id_slot.set(Some(id));

    bus.emit(&BusEvent::Ready { room_id: room() });
    bus.emit(&BusEvent::Ready { room_id: room() });
    assert_eq!(count.get(), 1);
}

#[test]
fn handler_may_emit_other_topics() {
    let bus = Rc::new(EventBus::new());
    let (count, handler) = counter();
    bus.on(&[Topic::DisplayIframe], handler);
    {
        let inner = Rc::clone(&bus);
        bus.on(&[Topic::IframeLoad], move |_| {
            inner.emit(&BusEvent::DisplayIframe { room_id: room() });
        });
    }

    bus.emit(&BusEvent::IframeLoad { room_id: room() });
    assert_eq!(count.get(), 1);
}

#[test]
fn nested_emit_skips_running_handler() {
    let bus = Rc::new(EventBus::new());
    let count = Rc::new(Cell::new(0));
    {
        let inner = Rc::clone(&bus);
        let count = Rc::clone(&count);
        bus.on(&[Topic::Ready], move |_| {
            count.set(count.get() + 1);
            inner.emit(&BusEvent::Ready { room_id: room() });
        });
    }

    assert_eq!(bus.emit(&BusEvent::Ready { room_id: room() }), 1);
    assert_eq!(count.get(), 1);
}

// =============================================================
// BusEvent
// =============================================================

#[test]
fn mount_signals_carry_element() {
    let frame = RecordingFrame::new();
    frame.set_source("https://a.example");
    let element: FrameElement = frame;
    let event = BusEvent::WrapperDidMount { room_id: room(), element };

    assert_eq!(event.topic(), Topic::WrapperDidMount);
    let carried = event.element().expect("element");
    assert_eq!(carried.source().as_deref(), Some("https://a.example"));
    assert!(BusEvent::Ready { room_id: room() }.element().is_none());
}

#[test]
fn debug_names_topic() {
    let load = format!("{:?}", BusEvent::IframeLoad { room_id: room() });
    assert!(load.starts_with("IframeLoad") && load.contains("r1"), "{load}");
    let destroyed = format!("{:?}", BusEvent::Destroyed { room_id: "r1".to_owned() });
    assert!(destroyed.contains("Destroyed") && destroyed.contains("r1"));
}
