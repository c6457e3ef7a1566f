use std::sync::atomic::AtomicUsize;

use super::*;

fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn Fn() + Send + Sync>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let log_for_make = log.clone();
    let make = move |name: &'static str| -> Box<dyn Fn() + Send + Sync> {
        let log = log_for_make.clone();
        Box::new(move || log.lock().unwrap().push(name))
    };
    (log, make)
}

#[test]
fn publish_runs_handlers_in_registration_order() {
    let bus = AuthEventBus::new();
    let (log, make) = recorder();
    let _a = bus.subscribe(make("a"));
    let _b = bus.subscribe(make("b"));
    let _c = bus.subscribe(make("c"));

    bus.publish();

    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn publish_with_no_listeners_is_noop() {
    let bus = AuthEventBus::new();
    bus.publish();
    assert_eq!(bus.listener_count(), 0);
}

#[test]
fn unsubscribed_handler_is_not_invoked() {
    let bus = AuthEventBus::new();
    let (log, make) = recorder();
    let a = bus.subscribe(make("a"));
    let _b = bus.subscribe(make("b"));

    a.unsubscribe();
    bus.publish();

    assert_eq!(*log.lock().unwrap(), vec!["b"]);
}

#[test]
fn second_unsubscribe_is_harmless_and_keeps_other_listeners() {
    let bus = AuthEventBus::new();
    let (log, make) = recorder();
    let a = bus.subscribe(make("a"));
    let _b = bus.subscribe(make("b"));

    a.unsubscribe();
    a.unsubscribe();

    assert_eq!(bus.listener_count(), 1);
    bus.publish();
    assert_eq!(*log.lock().unwrap(), vec!["b"]);
}

#[test]
fn same_handler_subscribed_twice_is_removed_one_at_a_time() {
    let bus = AuthEventBus::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let make = || {
        let hits = hits.clone();
        move || {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    };
    let first = bus.subscribe(make());
    let _second = bus.subscribe(make());

    first.unsubscribe();
    bus.publish();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn panicking_handler_does_not_stop_later_handlers() {
    let bus = AuthEventBus::new();
    let (log, make) = recorder();
    let _a = bus.subscribe(make("a"));
    let _boom = bus.subscribe(|| panic!("listener failure"));
    let _c = bus.subscribe(make("c"));

    bus.publish();

    assert_eq!(*log.lock().unwrap(), vec!["a", "c"]);
}

#[test]
fn unsubscribe_after_bus_dropped_is_noop() {
    let bus = AuthEventBus::new();
    let sub = bus.subscribe(|| {});
    drop(bus);
    sub.unsubscribe();
}

#[test]
fn clones_share_listeners() {
    let bus = AuthEventBus::new();
    let other = bus.clone();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let _sub = bus.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    other.refresh_auth_state();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn handler_may_unsubscribe_itself_during_publish() {
    let bus = AuthEventBus::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

    let counter = hits.clone();
    let slot_in_handler = slot.clone();
    let sub = bus.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(sub) = slot_in_handler.lock().unwrap().as_ref() {
            sub.unsubscribe();
        }
    });
    *slot.lock().unwrap() = Some(sub);

    bus.publish();
    bus.publish();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(bus.listener_count(), 0);
}
