//! Auth event bus: a payload-free "auth state may have changed" signal.
//!
//! DESIGN
//! ======
//! One bus is created by the application root and handed out by clone;
//! there is no ambient global. Screens that write the session store call
//! [`AuthEventBus::refresh_auth_state`] afterwards, and the auth gate is the
//! subscriber that reacts.
//!
//! `publish` runs handlers synchronously, in registration order, against a
//! snapshot of the listener list. Handlers may therefore subscribe or
//! unsubscribe from inside a callback without deadlocking; such changes take
//! effect on the next publish.
//!
//! ERROR HANDLING
//! ==============
//! A panicking handler is caught and logged. Later handlers still run and
//! the publisher never observes the failure.

#[cfg(test)]
#[path = "bus_test.rs"]
mod bus_test;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, error};

type Handler = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Handler)>>,
}

impl Listeners {
    fn entries(&self) -> MutexGuard<'_, Vec<(u64, Handler)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone, Default)]
pub struct AuthEventBus {
    inner: Arc<Listeners>,
}

impl AuthEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a zero-argument handler.
    ///
    /// The returned [`Subscription`] removes exactly this handler when
    /// [`Subscription::unsubscribe`] is called. Dropping it without calling
    /// `unsubscribe` leaves the handler registered.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.entries().push((id, Arc::new(handler)));
        debug!(listener = id, "auth bus listener added");
        Subscription { id, listeners: Arc::downgrade(&self.inner) }
    }

    /// Invoke every registered handler, in registration order.
    pub fn publish(&self) {
        let snapshot: Vec<(u64, Handler)> = self.inner.entries().clone();
        debug!(listeners = snapshot.len(), "auth bus publish");
        for (id, handler) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler())).is_err() {
                error!(listener = id, "auth bus listener panicked");
            }
        }
    }

    /// Ask every subscriber (in practice the auth gate) to re-evaluate.
    pub fn refresh_auth_state(&self) {
        self.publish();
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.entries().len()
    }
}

/// Capability to remove one handler from the bus.
#[must_use = "dropping a Subscription does not unsubscribe; call `unsubscribe` to remove the handler"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl Subscription {
    /// Remove the handler. Calling this again is a no-op.
    pub fn unsubscribe(&self) {
        let Some(listeners) = self.listeners.upgrade() else {
            return;
        };
        let mut entries = listeners.entries();
        let before = entries.len();
        entries.retain(|(id, _)| *id != self.id);
        if entries.len() != before {
            debug!(listener = self.id, "auth bus listener removed");
        }
    }
}
