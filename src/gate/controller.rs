//! Auth gate controller: a single task that owns the decision state.
//!
//! ARCHITECTURE
//! ============
//! Every trigger (mount, bus publish, navigation, logout) becomes a command on
//! one channel, consumed by one task. Session loads run as separate tasks and
//! report back through the same channel, so navigation and bus events keep
//! flowing while a load is pending. Readers get an immutable
//! [`GateSnapshot`] through a `watch` channel.
//!
//! ORDERING
//! ========
//! Each load is stamped with a sequence number when it is triggered. A result
//! commits only if its number is greater than the last committed one, so the
//! most recently initiated load wins regardless of completion order. Logout
//! consumes a number too, which keeps in-flight loads from restoring a
//! cleared session.
//!
//! ERROR HANDLING
//! ==============
//! Storage failures are logged and fail closed to `Unauthenticated`. The worst
//! outcome of any internal failure is a redirect to welcome.

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bus::{AuthEventBus, Subscription};
use crate::nav::{Location, Navigator};
use crate::session::{Session, SessionError, SessionStore};

use super::decision::AuthDecision;
use super::reconcile::{reconcile, should_recheck};

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("auth gate has shut down")]
    Closed,
    #[error("session storage failed: {0}")]
    Storage(#[from] SessionError),
}

/// What caused a session reload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Mount,
    Bus,
    Navigation,
}

/// Immutable view of gate state handed to readers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GateSnapshot {
    /// True until the first load commits.
    pub decision_loading: bool,
    pub decision: AuthDecision,
    /// Email of the committed session, if any.
    pub email: Option<String>,
    /// Location as last reported or redirected to.
    pub location: Location,
    /// Sequence number of the load (or logout) that produced `decision`.
    pub committed_seq: u64,
    /// Load results dropped because a newer one had already committed.
    pub stale_results: u64,
}

impl GateSnapshot {
    fn initial(location: Location) -> Self {
        Self {
            decision_loading: true,
            decision: AuthDecision::Unknown,
            email: None,
            location,
            committed_seq: 0,
            stale_results: 0,
        }
    }
}

/// What the gate renders in place of the wrapped screen tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateView<T> {
    /// Blocking placeholder while the first decision is pending.
    Loading,
    Content(T),
}

enum Command {
    Recheck(Trigger),
    LocationChanged(Location),
    Loaded { seq: u64, result: Result<Option<Session>, SessionError> },
    Logout(oneshot::Sender<Result<(), SessionError>>),
    Shutdown,
}

/// Owning handle for a running gate. Dropping it tears the gate down.
pub struct AuthGate {
    tx: UnboundedSender<Command>,
    state: watch::Receiver<GateSnapshot>,
    bus: AuthEventBus,
    subscription: Subscription,
    task: JoinHandle<()>,
}

impl AuthGate {
    /// Mount the gate at `location`. The initial load starts immediately.
    pub fn spawn(
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
        bus: &AuthEventBus,
        location: Location,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(GateSnapshot::initial(location.clone()));

        let bus_tx = tx.downgrade();
        let subscription = bus.subscribe(move || {
            if let Some(tx) = bus_tx.upgrade() {
                let _ = tx.send(Command::Recheck(Trigger::Bus));
            }
        });

        let worker = GateTask {
            store,
            navigator,
            tx: tx.downgrade(),
            state: state_tx,
            next_seq: 0,
        };
        info!(%location, "auth gate mounted");
        let _ = tx.send(Command::Recheck(Trigger::Mount));
        let task = tokio::spawn(worker.run(rx));

        Self { tx, state: state_rx, bus: bus.clone(), subscription, task }
    }

    #[must_use]
    pub fn snapshot(&self) -> GateSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver that observes every committed snapshot.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<GateSnapshot> {
        self.state.clone()
    }

    /// Wrap the screen tree: a placeholder while loading, the content after.
    pub fn render<T>(&self, content: T) -> GateView<T> {
        if self.state.borrow().decision_loading { GateView::Loading } else { GateView::Content(content) }
    }

    /// Report a navigation change from the navigation framework.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Closed`] if the gate task has stopped.
    pub fn location_changed(&self, location: Location) -> Result<(), GateError> {
        self.tx.send(Command::LocationChanged(location)).map_err(|_| GateError::Closed)
    }

    /// Force a re-evaluation by publishing on the shared auth bus.
    pub fn refresh_auth_state(&self) {
        self.bus.refresh_auth_state();
    }

    /// Clear the session and redirect to welcome without waiting for a load.
    ///
    /// The decision is forced to `Unauthenticated` even when clearing the
    /// store fails; the storage error is still returned.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Closed`] if the gate task has stopped, or
    /// [`GateError::Storage`] if the store could not be cleared.
    pub async fn logout(&self) -> Result<(), GateError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(Command::Logout(reply_tx)).map_err(|_| GateError::Closed)?;
        reply_rx.await.map_err(|_| GateError::Closed)??;
        Ok(())
    }

    /// Unsubscribe from the bus and wait for the task to finish.
    pub async fn shutdown(mut self) {
        self.subscription.unsubscribe();
        let _ = self.tx.send(Command::Shutdown);
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "auth gate task ended abnormally");
        }
    }
}

impl Drop for AuthGate {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
        self.task.abort();
    }
}

// =============================================================================
// GATE TASK
// =============================================================================

struct GateTask {
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    tx: WeakUnboundedSender<Command>,
    state: watch::Sender<GateSnapshot>,
    next_seq: u64,
}

impl GateTask {
    async fn run(mut self, mut rx: UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Recheck(trigger) => self.start_load(trigger),
                Command::LocationChanged(location) => self.on_location(location),
                Command::Loaded { seq, result } => self.on_loaded(seq, result),
                Command::Logout(reply) => {
                    let result = self.logout().await;
                    let _ = reply.send(result);
                }
                Command::Shutdown => break,
            }
        }
        debug!("auth gate stopped");
    }

    fn start_load(&mut self, trigger: Trigger) {
        self.next_seq += 1;
        let seq = self.next_seq;
        debug!(seq, ?trigger, "session load started");

        let store = self.store.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = store.load().await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::Loaded { seq, result });
            }
        });
    }

    fn on_location(&mut self, location: Location) {
        if self.state.borrow().location == location {
            return;
        }
        debug!(%location, "location changed");
        let recheck = should_recheck(&location);
        self.state.send_modify(|s| s.location = location);
        self.reconcile();
        if recheck {
            self.start_load(Trigger::Navigation);
        }
    }

    fn on_loaded(&mut self, seq: u64, result: Result<Option<Session>, SessionError>) {
        let committed = self.state.borrow().committed_seq;
        if seq <= committed {
            debug!(seq, committed, "discarding stale session load");
            self.state.send_modify(|s| s.stale_results += 1);
            return;
        }

        if let Err(e) = &result {
            error!(seq, error = %e, "session load failed; treating as unauthenticated");
        }
        let decision = AuthDecision::from_load(&result);
        let email = result.ok().flatten().map(|s| s.user.email);
        self.commit(seq, decision, email);
        self.reconcile();
    }

    async fn logout(&mut self) -> Result<(), SessionError> {
        let result = self.store.clear().await;
        if let Err(e) = &result {
            error!(error = %e, "failed to clear session during logout");
        }
        self.next_seq += 1;
        self.commit(self.next_seq, AuthDecision::Unauthenticated, None);
        self.reconcile();
        info!("logged out");
        result
    }

    fn commit(&mut self, seq: u64, decision: AuthDecision, email: Option<String>) {
        let previous = self.state.borrow().decision;
        self.state.send_modify(|s| {
            s.decision_loading = false;
            s.decision = decision;
            s.email = email;
            s.committed_seq = seq;
        });
        if previous != decision {
            info!(seq, from = %previous, to = %decision, "auth decision changed");
        }
    }

    fn reconcile(&mut self) {
        let redirect = {
            let s = self.state.borrow();
            if s.decision_loading {
                return;
            }
            reconcile(s.decision, s.email.as_deref(), &s.location)
        };
        let Some(redirect) = redirect else {
            return;
        };
        info!(%redirect, "auth gate redirect");
        self.navigator.replace(&redirect);
        self.state.send_modify(|s| s.location = redirect.location());
    }
}
