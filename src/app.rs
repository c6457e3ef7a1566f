//! Application root: owns the bus, the session store, the gate, and the call
//! indicator, and gives credential flows one place to write through.
//!
//! SYSTEM CONTEXT
//! ==============
//! Login, registration, and verification screens call into [`ClientCore`]
//! after a successful backend exchange. Each write lands in the session store
//! first and is followed by a bus publish so the gate re-evaluates.

#[cfg(test)]
#[path = "app_test.rs"]
mod app_test;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::bus::AuthEventBus;
use crate::call::CallIndicator;
use crate::config::AppConfig;
use crate::gate::{AuthGate, GateError};
use crate::nav::{Location, Navigator};
use crate::services::incoming_call::{IncomingCall, NotificationService, PollerHandle, spawn_incoming_call_poller};
use crate::session::{Session, SessionError, SessionStore};

pub struct ClientCore {
    bus: AuthEventBus,
    store: Arc<dyn SessionStore>,
    gate: AuthGate,
    call: CallIndicator,
    config: AppConfig,
}

impl ClientCore {
    /// Mount the gate at `location` and set up the call indicator.
    pub fn start(
        config: AppConfig,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
        location: Location,
    ) -> Self {
        let bus = AuthEventBus::new();
        let gate = AuthGate::spawn(store.clone(), navigator, &bus, location);
        let call = CallIndicator::with_tick(config.call_tick);
        Self { bus, store, gate, call, config }
    }

    #[must_use]
    pub fn bus(&self) -> &AuthEventBus {
        &self.bus
    }

    #[must_use]
    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    #[must_use]
    pub fn call(&self) -> &CallIndicator {
        &self.call
    }

    /// Persist a freshly issued session and ask the gate to re-evaluate.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the session could not be written; the
    /// bus is not published in that case.
    pub async fn complete_login(&self, session: Session) -> Result<(), SessionError> {
        let email = session.user.email.clone();
        self.store.save(&session).await?;
        info!(%email, verified = session.user.is_verified, "session stored");
        self.bus.refresh_auth_state();
        Ok(())
    }

    /// Record a completed email verification and ask the gate to re-evaluate.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the profile could not be updated.
    pub async fn mark_verified(&self) -> Result<bool, SessionError> {
        let updated = self.store.set_verified(true).await?;
        if updated {
            self.bus.refresh_auth_state();
        }
        Ok(updated)
    }

    /// End any active call, clear the session, and land on welcome.
    ///
    /// # Errors
    ///
    /// See [`AuthGate::logout`].
    pub async fn logout(&self) -> Result<(), GateError> {
        self.call.end_call();
        self.gate.logout().await
    }

    /// Start polling for incoming calls with the configured interval.
    #[must_use]
    pub fn poll_incoming_calls(
        &self,
        service: Arc<dyn NotificationService>,
    ) -> (PollerHandle, mpsc::Receiver<IncomingCall>) {
        spawn_incoming_call_poller(service, self.store.clone(), self.config.incoming_call_poll)
    }

    /// Tear down in dependency order: call tick first, then the gate.
    pub async fn shutdown(self) {
        self.call.end_call();
        self.gate.shutdown().await;
    }
}
