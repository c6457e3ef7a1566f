//! Incoming-call polling against the notification service.
//!
//! DESIGN
//! ======
//! A background task asks the notification service for a pending incoming
//! call on a fixed interval, but only while a session token is stored. Each
//! call id is reported once per ringing period: a repeat of the id last seen
//! is suppressed until the service reports no pending call.
//!
//! The task stops when [`PollerHandle::stop`] is called, when the handle is
//! dropped, or when the receiving side of the call channel goes away.
//!
//! ERROR HANDLING
//! ==============
//! Service and storage failures are logged and the tick is skipped; polling
//! continues on the next tick.

#[cfg(test)]
#[path = "incoming_call_test.rs"]
mod incoming_call_test;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::session::SessionStore;

const INCOMING_CALL_CHANNEL_CAPACITY: usize = 16;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    #[default]
    Video,
    Voice,
}

/// A ringing call waiting for the user to answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCall {
    pub call_id: String,
    pub appointment_id: String,
    pub caller_name: String,
    #[serde(default)]
    pub call_type: CallKind,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("notification service returned status {0}")]
    Status(u16),
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Pending incoming call for the bearer of `token`, if any.
    async fn incoming_call(&self, token: &str) -> Result<Option<IncomingCall>, NotificationError>;
}

/// REST-backed notification service.
pub struct HttpNotificationService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNotificationService {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_owned() }
    }

    fn endpoint(&self) -> String {
        format!("{}/notifications/incoming-call", self.base_url)
    }
}

#[async_trait]
impl NotificationService for HttpNotificationService {
    async fn incoming_call(&self, token: &str) -> Result<Option<IncomingCall>, NotificationError> {
        let resp = self.client.get(self.endpoint()).bearer_auth(token).send().await?;
        match resp.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(resp.json::<Option<IncomingCall>>().await?),
            status => Err(NotificationError::Status(status.as_u16())),
        }
    }
}

/// Handle to a running poller. Dropping it cancels the task.
pub struct PollerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signal the poller to stop and wait for it to exit.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "incoming call poller ended abnormally");
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the poller. Incoming calls arrive on the returned receiver.
pub fn spawn_incoming_call_poller(
    service: Arc<dyn NotificationService>,
    store: Arc<dyn SessionStore>,
    interval: Duration,
) -> (PollerHandle, mpsc::Receiver<IncomingCall>) {
    let (tx, rx) = mpsc::channel(INCOMING_CALL_CHANNEL_CAPACITY);
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    info!(interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX), "incoming call poller started");

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_call_id: Option<String> = None;

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                () = tx.closed() => break,
                _ = ticker.tick() => {
                    let Some(call) = poll_once(service.as_ref(), store.as_ref(), &mut last_call_id).await else {
                        continue;
                    };
                    info!(call_id = %call.call_id, appointment_id = %call.appointment_id, "incoming call");
                    if tx.send(call).await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("incoming call poller stopped");
    });

    (PollerHandle { stop: Some(stop_tx), task }, rx)
}

/// One poll cycle. Returns a call only when it has not been reported yet.
async fn poll_once(
    service: &dyn NotificationService,
    store: &dyn SessionStore,
    last_call_id: &mut Option<String>,
) -> Option<IncomingCall> {
    let session = match store.load().await {
        Ok(Some(session)) => session,
        Ok(None) => {
            *last_call_id = None;
            return None;
        }
        Err(e) => {
            warn!(error = %e, "could not read session for incoming call poll");
            return None;
        }
    };

    match service.incoming_call(&session.token).await {
        Ok(Some(call)) => {
            if last_call_id.as_deref() == Some(call.call_id.as_str()) {
                return None;
            }
            *last_call_id = Some(call.call_id.clone());
            Some(call)
        }
        Ok(None) => {
            *last_call_id = None;
            None
        }
        Err(e) => {
            warn!(error = %e, "incoming call poll failed");
            None
        }
    }
}
