//! Active-call indicator state.
//!
//! DESIGN
//! ======
//! Two states, `Idle` and `InCall`, plus an elapsed-seconds counter driven by
//! one repeating tick task. Badges read a [`CallSnapshot`] through a `watch`
//! channel. Whether the badge shows is derived from state plus the current
//! location on every read and never cached.
//!
//! The tick task is owned by the indicator: `end_call` cancels it, and so
//! does dropping the indicator.

#[cfg(test)]
#[path = "call_test.rs"]
mod call_test;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::nav::Location;

pub const DEFAULT_CALL_TICK: Duration = Duration::from_secs(1);

/// Who the call is with and which appointment it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallData {
    pub participant_name: String,
    pub appointment_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CallState {
    #[default]
    Idle,
    InCall { participant_name: String, appointment_id: String, started_at: SystemTime },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallSnapshot {
    pub state: CallState,
    pub elapsed_secs: u64,
}

impl CallSnapshot {
    #[must_use]
    pub fn in_call(&self) -> bool {
        matches!(self.state, CallState::InCall { .. })
    }

    /// Elapsed time as `MM:SS`, or `H:MM:SS` past the hour.
    #[must_use]
    pub fn elapsed_label(&self) -> String {
        format_elapsed(self.elapsed_secs)
    }
}

#[must_use]
pub fn format_elapsed(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 { format!("{h}:{m:02}:{s:02}") } else { format!("{m:02}:{s:02}") }
}

pub struct CallIndicator {
    state: Arc<watch::Sender<CallSnapshot>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    tick: Duration,
}

impl Default for CallIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl CallIndicator {
    #[must_use]
    pub fn new() -> Self {
        Self::with_tick(DEFAULT_CALL_TICK)
    }

    #[must_use]
    pub fn with_tick(tick: Duration) -> Self {
        let (state, _) = watch::channel(CallSnapshot::default());
        Self { state: Arc::new(state), ticker: Mutex::new(None), tick }
    }

    #[must_use]
    pub fn snapshot(&self) -> CallSnapshot {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<CallSnapshot> {
        self.state.subscribe()
    }

    /// Enter `InCall` and start counting. No-op while the tick is running.
    pub fn start_call(&self, data: CallData) {
        let mut ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if ticker.is_some() {
            debug!(appointment_id = %data.appointment_id, "call timer already running; ignoring start");
            return;
        }

        info!(appointment_id = %data.appointment_id, participant = %data.participant_name, "call started");
        self.state.send_replace(CallSnapshot {
            state: CallState::InCall {
                participant_name: data.participant_name,
                appointment_id: data.appointment_id,
                started_at: SystemTime::now(),
            },
            elapsed_secs: 0,
        });

        let state = self.state.clone();
        let period = self.tick;
        *ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                state.send_if_modified(|s| {
                    if !s.in_call() {
                        return false;
                    }
                    s.elapsed_secs += 1;
                    true
                });
            }
        }));
    }

    /// Stop counting and return to `Idle`.
    pub fn end_call(&self) {
        let handle = self.ticker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.abort();
        }
        let previous = self.state.send_replace(CallSnapshot::default());
        if previous.in_call() {
            info!(elapsed_secs = previous.elapsed_secs, "call ended");
        }
    }

    /// Whether the floating call badge should render at `location`.
    #[must_use]
    pub fn is_visible(&self, location: &Location) -> bool {
        self.state.borrow().in_call() && !location.is_call_screen()
    }

    #[must_use]
    pub fn timer_running(&self) -> bool {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

impl Drop for CallIndicator {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
    }
}
