//! Session-gated navigation core for the telederm mobile client.
//!
//! The crate decides, on every navigation or auth change, whether the user
//! may see authenticated content, must verify their email, or must go back
//! to onboarding. Around that gate sit the persisted session store, the auth
//! event bus that triggers re-evaluation, the active-call indicator, and a
//! poller for incoming calls.

pub mod app;
pub mod bus;
pub mod call;
pub mod config;
pub mod gate;
pub mod nav;
pub mod services;
pub mod session;

pub use app::ClientCore;
pub use bus::{AuthEventBus, Subscription};
pub use call::{CallData, CallIndicator, CallSnapshot, CallState};
pub use config::{AppConfig, ConfigError};
pub use gate::{AuthDecision, AuthGate, GateError, GateSnapshot, GateView};
pub use nav::{Location, Navigator, Redirect};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionError, SessionStore, UserProfile};
