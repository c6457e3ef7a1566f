//! Session-gated navigation.
//!
//! SYSTEM CONTEXT
//! ==============
//! Wraps the app's screen tree. Decides from the persisted session whether
//! the user may see authenticated content, must verify their email, or must
//! go back to onboarding, and corrects the navigation location when it
//! disagrees.

pub mod controller;
pub mod decision;
pub mod reconcile;

pub use controller::{AuthGate, GateError, GateSnapshot, GateView, Trigger};
pub use decision::AuthDecision;
pub use reconcile::{reconcile, should_recheck};
