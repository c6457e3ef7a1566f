//! Clients for remote backend services.
//!
//! ARCHITECTURE
//! ============
//! Each service sits behind a trait so the gate-side code and tests can run
//! against in-process fakes; the HTTP implementations are thin `reqwest`
//! wrappers.

pub mod incoming_call;
