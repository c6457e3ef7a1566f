//! Authorization decision derived from the persisted session.

use crate::session::{Session, SessionError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthDecision {
    /// No load has committed yet.
    #[default]
    Unknown,
    Unauthenticated,
    NeedsVerification,
    Authenticated,
}

impl AuthDecision {
    /// Pure mapping from a loaded session to a decision.
    #[must_use]
    pub fn from_session(session: Option<&Session>) -> Self {
        match session {
            None => Self::Unauthenticated,
            Some(s) if s.user.is_verified => Self::Authenticated,
            Some(_) => Self::NeedsVerification,
        }
    }

    /// Map a load outcome to a decision. Storage failures fail closed.
    #[must_use]
    pub fn from_load(result: &Result<Option<Session>, SessionError>) -> Self {
        match result {
            Ok(session) => Self::from_session(session.as_ref()),
            Err(_) => Self::Unauthenticated,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Unauthenticated => "unauthenticated",
            Self::NeedsVerification => "needs_verification",
            Self::Authenticated => "authenticated",
        }
    }
}

impl std::fmt::Display for AuthDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "decision_test.rs"]
mod tests;
