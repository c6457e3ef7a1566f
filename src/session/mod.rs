//! Persisted session record and the store contract the auth gate reads.
//!
//! DESIGN
//! ======
//! A session is two keys written together: a bearer token and a JSON user
//! profile. Readers that see only one of them populated treat the session as
//! absent, as do readers that cannot parse the profile. Only genuine storage
//! I/O failures surface as errors.
//!
//! Login and registration flows write through [`SessionStore::save`] and
//! then publish on the auth event bus; the gate is the only reader that
//! makes redirect decisions.

pub mod file;
pub mod memory;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Storage key holding the bearer token.
pub const TOKEN_KEY: &str = "authToken";
/// Storage key holding the serialized user profile.
pub const USER_KEY: &str = "userData";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize user profile: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Profile blob stored alongside the token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A logged-in identity: token and profile, always both present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

impl Session {
    /// Assemble a session from the two raw stored values.
    ///
    /// Returns `None` unless both keys are populated and the profile parses.
    /// A blank token counts as unpopulated.
    #[must_use]
    pub fn from_raw(token: Option<String>, user: Option<String>) -> Option<Self> {
        let token = token.filter(|t| !t.trim().is_empty());
        match (token, user) {
            (Some(token), Some(raw_user)) => match serde_json::from_str::<UserProfile>(&raw_user) {
                Ok(user) => Some(Self { token, user }),
                Err(e) => {
                    warn!(error = %e, "stored user profile is malformed; treating session as absent");
                    None
                }
            },
            (None, None) => None,
            (token, user) => {
                warn!(
                    has_token = token.is_some(),
                    has_user = user.is_some(),
                    "session keys out of sync; treating session as absent"
                );
                None
            }
        }
    }
}

/// Persistent key/value storage for the session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read the persisted session. Missing keys yield `Ok(None)`.
    async fn load(&self) -> Result<Option<Session>, SessionError>;

    /// Write token and profile together.
    async fn save(&self, session: &Session) -> Result<(), SessionError>;

    /// Remove both keys. Idempotent.
    async fn clear(&self) -> Result<(), SessionError>;

    /// Flip `is_verified` on the stored profile. Returns `false` when no
    /// session is stored.
    async fn set_verified(&self, verified: bool) -> Result<bool, SessionError> {
        let Some(mut session) = self.load().await? else {
            return Ok(false);
        };
        session.user.is_verified = verified;
        self.save(&session).await?;
        Ok(true)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
