//! In-process session store.
//!
//! Holds the two raw key values exactly as a device key/value store would,
//! so out-of-sync or malformed contents go through the same parsing path as
//! the file-backed store. Also used by demos and tests, which can force I/O
//! failures.

use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Session, SessionError, SessionStore};

#[derive(Default)]
struct RawKeys {
    token: Option<String>,
    user: Option<String>,
}

#[derive(Default)]
pub struct MemorySessionStore {
    keys: Mutex<RawKeys>,
    fail_io: AtomicBool,
    loads: AtomicUsize,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(session: Session) -> Self {
        let store = Self::new();
        store.put_raw(Some(session.token), serde_json::to_string(&session.user).ok());
        store
    }

    /// Overwrite both raw key values, bypassing validation.
    pub fn put_raw(&self, token: Option<String>, user: Option<String>) {
        let mut keys = self.keys.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        keys.token = token;
        keys.user = user;
    }

    /// Make every subsequent operation fail with an I/O error.
    pub fn set_fail_io(&self, fail: bool) {
        self.fail_io.store(fail, Ordering::SeqCst);
    }

    /// Number of `load` calls served so far.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn check_io(&self) -> Result<(), SessionError> {
        if self.fail_io.load(Ordering::SeqCst) {
            return Err(io::Error::other("storage unavailable").into());
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<Session>, SessionError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.check_io()?;
        let (token, user) = {
            let keys = self.keys.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            (keys.token.clone(), keys.user.clone())
        };
        Ok(Session::from_raw(token, user))
    }

    async fn save(&self, session: &Session) -> Result<(), SessionError> {
        self.check_io()?;
        let user = serde_json::to_string(&session.user)?;
        self.put_raw(Some(session.token.clone()), Some(user));
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.check_io()?;
        self.put_raw(None, None);
        Ok(())
    }
}
