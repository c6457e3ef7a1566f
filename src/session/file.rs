//! File-backed session store: one file per storage key under a directory.
//!
//! ERROR HANDLING
//! ==============
//! A missing key file is "not found", never an error. Writes go through a
//! temp file plus rename so a reader never observes a half-written value.
//! The profile is written before the token and removed after it, so an
//! interrupted save or clear leaves at most one key, which readers treat as
//! no session. Loads read the profile before the token for the same reason.

#[cfg(test)]
#[path = "file_test.rs"]
mod file_test;

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{Session, SessionError, SessionStore, TOKEN_KEY, USER_KEY};

pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    async fn read_key(&self, key: &str) -> Result<Option<String>, SessionError> {
        match tokio::fs::read_to_string(self.key_path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_key(&self, key: &str, value: &str) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = self.key_path(&format!("{key}.tmp"));
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, self.key_path(key)).await?;
        Ok(())
    }

    async fn remove_key(&self, key: &str) -> Result<(), SessionError> {
        match tokio::fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<Session>, SessionError> {
        // Profile first, matching save: a token read here is never older
        // than the profile read before it.
        let user = self.read_key(USER_KEY).await?;
        let token = self.read_key(TOKEN_KEY).await?;
        Ok(Session::from_raw(token, user))
    }

    async fn save(&self, session: &Session) -> Result<(), SessionError> {
        let user = serde_json::to_string(&session.user)?;
        self.write_key(USER_KEY, &user).await?;
        self.write_key(TOKEN_KEY, &session.token).await?;
        debug!(dir = %self.dir.display(), email = %session.user.email, "session saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.remove_key(TOKEN_KEY).await?;
        self.remove_key(USER_KEY).await?;
        debug!(dir = %self.dir.display(), "session cleared");
        Ok(())
    }
}
