//! Runtime configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SESSION_DIR: &str = ".telederm";
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3000/api";
pub const DEFAULT_INCOMING_CALL_POLL_SECS: u64 = 5;
pub const DEFAULT_CALL_TICK_MS: u64 = 1000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub session_dir: PathBuf,
    pub api_base_url: String,
    pub incoming_call_poll: Duration,
    pub call_tick: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session_dir: PathBuf::from(DEFAULT_SESSION_DIR),
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            incoming_call_poll: Duration::from_secs(DEFAULT_INCOMING_CALL_POLL_SECS),
            call_tick: Duration::from_millis(DEFAULT_CALL_TICK_MS),
        }
    }
}

impl AppConfig {
    /// Build config from the process environment.
    ///
    /// Optional:
    /// - `TELEDERM_SESSION_DIR`: default `.telederm`
    /// - `TELEDERM_API_BASE_URL`: default `http://127.0.0.1:3000/api`
    /// - `TELEDERM_INCOMING_CALL_POLL_SECS`: default 5
    /// - `TELEDERM_CALL_TICK_MS`: default 1000
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unparsable or zero intervals
    /// and for base URLs that are not `http(s)://`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let session_dir = lookup("TELEDERM_SESSION_DIR").map_or(defaults.session_dir, PathBuf::from);

        let api_base_url = match lookup("TELEDERM_API_BASE_URL") {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                url.trim_end_matches('/').to_owned()
            }
            Some(url) => return Err(ConfigError::InvalidValue { var: "TELEDERM_API_BASE_URL", value: url }),
            None => defaults.api_base_url,
        };

        let poll_secs = parse_positive(&lookup, "TELEDERM_INCOMING_CALL_POLL_SECS", DEFAULT_INCOMING_CALL_POLL_SECS)?;
        let tick_ms = parse_positive(&lookup, "TELEDERM_CALL_TICK_MS", DEFAULT_CALL_TICK_MS)?;

        Ok(Self {
            session_dir,
            api_base_url,
            incoming_call_poll: Duration::from_secs(poll_secs),
            call_tick: Duration::from_millis(tick_ms),
        })
    }
}

fn parse_positive<F>(lookup: &F, var: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ConfigError::InvalidValue { var, value: raw }),
    }
}
