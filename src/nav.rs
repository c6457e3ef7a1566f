//! Navigation locations, redirect targets, and the navigator seam.
//!
//! SYSTEM CONTEXT
//! ==============
//! The navigation framework owns the location. The auth gate only reads the
//! segments it is told about and asks the navigator for history-replacing
//! redirects; it never pushes.

#[cfg(test)]
#[path = "nav_test.rs"]
mod nav_test;

use std::fmt;

/// Route group holding login, registration, and verification screens.
pub const AUTH_GROUP: &str = "(auth)";
/// Route group holding the authenticated tab navigator.
pub const TABS_GROUP: &str = "(tabs)";
/// Full-screen call view.
pub const CALL_SCREEN: &str = "call";

pub const LOGIN_SCREEN: &str = "login";
pub const REGISTER_SCREEN: &str = "register";
pub const WELCOME_SCREEN: &str = "welcome";
pub const FORGOT_PASSWORD_SCREEN: &str = "forgot-password";
pub const RESET_PASSWORD_SCREEN: &str = "reset-password";
pub const VERIFY_EMAIL_SCREEN: &str = "verify-email";

/// Screens reachable without any session.
pub const UNAUTHENTICATED_SCREENS: [&str; 5] =
    [LOGIN_SCREEN, REGISTER_SCREEN, WELCOME_SCREEN, FORGOT_PASSWORD_SCREEN, RESET_PASSWORD_SCREEN];

/// Screens reachable without a fully authenticated and verified session.
pub const AUTH_SENSITIVE_SCREENS: [&str; 6] = [
    LOGIN_SCREEN,
    REGISTER_SCREEN,
    WELCOME_SCREEN,
    FORGOT_PASSWORD_SCREEN,
    RESET_PASSWORD_SCREEN,
    VERIFY_EMAIL_SCREEN,
];

/// Landing on one of these forces a fresh session load.
pub const RECHECK_SCREENS: [&str; 3] = [LOGIN_SCREEN, REGISTER_SCREEN, WELCOME_SCREEN];

/// Pre-auth screens an authenticated user is bounced out of.
pub const PRE_AUTH_SCREENS: [&str; 4] = [LOGIN_SCREEN, REGISTER_SCREEN, WELCOME_SCREEN, VERIFY_EMAIL_SCREEN];

/// Current screen identity as an ordered list of path segments.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Location {
    segments: Vec<String>,
}

impl Location {
    #[must_use]
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { segments: segments.into_iter().map(Into::into).collect() }
    }

    /// Parse a slash-separated path such as `/(tabs)/home`.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        Self::new(path.split('/').filter(|s| !s.is_empty()))
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// First path segment, or `""` at the unresolved root.
    #[must_use]
    pub fn group(&self) -> &str {
        self.segments.first().map_or("", String::as_str)
    }

    /// Second path segment, or `""` when absent.
    #[must_use]
    pub fn screen(&self) -> &str {
        self.segments.get(1).map_or("", String::as_str)
    }

    #[must_use]
    pub fn in_auth_group(&self) -> bool {
        self.group() == AUTH_GROUP
    }

    #[must_use]
    pub fn in_tabs_group(&self) -> bool {
        self.group() == TABS_GROUP
    }

    #[must_use]
    pub fn is_call_screen(&self) -> bool {
        self.group() == CALL_SCREEN || self.screen() == CALL_SCREEN
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

/// A history-replacing navigation requested by the gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Redirect {
    Welcome,
    VerifyEmail { email: String },
    TabsRoot,
}

impl Redirect {
    /// Location the navigator lands on once the redirect is applied.
    #[must_use]
    pub fn location(&self) -> Location {
        match self {
            Self::Welcome => Location::new([AUTH_GROUP, WELCOME_SCREEN]),
            Self::VerifyEmail { .. } => Location::new([AUTH_GROUP, VERIFY_EMAIL_SCREEN]),
            Self::TabsRoot => Location::new([TABS_GROUP]),
        }
    }

    /// Route parameters carried with the redirect.
    #[must_use]
    pub fn params(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::VerifyEmail { email } => vec![("email", email.as_str())],
            Self::Welcome | Self::TabsRoot => Vec::new(),
        }
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location())?;
        let params = self.params();
        for (i, (key, value)) in params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

/// Navigation framework seam. Implementations must replace, never push.
pub trait Navigator: Send + Sync {
    fn replace(&self, redirect: &Redirect);
}
