//! Pure reconciliation of a decision against the current location.
//!
//! Rules, in priority order:
//! - needs verification: anywhere but `verify-email` goes to verification.
//! - unauthenticated: anywhere outside the whitelisted auth screens goes to
//!   welcome. `verify-email` is not whitelisted here.
//! - authenticated: the unresolved boot root and the pre-auth screens go to
//!   the tab root. "Outside the tab and auth groups" means only the boot
//!   root, so stacks like the full-screen call view stay reachable.
//! - unknown: never redirects.

use crate::nav::{Location, PRE_AUTH_SCREENS, RECHECK_SCREENS, Redirect, UNAUTHENTICATED_SCREENS, VERIFY_EMAIL_SCREEN};

use super::decision::AuthDecision;

/// Redirect needed to bring `location` in line with `decision`, if any.
#[must_use]
pub fn reconcile(decision: AuthDecision, email: Option<&str>, location: &Location) -> Option<Redirect> {
    let screen = location.screen();
    match decision {
        AuthDecision::NeedsVerification => (screen != VERIFY_EMAIL_SCREEN)
            .then(|| Redirect::VerifyEmail { email: email.unwrap_or_default().to_owned() }),
        AuthDecision::Unauthenticated => {
            let allowed = location.in_auth_group() && UNAUTHENTICATED_SCREENS.contains(&screen);
            (!allowed).then_some(Redirect::Welcome)
        }
        AuthDecision::Authenticated => {
            let at_boot_root = location.group().is_empty();
            (at_boot_root || PRE_AUTH_SCREENS.contains(&screen)).then_some(Redirect::TabsRoot)
        }
        AuthDecision::Unknown => None,
    }
}

/// Whether arriving at `location` should force a fresh session load.
#[must_use]
pub fn should_recheck(location: &Location) -> bool {
    RECHECK_SCREENS.contains(&location.screen())
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
