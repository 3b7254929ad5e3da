//! Backend mode resolution.
//!
//! Decides which synthesis backend a play request uses, given current
//! capability: local platform voices win, a configured remote credential is
//! the fallback, and with neither the session cannot speak at all.

use serde::{Deserialize, Serialize};

/// The backend currently selected for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    /// Platform speech engine with at least one installed voice.
    Local,

    /// Remote cloud synthesis via the configured credential.
    Remote,

    /// Neither capability is present — nothing can play.
    Unavailable,
}

/// Resolves and caches the active [`Mode`].
///
/// A resolved `Local`/`Remote` value is sticky across ordinary calls so the
/// backend cannot flap mid-utterance; `Unavailable` is never sticky, because
/// voices load asynchronously and credentials can be saved later — the next
/// forced resolution (every play issues one) must pick up new capability.
#[derive(Debug, Default)]
pub struct ModeResolver {
    resolved: Option<Mode>,
}

impl ModeResolver {
    /// Create an unresolved resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self { resolved: None }
    }

    /// Resolve the active mode from current capability.
    ///
    /// With `force = false` a previously resolved `Local`/`Remote` is
    /// returned unchanged; `force = true` (and any previous `Unavailable`)
    /// re-evaluates from scratch.
    pub fn resolve(&mut self, force: bool, has_voices: bool, has_credential: bool) -> Mode {
        if !force {
            if let Some(mode) = self.resolved {
                if mode != Mode::Unavailable {
                    return mode;
                }
            }
        }

        let mode = if has_voices {
            Mode::Local
        } else if has_credential {
            Mode::Remote
        } else {
            Mode::Unavailable
        };

        if self.resolved != Some(mode) {
            tracing::debug!(?mode, has_voices, has_credential, "Playback mode resolved");
        }
        self.resolved = Some(mode);
        mode
    }

    /// The last resolved mode, if any.
    #[must_use]
    pub const fn current(&self) -> Option<Mode> {
        self.resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_voices_win_over_credential() {
        let mut resolver = ModeResolver::new();
        assert_eq!(resolver.resolve(true, true, true), Mode::Local);
    }

    #[test]
    fn credential_without_voices_selects_remote() {
        let mut resolver = ModeResolver::new();
        assert_eq!(resolver.resolve(true, false, true), Mode::Remote);
    }

    #[test]
    fn nothing_available_is_unavailable() {
        let mut resolver = ModeResolver::new();
        assert_eq!(resolver.resolve(true, false, false), Mode::Unavailable);
    }

    #[test]
    fn resolved_mode_is_sticky_without_force() {
        let mut resolver = ModeResolver::new();
        assert_eq!(resolver.resolve(true, true, false), Mode::Local);
        // Capability changed, but an unforced call must not flap mid-utterance.
        assert_eq!(resolver.resolve(false, false, true), Mode::Local);
        // A forced call re-evaluates.
        assert_eq!(resolver.resolve(true, false, true), Mode::Remote);
    }

    #[test]
    fn unavailable_is_never_sticky() {
        let mut resolver = ModeResolver::new();
        assert_eq!(resolver.resolve(true, false, false), Mode::Unavailable);
        // Voices appeared later; even an unforced call re-evaluates.
        assert_eq!(resolver.resolve(false, true, false), Mode::Local);
    }
}
