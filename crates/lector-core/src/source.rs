//! Collaborator traits — the narrow seams between the playback engine and
//! its host application.
//!
//! The session consumes a [`TextSource`] (what to speak, and which regions
//! to highlight) and produces into a [`StatusSink`] (human-readable progress
//! strings). Both are owned by the embedder; the session holds the source
//! weakly and must tolerate it disappearing, throwing, or returning nothing.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ReaderError;

// ── Action identifiers ─────────────────────────────────────────────

/// Opaque identifier for one speakable action (e.g. one "read this aloud"
/// control in the host UI).
///
/// Re-invoking the same action while it is playing toggles pause/resume;
/// invoking a different action stops the current one first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(String);

impl ActionId {
    /// Create an action id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ActionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Highlight handles ──────────────────────────────────────────────

/// Opaque handle to one highlightable word.
///
/// The scheduler calls [`mark_current`](WordToken::mark_current) when the
/// word becomes the currently-spoken one and [`clear`](WordToken::clear)
/// when the pointer moves on. Implementations decide what "marking" means
/// (a CSS class, a terminal echo, nothing at all).
pub trait WordToken: Send + Sync {
    /// Mark this word as the one currently being spoken.
    fn mark_current(&self);

    /// Remove the current-word marker.
    fn clear(&self);

    /// Bring the word into view. Default: no-op.
    fn scroll_into_view(&self) {}
}

/// One contiguous region of highlightable text.
///
/// Tokenization must be idempotent: the first call splits the region into
/// word tokens, later calls return the cached sequence. Roots live for the
/// whole page/session lifetime and are never destroyed by the engine.
pub trait HighlightRoot: Send + Sync {
    /// The ordered word tokens of this region.
    fn word_tokens(&self) -> Vec<Arc<dyn WordToken>>;
}

// ── Text source ────────────────────────────────────────────────────

/// Supplies the text to speak and the regions to highlight for an action.
pub trait TextSource: Send + Sync {
    /// The text to speak for `action`.
    ///
    /// Errors are treated as empty text by the session ("nothing to read"),
    /// never propagated to the caller of play.
    fn text(&self, action: &ActionId) -> Result<String, ReaderError>;

    /// The ordered highlight regions for `action`. May be empty, in which
    /// case audio plays without a visual highlight.
    fn highlight_roots(&self, action: &ActionId) -> Vec<Arc<dyn HighlightRoot>>;
}

// ── Status sink ────────────────────────────────────────────────────

/// Receives one plain, user-facing status string after every state
/// transition. Messages are for humans, not for machine parsing.
pub trait StatusSink: Send + Sync {
    /// Replace the displayed status with `message`.
    fn set_status(&self, message: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_id_round_trips_through_display() {
        let id = ActionId::from("read-question");
        assert_eq!(id.to_string(), "read-question");
        assert_eq!(id.as_str(), "read-question");
    }

    #[test]
    fn action_ids_compare_by_value() {
        assert_eq!(ActionId::from("a"), ActionId::new(String::from("a")));
        assert_ne!(ActionId::from("a"), ActionId::from("b"));
    }
}
