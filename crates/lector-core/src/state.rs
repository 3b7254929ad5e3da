//! Shared session state — the one mutable resource every component reads.
//!
//! A [`SessionShared`] holds the playing/paused flags and a generation
//! counter. Each playback attempt captures the generation at start; any
//! asynchronous continuation (network reply, drain watcher, highlight tick)
//! re-checks it before acting, so callbacks that outlive their attempt are
//! discarded instead of corrupting a newer one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Playing/paused flags plus the attempt generation counter.
///
/// Cheap to clone behind an `Arc`; every backend, the scheduler, and the
/// session itself share one instance.
#[derive(Debug, Default)]
pub struct SessionShared {
    playing: AtomicBool,
    paused: AtomicBool,
    generation: AtomicU64,
}

impl SessionShared {
    /// Create a fresh shared state (idle, generation 0).
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Begin a new playback attempt: bumps the generation (invalidating any
    /// stale continuation), sets playing, clears paused. Returns the new
    /// generation.
    pub fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.paused.store(false, Ordering::SeqCst);
        self.playing.store(true, Ordering::SeqCst);
        generation
    }

    /// Tear down the current attempt: bumps the generation and clears both
    /// flags. Late callbacks from the old attempt see a generation mismatch
    /// and become no-ops.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Mark natural completion of the current attempt without starting a
    /// new generation.
    pub fn finish(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Whether a playback attempt is active (possibly paused).
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Whether the active attempt is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Set or clear the paused flag. Playing is left untouched — paused
    /// implies playing.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Current generation counter value.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

// ── Liveness token ─────────────────────────────────────────────────

/// Ties an asynchronous continuation to the attempt that scheduled it.
///
/// Captured once when an attempt starts and re-checked at the top of every
/// continuation, replacing closure-captured assumptions about ordering.
#[derive(Debug, Clone)]
pub struct Liveness {
    shared: Arc<SessionShared>,
    generation: u64,
}

impl Liveness {
    /// Bind a token to the current generation of `shared`.
    #[must_use]
    pub fn new(shared: Arc<SessionShared>, generation: u64) -> Self {
        Self { shared, generation }
    }

    /// Whether this attempt is still the current one (stop/new-play bumps
    /// the generation and makes older tokens stale).
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.shared.generation() == self.generation
    }

    /// Whether this attempt is current *and* actively playing.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.is_current() && self.shared.is_playing()
    }

    /// Whether the session is paused (freezes ticks and drain waits).
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared.is_paused()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_sets_playing_and_bumps_generation() {
        let shared = SessionShared::new();
        let generation = shared.begin();
        assert_eq!(generation, 1);
        assert!(shared.is_playing());
        assert!(!shared.is_paused());
    }

    #[test]
    fn invalidate_makes_older_tokens_stale() {
        let shared = SessionShared::new();
        let generation = shared.begin();
        let live = Liveness::new(Arc::clone(&shared), generation);
        assert!(live.is_live());

        shared.invalidate();
        assert!(!live.is_current());
        assert!(!live.is_live());
    }

    #[test]
    fn pause_keeps_the_attempt_live() {
        let shared = SessionShared::new();
        let live = Liveness::new(Arc::clone(&shared), shared.begin());
        shared.set_paused(true);
        assert!(live.is_live());
        assert!(live.is_paused());
    }

    #[test]
    fn a_new_attempt_supersedes_the_previous_token() {
        let shared = SessionShared::new();
        let first = Liveness::new(Arc::clone(&shared), shared.begin());
        let _second = shared.begin();
        assert!(!first.is_current());
    }
}
