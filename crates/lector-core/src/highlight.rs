//! Word-by-word highlight scheduler.
//!
//! Given the highlightable word tokens of the current action and an
//! estimated (or later, measured) speech duration, the scheduler advances a
//! "current word" pointer on a recurring tick:
//!
//! ```text
//!   prepare(roots, chars) → start(false) → tick, tick, … → end of words
//!                                 │                            │
//!                            (pause: ticks skipped)       stop + reset
//! ```
//!
//! The highlight is a best-effort visual aid, not a captioning system: the
//! tick interval is `speech seconds / word count`, clamped so very short or
//! very long texts still read naturally. At most one timer is ever live;
//! `start` always tears down the previous one first.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::source::{HighlightRoot, WordToken};
use crate::state::SessionShared;

/// Estimated speaking speed used before any audio metadata is available.
const ESTIMATED_CHARS_PER_SEC: f64 = 13.0;

/// Lower clamp on the per-word tick interval.
const MIN_TICK_MS: u64 = 120;

/// Upper clamp on the per-word tick interval.
const MAX_TICK_MS: u64 = 600;

/// Per-word tick interval for `secs` of speech over `words` words, clamped
/// to [120, 600] milliseconds.
#[must_use]
pub fn tick_interval_ms(secs: f64, words: usize) -> u64 {
    if words == 0 {
        return MAX_TICK_MS;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let raw = (secs * 1000.0 / words as f64).round() as u64;
    raw.clamp(MIN_TICK_MS, MAX_TICK_MS)
}

// ── Scheduler ──────────────────────────────────────────────────────

/// State shared between the scheduler handle and its tick task.
#[derive(Default)]
struct HighlightInner {
    /// Flattened word tokens across all roots, in document order.
    tokens: Vec<Arc<dyn WordToken>>,

    /// Index of the *next* word to mark. `index - 1` is the currently
    /// marked word once ticking has begun.
    index: usize,

    /// Current tick interval. Re-read every tick so recalibration takes
    /// effect mid-flight.
    interval_ms: u64,

    /// Whether the interval was already recalibrated from measured audio
    /// this session. Recalibration happens at most once to avoid stutter.
    recalibrated: bool,
}

/// The single system-wide highlight timer.
///
/// Ticks are skipped (not cancelled) while the session is not actively
/// playing-and-unpaused, so pausing freezes the pointer without losing its
/// position.
pub struct HighlightScheduler {
    shared: Arc<SessionShared>,
    inner: Arc<Mutex<HighlightInner>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl HighlightScheduler {
    /// Create an idle scheduler bound to the session's shared state.
    #[must_use]
    pub fn new(shared: Arc<SessionShared>) -> Self {
        Self {
            shared,
            inner: Arc::new(Mutex::new(HighlightInner::default())),
            task: None,
        }
    }

    /// Tokenize the given roots and compute the estimated tick interval for
    /// a text of `estimated_chars` characters.
    ///
    /// Any running timer is stopped and the word pointer reset; a fresh
    /// prepare also re-arms the once-per-session recalibration.
    pub fn prepare(&mut self, roots: &[Arc<dyn HighlightRoot>], estimated_chars: usize) {
        self.stop(true);

        let tokens: Vec<Arc<dyn WordToken>> = roots
            .iter()
            .flat_map(|root| root.word_tokens())
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let secs = estimated_chars as f64 / ESTIMATED_CHARS_PER_SEC;
        let interval_ms = tick_interval_ms(secs, tokens.len());

        tracing::debug!(
            words = tokens.len(),
            estimated_chars,
            interval_ms,
            "Highlight prepared"
        );

        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.tokens = tokens;
        inner.index = 0;
        inner.interval_ms = interval_ms;
        inner.recalibrated = false;
    }

    /// Arm the recurring tick.
    ///
    /// With `from_current_index = false` the pointer restarts at the first
    /// word; with `true` it continues from wherever it was frozen (resume
    /// after pause, chunk-boundary re-arm). Always stops any previous timer
    /// first — at most one is ever live.
    pub fn start(&mut self, from_current_index: bool) {
        self.stop(!from_current_index);

        let word_count = {
            let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            inner.tokens.len()
        };
        if word_count == 0 {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let inner = Arc::clone(&self.inner);

        self.task = Some(tokio::spawn(async move {
            loop {
                let interval_ms = {
                    let inner = inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                    inner.interval_ms
                };
                tokio::time::sleep(Duration::from_millis(interval_ms)).await;

                // Pause (or a not-yet-started backend) freezes the pointer:
                // the tick is skipped, not cancelled.
                if !shared.is_playing() || shared.is_paused() {
                    continue;
                }

                let mut inner = inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                if inner.index > 0 {
                    if let Some(prev) = inner.tokens.get(inner.index - 1) {
                        prev.clear();
                    }
                }
                if inner.index >= inner.tokens.len() {
                    // Ran past the last word — the timer stops and the
                    // pointer resets for the next session.
                    inner.index = 0;
                    return;
                }
                let token = Arc::clone(&inner.tokens[inner.index]);
                inner.index += 1;
                drop(inner);

                token.mark_current();
                token.scroll_into_view();
            }
        }));
    }

    /// Cancel the tick and clear the current word's marker.
    ///
    /// `reset_index = false` keeps the frozen pointer so a later
    /// `start(true)` resumes where the highlight left off.
    pub fn stop(&mut self, reset_index: bool) {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.index > 0 {
            if let Some(current) = inner.tokens.get(inner.index - 1) {
                current.clear();
            }
        }
        if reset_index {
            inner.index = 0;
        }
    }

    /// Replace the estimated tick interval with one derived from measured
    /// audio: `measured / words`, clamped to the usual bounds.
    ///
    /// Applied at most once per prepared session — later calls are ignored
    /// so the pointer doesn't visibly stutter at every chunk boundary.
    pub fn recalibrate(&self, measured: Duration, words: usize) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.recalibrated || words == 0 {
            return;
        }
        let interval_ms = tick_interval_ms(measured.as_secs_f64(), words);
        tracing::debug!(
            measured_ms = measured.as_millis(),
            words,
            interval_ms,
            "Highlight interval recalibrated from audio metadata"
        );
        inner.interval_ms = interval_ms;
        inner.recalibrated = true;
    }

    /// Index of the currently (or most recently) marked word.
    #[must_use]
    pub fn current_index(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.index.saturating_sub(1)
    }

    /// Number of word tokens in the prepared sequence.
    #[must_use]
    pub fn word_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.tokens.len()
    }

    /// The currently effective tick interval in milliseconds.
    #[must_use]
    pub fn interval_ms(&self) -> u64 {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.interval_ms
    }
}

impl Drop for HighlightScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Token that counts marks/clears and records its position.
    struct CountingToken {
        marks: AtomicUsize,
        clears: AtomicUsize,
    }

    impl CountingToken {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                marks: AtomicUsize::new(0),
                clears: AtomicUsize::new(0),
            })
        }
    }

    impl WordToken for CountingToken {
        fn mark_current(&self) {
            self.marks.fetch_add(1, Ordering::SeqCst);
        }

        fn clear(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FixedRoot {
        tokens: Vec<Arc<CountingToken>>,
    }

    impl HighlightRoot for FixedRoot {
        fn word_tokens(&self) -> Vec<Arc<dyn WordToken>> {
            self.tokens
                .iter()
                .map(|t| Arc::clone(t) as Arc<dyn WordToken>)
                .collect()
        }
    }

    fn root_with(n: usize) -> (Arc<dyn HighlightRoot>, Vec<Arc<CountingToken>>) {
        let tokens: Vec<_> = (0..n).map(|_| CountingToken::new()).collect();
        let root = Arc::new(FixedRoot {
            tokens: tokens.clone(),
        });
        (root, tokens)
    }

    #[test]
    fn interval_formula_is_clamped() {
        // 10 words over 5 seconds → 500ms, inside the clamp.
        assert_eq!(tick_interval_ms(5.0, 10), 500);
        // Very fast estimate clamps low.
        assert_eq!(tick_interval_ms(0.1, 50), 120);
        // Very slow estimate clamps high.
        assert_eq!(tick_interval_ms(120.0, 10), 600);
        // Zero words never divides by zero.
        assert_eq!(tick_interval_ms(5.0, 0), 600);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_advance_through_all_words_then_stop() {
        let shared = SessionShared::new();
        shared.begin();

        let (root, tokens) = root_with(3);
        let mut scheduler = HighlightScheduler::new(Arc::clone(&shared));
        scheduler.prepare(&[root], 39); // 39 chars / 13 cps = 3s over 3 words
        scheduler.start(false);

        // 3 words + the terminating tick.
        tokio::time::sleep(Duration::from_secs(10)).await;

        for token in &tokens {
            assert_eq!(token.marks.load(Ordering::SeqCst), 1);
        }
        // Every word but the last is cleared by its successor's tick; the
        // last one is cleared by the terminating tick.
        for token in &tokens {
            assert_eq!(token.clears.load(Ordering::SeqCst), 1);
        }
        assert_eq!(scheduler.current_index(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_session_freezes_the_pointer() {
        let shared = SessionShared::new();
        shared.begin();

        let (root, tokens) = root_with(5);
        let mut scheduler = HighlightScheduler::new(Arc::clone(&shared));
        scheduler.prepare(&[root], 65);
        scheduler.start(false);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        let advanced = scheduler.current_index();
        assert!(advanced > 0);

        shared.set_paused(true);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(scheduler.current_index(), advanced, "pointer moved while paused");

        shared.set_paused(false);
        tokio::time::sleep(Duration::from_secs(5)).await;
        let _ = tokens;
    }

    #[tokio::test(start_paused = true)]
    async fn restart_from_current_index_does_not_rewind() {
        let shared = SessionShared::new();
        shared.begin();

        let (root, _tokens) = root_with(10);
        let mut scheduler = HighlightScheduler::new(Arc::clone(&shared));
        scheduler.prepare(&[root], 130);
        scheduler.start(false);

        tokio::time::sleep(Duration::from_millis(3100)).await;
        let frozen = scheduler.current_index();
        assert!(frozen >= 2);

        scheduler.stop(false);
        scheduler.start(true);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(scheduler.current_index() > frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn recalibrate_applies_once() {
        let shared = SessionShared::new();
        let (root, _tokens) = root_with(4);
        let mut scheduler = HighlightScheduler::new(shared);
        scheduler.prepare(&[root], 52);

        scheduler.recalibrate(Duration::from_secs(2), 4);
        assert_eq!(scheduler.interval_ms(), 500);

        // Second recalibration in the same session is ignored.
        scheduler.recalibrate(Duration::from_secs(8), 4);
        assert_eq!(scheduler.interval_ms(), 500);

        // A fresh prepare re-arms it.
        let (root2, _tokens2) = root_with(4);
        scheduler.prepare(&[root2], 52);
        scheduler.recalibrate(Duration::from_secs(8), 4);
        assert_eq!(scheduler.interval_ms(), 600);
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_concatenate_across_roots_in_order() {
        let shared = SessionShared::new();
        shared.begin();

        let (root_a, tokens_a) = root_with(2);
        let (root_b, tokens_b) = root_with(2);
        let mut scheduler = HighlightScheduler::new(Arc::clone(&shared));
        scheduler.prepare(&[root_a, root_b], 52);
        assert_eq!(scheduler.word_count(), 4);

        scheduler.start(false);
        tokio::time::sleep(Duration::from_secs(10)).await;

        for token in tokens_a.iter().chain(tokens_b.iter()) {
            assert_eq!(token.marks.load(Ordering::SeqCst), 1);
        }
    }
}
