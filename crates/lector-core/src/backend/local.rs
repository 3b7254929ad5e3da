//! Local voice backend — wraps the platform speech engine.
//!
//! Capability is binary: the platform either has installed voices or it has
//! none. Timing is purely estimated (`chars / 13` seconds, see
//! [`highlight`](crate::highlight)) — platform engines expose no per-word
//! progress, and the measured-duration recalibration is a remote-only
//! refinement.
//!
//! Platform engines also expose no pause primitive through the `tts` seam,
//! so pause stops the engine while the highlight pointer stays frozen, and
//! resume re-speaks the remaining words from that pointer.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::ReaderError;
use crate::highlight::HighlightScheduler;
use crate::source::StatusSink;
use crate::state::Liveness;

use super::{SpeakOutcome, SpeechBackend};

/// Poll period while waiting for the engine to drain an utterance.
const ENGINE_POLL: Duration = Duration::from_millis(100);

/// Consecutive silent polls before an utterance counts as finished. Covers
/// the gap between queueing an utterance and the engine reporting it as
/// speaking (start and resume both race this way).
const IDLE_POLLS_DONE: u32 = 5;

// ── Engine seam ────────────────────────────────────────────────────

/// Minimal surface of a platform speech engine.
///
/// The production implementation is [`SystemSpeechEngine`]; tests inject
/// fakes with scripted behaviour.
pub trait SpeechEngine: Send + Sync {
    /// Whether the platform has any installed voices.
    fn has_voices(&self) -> bool;

    /// Queue `text` for speech, interrupting any current utterance.
    fn speak(&self, text: &str) -> Result<(), ReaderError>;

    /// Silence the engine immediately.
    fn stop(&self);

    /// Whether an utterance is currently being spoken. An `Err` here is an
    /// engine-level failure mid-utterance.
    fn is_speaking(&self) -> Result<bool, ReaderError>;
}

// ── Backend ────────────────────────────────────────────────────────

/// The local synthesis backend.
pub struct LocalVoiceBackend {
    engine: Arc<dyn SpeechEngine>,
    scheduler: Arc<Mutex<HighlightScheduler>>,
    sink: Arc<dyn StatusSink>,

    /// Words of the in-flight utterance, kept for resume-from-index.
    words: Mutex<Vec<String>>,
}

impl LocalVoiceBackend {
    /// Create a backend over the given engine seam.
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        scheduler: Arc<Mutex<HighlightScheduler>>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            engine,
            scheduler,
            sink,
            words: Mutex::new(Vec::new()),
        }
    }

    fn lock_scheduler(&self) -> std::sync::MutexGuard<'_, HighlightScheduler> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl SpeechBackend for LocalVoiceBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn available(&self) -> bool {
        self.engine.has_voices()
    }

    async fn speak(&self, text: &str, live: Liveness) -> Result<SpeakOutcome, ReaderError> {
        {
            let mut words = self.words.lock().unwrap_or_else(PoisonError::into_inner);
            *words = text.split_whitespace().map(str::to_string).collect();
        }

        self.sink.set_status("Reading aloud…");
        self.lock_scheduler().start(false);
        self.engine.speak(text)?;
        tracing::debug!(chars = text.len(), "Local utterance queued");

        let mut idle_polls = 0;
        loop {
            tokio::time::sleep(ENGINE_POLL).await;

            if !live.is_current() {
                self.engine.stop();
                return Ok(SpeakOutcome::Superseded);
            }
            if live.is_paused() {
                idle_polls = 0;
                continue;
            }

            match self.engine.is_speaking() {
                Err(e) => return Err(e),
                Ok(true) => idle_polls = 0,
                Ok(false) => {
                    idle_polls += 1;
                    if idle_polls >= IDLE_POLLS_DONE {
                        return Ok(SpeakOutcome::Completed);
                    }
                }
            }
        }
    }

    fn pause(&self) {
        // No pause primitive on platform engines: silence now, re-speak the
        // remainder on resume. The highlight pointer stays frozen.
        self.engine.stop();
    }

    fn resume(&self) {
        let index = self.lock_scheduler().current_index();
        let remaining = {
            let words = self.words.lock().unwrap_or_else(PoisonError::into_inner);
            words.get(index.min(words.len())..).unwrap_or(&[]).join(" ")
        };
        if remaining.is_empty() {
            return;
        }
        if let Err(e) = self.engine.speak(&remaining) {
            tracing::warn!(error = %e, "Failed to resume local utterance");
        }
    }

    fn stop(&self) {
        self.engine.stop();
    }
}

// ── Platform engine (feature "system-tts") ─────────────────────────

/// Platform speech engine via the `tts` crate (AVSpeech, WinRT,
/// speech-dispatcher, …).
#[cfg(feature = "system-tts")]
pub struct SystemSpeechEngine {
    inner: Mutex<tts::Tts>,
}

#[cfg(feature = "system-tts")]
impl SystemSpeechEngine {
    /// Initialise the platform engine.
    pub fn new() -> Result<Self, ReaderError> {
        let tts = tts::Tts::default().map_err(|e| ReaderError::Engine(e.to_string()))?;
        tracing::info!("Platform speech engine initialised");
        Ok(Self {
            inner: Mutex::new(tts),
        })
    }
}

#[cfg(feature = "system-tts")]
impl SpeechEngine for SystemSpeechEngine {
    fn has_voices(&self) -> bool {
        let tts = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        tts.voices().map(|v| !v.is_empty()).unwrap_or(false)
    }

    fn speak(&self, text: &str) -> Result<(), ReaderError> {
        let mut tts = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        tts.speak(text, true)
            .map(|_| ())
            .map_err(|e| ReaderError::Engine(e.to_string()))
    }

    fn stop(&self) {
        let mut tts = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = tts.stop() {
            tracing::warn!(error = %e, "Failed to stop platform engine");
        }
    }

    fn is_speaking(&self) -> Result<bool, ReaderError> {
        let tts = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        tts.is_speaking()
            .map_err(|e| ReaderError::Engine(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SessionShared;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct NullSink;
    impl StatusSink for NullSink {
        fn set_status(&self, _message: &str) {}
    }

    /// Engine fake: speaks for a scripted number of polls, optionally
    /// failing mid-utterance.
    struct FakeEngine {
        speaking_polls: AtomicUsize,
        fail_mid_utterance: AtomicBool,
        spoken: Mutex<Vec<String>>,
    }

    impl FakeEngine {
        fn new(polls: usize) -> Arc<Self> {
            Arc::new(Self {
                speaking_polls: AtomicUsize::new(polls),
                fail_mid_utterance: AtomicBool::new(false),
                spoken: Mutex::new(Vec::new()),
            })
        }
    }

    impl SpeechEngine for FakeEngine {
        fn has_voices(&self) -> bool {
            true
        }

        fn speak(&self, text: &str) -> Result<(), ReaderError> {
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn stop(&self) {
            self.speaking_polls.store(0, Ordering::SeqCst);
        }

        fn is_speaking(&self) -> Result<bool, ReaderError> {
            if self.fail_mid_utterance.load(Ordering::SeqCst) {
                return Err(ReaderError::Engine("synthesis interrupted".to_string()));
            }
            let left = self.speaking_polls.load(Ordering::SeqCst);
            if left > 0 {
                self.speaking_polls.store(left - 1, Ordering::SeqCst);
                return Ok(true);
            }
            Ok(false)
        }
    }

    fn backend_with(engine: Arc<FakeEngine>) -> (LocalVoiceBackend, Arc<SessionShared>) {
        let shared = SessionShared::new();
        let scheduler = Arc::new(Mutex::new(HighlightScheduler::new(Arc::clone(&shared))));
        let backend = LocalVoiceBackend::new(engine, scheduler, Arc::new(NullSink));
        (backend, shared)
    }

    #[tokio::test(start_paused = true)]
    async fn natural_end_completes() {
        let engine = FakeEngine::new(3);
        let (backend, shared) = backend_with(Arc::clone(&engine));
        let live = Liveness::new(Arc::clone(&shared), shared.begin());

        let outcome = backend.speak("hello there", live).await.unwrap();
        assert_eq!(outcome, SpeakOutcome::Completed);
        assert_eq!(engine.spoken.lock().unwrap().as_slice(), ["hello there"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_supersedes() {
        let engine = FakeEngine::new(usize::MAX);
        let (backend, shared) = backend_with(Arc::clone(&engine));
        let live = Liveness::new(Arc::clone(&shared), shared.begin());

        // A second attempt starts before the first finishes.
        shared.begin();

        let outcome = backend.speak("stale text", live).await.unwrap();
        assert_eq!(outcome, SpeakOutcome::Superseded);
    }

    #[tokio::test(start_paused = true)]
    async fn engine_failure_surfaces_as_error() {
        let engine = FakeEngine::new(usize::MAX);
        engine.fail_mid_utterance.store(true, Ordering::SeqCst);
        let (backend, shared) = backend_with(Arc::clone(&engine));
        let live = Liveness::new(Arc::clone(&shared), shared.begin());

        let result = backend.speak("doomed", live).await;
        assert!(matches!(result, Err(ReaderError::Engine(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn resume_respeaks_from_the_frozen_word() {
        let engine = FakeEngine::new(0);
        let (backend, shared) = backend_with(Arc::clone(&engine));
        shared.begin();

        {
            let mut words = backend.words.lock().unwrap();
            *words = vec!["one".into(), "two".into(), "three".into(), "four".into()];
        }

        // With an unprepared scheduler the pointer is at word zero, so the
        // whole text is re-spoken.
        backend.resume();
        assert_eq!(
            engine.spoken.lock().unwrap().as_slice(),
            ["one two three four"]
        );
    }
}
