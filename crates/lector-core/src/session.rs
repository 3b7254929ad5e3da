//! Playback session — the top-level state machine.
//!
//! ```text
//!             Play(A)                    Play(A) again
//!   Idle ───────────────▶ Playing ◀──────────────────▶ Paused
//!    ▲                       │
//!    └───────────────────────┘
//!      Stop / NaturalEnd / Error
//! ```
//!
//! One session exists per host page/process. It owns the mode resolver,
//! both backends, and the highlight scheduler, and it is the only writer of
//! the shared playing/paused state. The public play/pause/resume/stop
//! surface never returns an error — every failure is reported through the
//! status sink and lands the machine back in idle.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::backend::{SpeakOutcome, SpeechBackend};
use crate::config::ReaderConfig;
use crate::highlight::HighlightScheduler;
use crate::mode::{Mode, ModeResolver};
use crate::source::{ActionId, StatusSink, TextSource};
use crate::state::{Liveness, SessionShared};

/// Sink message when neither backend can speak.
pub const UNAVAILABLE_MESSAGE: &str =
    "No system voices available and no Google TTS key configured. The reader cannot speak.";

/// Mutable session fields guarded by one lock. Never held across an await.
struct SessionState {
    resolver: ModeResolver,
    mode: Mode,
    current_action: Option<ActionId>,
}

/// The speech-playback orchestrator.
///
/// Cheap to share (`Arc`); all methods take `&self`.
pub struct PlaybackSession {
    shared: Arc<SessionShared>,
    scheduler: Arc<Mutex<HighlightScheduler>>,
    local: Arc<dyn SpeechBackend>,
    remote: Arc<dyn SpeechBackend>,
    sink: Arc<dyn StatusSink>,
    source: Weak<dyn TextSource>,
    config: Arc<Mutex<ReaderConfig>>,
    state: Arc<Mutex<SessionState>>,
}

impl PlaybackSession {
    /// Build a session with the default backends: the platform speech
    /// engine (when the `system-tts` feature is on) and the remote cloud
    /// service.
    ///
    /// The source is held weakly — the embedder keeps ownership.
    pub fn new(
        source: &Arc<dyn TextSource>,
        sink: Arc<dyn StatusSink>,
        config: ReaderConfig,
    ) -> Result<Arc<Self>, crate::error::ReaderError> {
        let shared = SessionShared::new();
        let scheduler = Arc::new(Mutex::new(HighlightScheduler::new(Arc::clone(&shared))));
        let config = Arc::new(Mutex::new(config));

        #[cfg(feature = "system-tts")]
        let engine: Arc<dyn crate::backend::local::SpeechEngine> = {
            // An engine that fails to initialise behaves like one with no
            // voices: the resolver falls through to the remote backend.
            match crate::backend::local::SystemSpeechEngine::new() {
                Ok(engine) => Arc::new(engine),
                Err(e) => {
                    tracing::warn!(error = %e, "Platform speech engine unavailable");
                    Arc::new(NoVoicesEngine)
                }
            }
        };
        #[cfg(not(feature = "system-tts"))]
        let engine: Arc<dyn crate::backend::local::SpeechEngine> = Arc::new(NoVoicesEngine);

        let local: Arc<dyn SpeechBackend> = Arc::new(crate::backend::local::LocalVoiceBackend::new(
            engine,
            Arc::clone(&scheduler),
            Arc::clone(&sink),
        ));
        let remote: Arc<dyn SpeechBackend> = Arc::new(crate::backend::remote::RemoteVoiceBackend::new(
            Arc::clone(&config),
            Arc::clone(&scheduler),
            Arc::clone(&sink),
        )?);

        Ok(Self::with_backends(
            source, sink, config, shared, scheduler, local, remote,
        ))
    }

    /// Build a session over explicit backends. Used by tests and by
    /// embedders that bring their own engines.
    #[must_use]
    pub fn with_backends(
        source: &Arc<dyn TextSource>,
        sink: Arc<dyn StatusSink>,
        config: Arc<Mutex<ReaderConfig>>,
        shared: Arc<SessionShared>,
        scheduler: Arc<Mutex<HighlightScheduler>>,
        local: Arc<dyn SpeechBackend>,
        remote: Arc<dyn SpeechBackend>,
    ) -> Arc<Self> {
        Arc::new(Self {
            shared,
            scheduler,
            local,
            remote,
            sink,
            source: Arc::downgrade(source),
            config,
            state: Arc::new(Mutex::new(SessionState {
                resolver: ModeResolver::new(),
                mode: Mode::Unavailable,
                current_action: None,
            })),
        })
    }

    // ── Public state machine surface ───────────────────────────────

    /// Handle a play request for `action`.
    ///
    /// Re-invoking the action that is already active toggles pause/resume;
    /// a different action performs an implicit stop (mode kept) first.
    pub fn play(&self, action: &ActionId) {
        // Same-action re-invocation is a toggle, not a restart.
        if self.shared.is_playing()
            && self.lock_state().current_action.as_ref() == Some(action)
        {
            if self.shared.is_paused() {
                self.resume();
            } else {
                self.pause();
            }
            return;
        }

        if self.shared.is_playing() {
            self.halt(false);
        }

        self.refresh_credential();

        let mode = {
            let mut state = self.lock_state();
            let mode =
                state
                    .resolver
                    .resolve(true, self.local.available(), self.remote.available());
            state.mode = mode;
            mode
        };
        if mode == Mode::Unavailable {
            tracing::warn!("Play requested with no speech capability");
            self.sink.set_status(UNAVAILABLE_MESSAGE);
            return;
        }

        // A broken or vanished source is "nothing to read", never a crash.
        let Some(source) = self.source.upgrade() else {
            self.sink.set_status("Nothing to read.");
            return;
        };
        let text = source
            .text(action)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, action = %action, "Text source failed");
                String::new()
            })
            .trim()
            .to_string();
        if text.is_empty() {
            self.sink.set_status("Nothing to read.");
            return;
        }

        let roots = source.highlight_roots(action);
        self.lock_scheduler().prepare(&roots, text.chars().count());

        self.lock_state().current_action = Some(action.clone());
        let generation = self.shared.begin();
        let live = Liveness::new(Arc::clone(&self.shared), generation);

        tracing::info!(action = %action, ?mode, chars = text.len(), "Playback starting");

        let backend = match mode {
            Mode::Local => Arc::clone(&self.local),
            Mode::Remote | Mode::Unavailable => Arc::clone(&self.remote),
        };
        let fallback = (mode == Mode::Local).then(|| Arc::clone(&self.remote));
        let finisher = self.finisher();

        tokio::spawn(async move {
            let mut outcome = backend.speak(&text, live.clone()).await;

            // One-shot cross-backend fallback: a local engine failure with a
            // credential configured re-issues the same text remotely.
            if let Err(ref error) = outcome {
                if live.is_current() {
                    if let Some(remote) = fallback.filter(|r| r.available()) {
                        tracing::warn!(error = %error, "Local engine failed — retrying via remote backend");
                        finisher
                            .sink
                            .set_status("Speech error — falling back to Google TTS…");
                        // The attempt now belongs to the remote backend;
                        // pause/resume/stop must reach it, not the dead
                        // local engine.
                        finisher
                            .state
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .mode = Mode::Remote;
                        outcome = remote.speak(&text, live.clone()).await;
                    }
                }
            }

            finisher.apply(&live, outcome);
        });
    }

    /// Pause the active playback in place. No-op when idle or paused.
    pub fn pause(&self) {
        if !self.shared.is_playing() || self.shared.is_paused() {
            return;
        }
        self.active_backend().pause();
        self.shared.set_paused(true);
        tracing::debug!("Playback paused");
        self.sink.set_status("Paused.");
    }

    /// Resume paused playback from the frozen highlight index. No-op unless
    /// paused.
    pub fn resume(&self) {
        if !self.shared.is_playing() || !self.shared.is_paused() {
            return;
        }
        // Order matters: the backend restarts its audio before the paused
        // flag clears, so drain/poll loops never see a silent unpaused gap.
        self.active_backend().resume();
        self.lock_scheduler().start(true);
        self.shared.set_paused(false);
        tracing::debug!("Playback resumed");
        self.sink.set_status("Resuming…");
    }

    /// Stop playback and return to idle. Calling stop when already idle is
    /// a no-op (no duplicate sink message).
    pub fn stop(&self) {
        if !self.shared.is_playing() {
            return;
        }
        self.halt(true);
    }

    // ── Read accessors (UI button labels) ──────────────────────────

    /// Whether a playback attempt is active (possibly paused).
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.shared.is_playing()
    }

    /// Whether the active attempt is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared.is_paused()
    }

    /// The mode resolved for the current/last attempt.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.lock_state().mode
    }

    /// The action currently playing, if any.
    #[must_use]
    pub fn current_action(&self) -> Option<ActionId> {
        self.lock_state().current_action.clone()
    }

    // ── Internals ──────────────────────────────────────────────────

    /// Tear down the current attempt. `announce` distinguishes a user stop
    /// ("Stopped.") from the silent implicit stop before a new action.
    fn halt(&self, announce: bool) {
        // Invalidate first: late callbacks from the old attempt see a stale
        // generation before any resource teardown races them.
        self.shared.invalidate();
        self.local.stop();
        self.remote.stop();
        self.lock_scheduler().stop(true);
        self.lock_state().current_action = None;
        tracing::debug!(announce, "Playback halted");
        if announce {
            self.sink.set_status("Stopped.");
        }
    }

    /// Re-read the remote credential before resolving, so a key saved after
    /// startup is honoured without a restart. An embedder-supplied key is
    /// never clobbered.
    fn refresh_credential(&self) {
        let mut config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        if !config.has_credential() {
            config.api_key = ReaderConfig::from_env().api_key;
        }
    }

    fn active_backend(&self) -> Arc<dyn SpeechBackend> {
        match self.lock_state().mode {
            Mode::Local => Arc::clone(&self.local),
            Mode::Remote | Mode::Unavailable => Arc::clone(&self.remote),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_scheduler(&self) -> std::sync::MutexGuard<'_, HighlightScheduler> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bundle of clones the spawned attempt task needs to settle the
    /// session afterwards.
    fn finisher(&self) -> AttemptFinisher {
        AttemptFinisher {
            shared: Arc::clone(&self.shared),
            scheduler: Arc::clone(&self.scheduler),
            state: Arc::clone(&self.state),
            sink: Arc::clone(&self.sink),
        }
    }
}

/// Settles the session when a speak attempt resolves.
struct AttemptFinisher {
    shared: Arc<SessionShared>,
    scheduler: Arc<Mutex<HighlightScheduler>>,
    state: Arc<Mutex<SessionState>>,
    sink: Arc<dyn StatusSink>,
}

impl AttemptFinisher {
    fn apply(&self, live: &Liveness, outcome: Result<SpeakOutcome, crate::error::ReaderError>) {
        // The stale-callback rule: a delayed completion arriving after a
        // stop (or a newer play) already reset state must be a no-op.
        if !live.is_current() {
            return;
        }

        match outcome {
            Ok(SpeakOutcome::Superseded) => {}
            Ok(SpeakOutcome::Completed) => {
                self.settle();
                tracing::info!("Playback finished");
                self.sink.set_status("Finished.");
            }
            Err(error) => {
                self.settle();
                tracing::warn!(error = %error, "Playback failed");
                self.sink.set_status(&format!("Speech error: {error}"));
            }
        }
    }

    fn settle(&self) {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop(true);
        self.shared.finish();
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current_action = None;
    }
}

/// Engine stand-in when the platform layer is disabled or failed to
/// initialise: reports no voices, so resolution falls through to remote.
struct NoVoicesEngine;

impl crate::backend::local::SpeechEngine for NoVoicesEngine {
    fn has_voices(&self) -> bool {
        false
    }

    fn speak(&self, _text: &str) -> Result<(), crate::error::ReaderError> {
        Err(crate::error::ReaderError::Engine(
            "no platform speech engine".to_string(),
        ))
    }

    fn stop(&self) {}

    fn is_speaking(&self) -> Result<bool, crate::error::ReaderError> {
        Ok(false)
    }
}
