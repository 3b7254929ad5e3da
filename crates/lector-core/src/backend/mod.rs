//! Speech backend trait — engine-agnostic interface over the two
//! interchangeable synthesis providers.
//!
//! The [`PlaybackSession`](crate::session::PlaybackSession) operates on
//! trait objects (`Arc<dyn SpeechBackend>`) so that the local platform
//! engine and the remote cloud service can be swapped — or replaced by test
//! doubles — without touching the state machine.
//!
//! | Module     | Provider                                        |
//! |------------|-------------------------------------------------|
//! | [`local`]  | Platform speech engine (binary capability)      |
//! | [`remote`] | Cloud synthesis endpoint, chunked per request   |

pub mod local;
pub mod remote;

use crate::error::ReaderError;
use crate::state::Liveness;

/// How a speak attempt ended, from the backend's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// The utterance drained naturally.
    Completed,

    /// A newer attempt (or a stop) invalidated this one mid-flight. The
    /// orchestrator discards the result silently — the stale-callback rule.
    Superseded,
}

/// Backend-agnostic speech synthesis provider.
///
/// `speak` runs the whole utterance: it resolves only on natural
/// completion, supersession, or error. Implementations must re-check the
/// [`Liveness`] token at every suspension point — an arbitrary amount of
/// user interaction may have interleaved since the continuation was
/// scheduled.
#[async_trait::async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Short name for logs and mode labels.
    fn name(&self) -> &'static str;

    /// Whether this backend can currently speak at all (voices installed /
    /// credential configured). Re-checked before every play.
    fn available(&self) -> bool;

    /// Speak `text` to completion.
    ///
    /// Side effects: arms the highlight scheduler when audio actually
    /// begins and reports progress to the status sink.
    async fn speak(&self, text: &str, live: Liveness) -> Result<SpeakOutcome, ReaderError>;

    /// Pause the in-flight utterance in place.
    fn pause(&self);

    /// Resume a paused utterance from where it froze.
    fn resume(&self);

    /// Tear down the underlying audio resource so it cannot fire further
    /// events.
    fn stop(&self);
}
