//! Read-aloud engine error types.

/// Errors that can occur while resolving, synthesizing, or playing speech.
///
/// None of these cross the public play/pause/resume/stop boundary — the
/// session reports them through the [`StatusSink`](crate::source::StatusSink)
/// and returns to idle.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// Failed to open an audio output stream.
    #[error("Failed to open audio output stream: {0}")]
    OutputStream(String),

    /// The dedicated audio thread is no longer responding.
    #[error("Audio thread died")]
    AudioThreadDied,

    /// The platform speech engine failed to start or reported a failure
    /// mid-utterance.
    #[error("Speech engine error: {0}")]
    Engine(String),

    /// The remote backend was asked to speak without a configured key.
    #[error("No Google TTS key configured")]
    MissingCredential,

    /// The remote synthesis endpoint rejected a request.
    #[error("Google TTS request failed (HTTP {status}): {body}")]
    RemoteRequest {
        /// HTTP status code returned by the service.
        status: u16,
        /// Response body excerpt, reported verbatim.
        body: String,
    },

    /// The remote request could not be sent at all.
    #[error("Google TTS request failed: {0}")]
    RemoteTransport(#[from] reqwest::Error),

    /// The remote response parsed but carried no `audioContent` field.
    #[error("Google TTS response contained no audioContent")]
    MissingAudioContent,

    /// Returned audio could not be decoded (base64 or WAV framing).
    #[error("Audio decode failed: {0}")]
    AudioDecode(String),

    /// The text source failed to produce text for an action.
    #[error("Text source error: {0}")]
    Source(String),
}
