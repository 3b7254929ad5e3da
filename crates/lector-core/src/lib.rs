//! Read-aloud engine: dual-backend text-to-speech with synchronized
//! word-by-word highlighting.
//!
//! The embedder supplies a [`TextSource`] (what to read, and the word
//! tokens to highlight) and a [`StatusSink`] (where status lines go); the
//! [`PlaybackSession`] drives everything else — backend resolution between
//! the platform speech engine and the Google TTS cloud service, the
//! play/pause/resume/stop state machine, byte-bounded chunking for the
//! remote path, and the highlight tick.

pub mod backend;
pub mod chunker;
pub mod config;
pub mod error;
pub mod highlight;
pub mod mode;
pub mod playback;
pub mod session;
pub mod source;
pub mod state;
pub mod text;

// Re-export key types for convenience
pub use backend::{SpeakOutcome, SpeechBackend};
pub use config::{ReaderConfig, VoiceSelection};
pub use error::ReaderError;
pub use mode::Mode;
pub use session::PlaybackSession;
pub use source::{ActionId, HighlightRoot, StatusSink, TextSource, WordToken};
pub use state::{Liveness, SessionShared};
