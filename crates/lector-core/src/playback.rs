//! Dedicated audio output thread — isolates `!Send` playback resources from
//! the async runtime.
//!
//! `rodio::OutputStream` is `!Send` on some platforms. Rather than using
//! `unsafe impl Send/Sync`, the stream and its sink are confined to a single
//! OS thread; the public [`AudioThreadHandle`] is the `Send + Sync` proxy
//! that the remote backend holds, routing every operation through an
//! [`AudioCommand`] over an mpsc channel.
//!
//! One clip (one remote chunk) is loaded at a time: `play` replaces any
//! clip still in the sink.

use std::io::Cursor;
use std::sync::mpsc;
use std::thread;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

use crate::error::ReaderError;

/// Clip-level audio output surface.
///
/// The production implementation is [`AudioThreadHandle`]; the remote
/// backend operates on a trait object so tests can drive its chunk loop
/// without an audio device.
pub trait AudioOutput: Send + Sync {
    /// Start playing a WAV clip, replacing any current one.
    fn play(&self, wav: Vec<u8>) -> Result<(), ReaderError>;

    /// Pause the current clip in place.
    fn pause(&self);

    /// Resume a paused clip.
    fn resume(&self);

    /// Stop and drop the current clip.
    fn stop(&self);

    /// Whether a clip is loaded and not yet drained.
    fn is_active(&self) -> bool;
}

// ── Commands ───────────────────────────────────────────────────────

/// A command sent from the backend to the audio thread.
enum AudioCommand {
    /// Decode a WAV clip and start playing it, replacing any current clip.
    Play {
        wav: Vec<u8>,
        reply: mpsc::Sender<Result<(), ReaderError>>,
    },

    /// Pause the current clip in place.
    Pause,

    /// Resume a paused clip.
    Resume,

    /// Stop and drop the current clip immediately (fire-and-forget).
    Stop,

    /// Query whether a clip is still playing (or paused mid-clip).
    IsActive { reply: mpsc::Sender<bool> },

    /// Shut down the audio thread, releasing the output stream.
    Shutdown,
}

// ── Handle (Send + Sync proxy) ─────────────────────────────────────

/// `Send + Sync` handle to the dedicated audio output thread.
///
/// All methods take `&self` — the underlying `mpsc::Sender` supports shared
/// access. Request–reply methods block the caller until the audio thread
/// responds; the latency is microseconds of channel I/O plus the decode.
pub struct AudioThreadHandle {
    cmd_tx: mpsc::Sender<AudioCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AudioThreadHandle {
    /// Spawn the audio thread and open the default output device on it.
    ///
    /// Device errors are propagated back through a one-shot init channel.
    pub fn spawn() -> Result<Self, ReaderError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<AudioCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), ReaderError>>();

        let thread = thread::Builder::new()
            .name("lector-audio".into())
            .spawn(move || Self::run(&cmd_rx, &init_tx))
            .map_err(|e| ReaderError::OutputStream(format!("failed to spawn audio thread: {e}")))?;

        init_rx.recv().map_err(|_| ReaderError::AudioThreadDied)??;

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
        })
    }

    /// Decode `wav` and start playing it, replacing any still-playing clip.
    pub fn play(&self, wav: Vec<u8>) -> Result<(), ReaderError> {
        let (tx, rx) = mpsc::channel();
        self.cmd_tx
            .send(AudioCommand::Play { wav, reply: tx })
            .map_err(|_| ReaderError::AudioThreadDied)?;
        rx.recv().map_err(|_| ReaderError::AudioThreadDied)?
    }

    /// Pause the current clip in place.
    pub fn pause(&self) {
        let _ = self.cmd_tx.send(AudioCommand::Pause);
    }

    /// Resume a paused clip.
    pub fn resume(&self) {
        let _ = self.cmd_tx.send(AudioCommand::Resume);
    }

    /// Stop and drop the current clip immediately.
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(AudioCommand::Stop);
    }

    /// Whether a clip is loaded and not yet drained. Paused clips count as
    /// active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        let (tx, rx) = mpsc::channel();
        if self.cmd_tx.send(AudioCommand::IsActive { reply: tx }).is_err() {
            return false;
        }
        rx.recv().unwrap_or(false)
    }

    // ── Audio thread event loop ────────────────────────────────────

    /// Body of the dedicated audio thread. Owns the `OutputStream` and the
    /// current `Sink` for their entire lifetime — they never cross thread
    /// boundaries.
    fn run(cmd_rx: &mpsc::Receiver<AudioCommand>, init_tx: &mpsc::Sender<Result<(), ReaderError>>) {
        let stream = match OutputStream::try_default() {
            Ok(pair) => pair,
            Err(e) => {
                let _ = init_tx.send(Err(ReaderError::OutputStream(e.to_string())));
                return;
            }
        };
        let (_stream, stream_handle): (OutputStream, OutputStreamHandle) = stream;

        if init_tx.send(Ok(())).is_err() {
            return;
        }
        tracing::debug!("Audio output thread initialised");

        let mut sink: Option<Sink> = None;

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                AudioCommand::Play { wav, reply } => {
                    // Eagerly tear down the previous clip so it cannot fire
                    // further events.
                    if let Some(old) = sink.take() {
                        old.stop();
                    }
                    let _ = reply.send(start_clip(&stream_handle, wav).map(|s| sink = Some(s)));
                }

                AudioCommand::Pause => {
                    if let Some(ref s) = sink {
                        s.pause();
                    }
                }

                AudioCommand::Resume => {
                    if let Some(ref s) = sink {
                        s.play();
                    }
                }

                AudioCommand::Stop => {
                    if let Some(s) = sink.take() {
                        s.stop();
                    }
                }

                AudioCommand::IsActive { reply } => {
                    let _ = reply.send(sink.as_ref().is_some_and(|s| !s.empty()));
                }

                AudioCommand::Shutdown => break,
            }
        }

        // The stream and sink are dropped here, on the audio thread.
        tracing::debug!("Audio output thread shutting down");
    }
}

impl AudioOutput for AudioThreadHandle {
    fn play(&self, wav: Vec<u8>) -> Result<(), ReaderError> {
        Self::play(self, wav)
    }

    fn pause(&self) {
        Self::pause(self);
    }

    fn resume(&self) {
        Self::resume(self);
    }

    fn stop(&self) {
        Self::stop(self);
    }

    fn is_active(&self) -> bool {
        Self::is_active(self)
    }
}

impl Drop for AudioThreadHandle {
    fn drop(&mut self) {
        // Best-effort shutdown — the thread may already be dead.
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Decode a WAV clip into a fresh sink and start playback.
fn start_clip(stream_handle: &OutputStreamHandle, wav: Vec<u8>) -> Result<Sink, ReaderError> {
    let sink =
        Sink::try_new(stream_handle).map_err(|e| ReaderError::OutputStream(e.to_string()))?;
    let source =
        Decoder::new_wav(Cursor::new(wav)).map_err(|e| ReaderError::AudioDecode(e.to_string()))?;
    sink.append(source);
    Ok(sink)
}
