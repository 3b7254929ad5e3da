//! Remote voice backend — cloud synthesis, one request per byte-bounded
//! chunk.
//!
//! The request-size ceiling forces long texts through the
//! [`chunker`](crate::chunker); chunks are fetched and played strictly in
//! order, back to back. The highlight timer is armed once, when the first
//! chunk begins playing, and keeps advancing across chunk boundaries; the
//! first chunk's measured WAV duration recalibrates the tick interval, once
//! per session.
//!
//! Failure policy: any chunk's request or decode failure aborts the whole
//! session. No per-chunk retry — the error is reported verbatim and the
//! session returns to idle.

use std::io::Cursor;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::chunker::{self, REMOTE_CHUNK_BYTES};
use crate::config::ReaderConfig;
use crate::error::ReaderError;
use crate::highlight::HighlightScheduler;
use crate::playback::{AudioOutput, AudioThreadHandle};
use crate::source::StatusSink;
use crate::state::Liveness;

use super::{SpeakOutcome, SpeechBackend};

/// Poll period while waiting for a clip to drain.
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Maximum characters of an error response body echoed into the sink.
const BODY_EXCERPT_CHARS: usize = 200;

// ── Wire contract ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceParams<'a>,
    #[serde(rename = "audioConfig")]
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceParams<'a> {
    language_code: &'a str,
    name: &'a str,
    ssml_gender: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    speaking_rate: f32,
    pitch: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

// ── Synthesis seam ─────────────────────────────────────────────────

/// Turns one text chunk into a WAV clip.
///
/// The production implementation is [`HttpSynthesizer`]; tests inject fakes
/// to drive the chunk loop without a network.
#[async_trait::async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize one chunk into LINEAR16 WAV bytes.
    async fn synthesize(&self, chunk: &str) -> Result<Vec<u8>, ReaderError>;
}

/// Synthesizer over the cloud endpoint: POST, check status, decode
/// `audioContent`.
pub struct HttpSynthesizer {
    http: reqwest::Client,
    config: Arc<Mutex<ReaderConfig>>,
}

impl HttpSynthesizer {
    /// Create a synthesizer reading its credential and voice from `config`.
    #[must_use]
    pub fn new(config: Arc<Mutex<ReaderConfig>>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait::async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, chunk: &str) -> Result<Vec<u8>, ReaderError> {
        let (url, request_body) = {
            let config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
            let key = config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or(ReaderError::MissingCredential)?;
            let url = format!("{}/v1/text:synthesize?key={key}", config.endpoint);
            let body = serde_json::to_value(SynthesizeRequest {
                input: SynthesisInput { text: chunk },
                voice: VoiceParams {
                    language_code: &config.voice.language_code,
                    name: &config.voice.name,
                    ssml_gender: &config.voice.ssml_gender,
                },
                audio_config: AudioConfig {
                    audio_encoding: "LINEAR16",
                    speaking_rate: config.speaking_rate,
                    pitch: config.pitch,
                },
            })
            .map_err(|e| ReaderError::AudioDecode(e.to_string()))?;
            (url, body)
        };

        let response = self.http.post(&url).json(&request_body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
            return Err(ReaderError::RemoteRequest {
                status: status.as_u16(),
                body: excerpt,
            });
        }

        let parsed: SynthesizeResponse = response.json().await?;
        let audio_b64 = parsed.audio_content.ok_or(ReaderError::MissingAudioContent)?;
        base64::engine::general_purpose::STANDARD
            .decode(audio_b64.trim())
            .map_err(|e| ReaderError::AudioDecode(e.to_string()))
    }
}

// ── Backend ────────────────────────────────────────────────────────

/// The remote synthesis backend.
pub struct RemoteVoiceBackend {
    synth: Arc<dyn Synthesizer>,
    config: Arc<Mutex<ReaderConfig>>,
    playback: Arc<dyn AudioOutput>,
    scheduler: Arc<Mutex<HighlightScheduler>>,
    sink: Arc<dyn StatusSink>,
}

impl RemoteVoiceBackend {
    /// Create the backend over the cloud endpoint, spawning the dedicated
    /// audio output thread.
    pub fn new(
        config: Arc<Mutex<ReaderConfig>>,
        scheduler: Arc<Mutex<HighlightScheduler>>,
        sink: Arc<dyn StatusSink>,
    ) -> Result<Self, ReaderError> {
        Ok(Self::with_parts(
            Arc::new(HttpSynthesizer::new(Arc::clone(&config))),
            Arc::new(AudioThreadHandle::spawn()?),
            config,
            scheduler,
            sink,
        ))
    }

    /// Create the backend over explicit synthesis and output seams. Used by
    /// tests and by embedders that bring their own.
    #[must_use]
    pub fn with_parts(
        synth: Arc<dyn Synthesizer>,
        playback: Arc<dyn AudioOutput>,
        config: Arc<Mutex<ReaderConfig>>,
        scheduler: Arc<Mutex<HighlightScheduler>>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            synth,
            config,
            playback,
            scheduler,
            sink,
        }
    }

    /// Block (cooperatively) until the current clip drains, the session
    /// pauses out of the wait, or the attempt goes stale.
    async fn wait_for_drain(&self, live: &Liveness) -> SpeakOutcome {
        loop {
            tokio::time::sleep(DRAIN_POLL).await;

            if !live.is_current() {
                self.playback.stop();
                return SpeakOutcome::Superseded;
            }
            // A paused clip stays loaded; keep waiting without advancing.
            if live.is_paused() {
                continue;
            }
            if !self.playback.is_active() {
                return SpeakOutcome::Completed;
            }
        }
    }

    fn lock_scheduler(&self) -> std::sync::MutexGuard<'_, HighlightScheduler> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl SpeechBackend for RemoteVoiceBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn available(&self) -> bool {
        let config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        config.has_credential()
    }

    async fn speak(&self, text: &str, live: Liveness) -> Result<SpeakOutcome, ReaderError> {
        let chunks = chunker::split(text, REMOTE_CHUNK_BYTES);
        if chunks.is_empty() {
            return Ok(SpeakOutcome::Completed);
        }
        let total = chunks.len();
        tracing::debug!(total, bytes = text.len(), "Remote synthesis starting");

        for (i, chunk) in chunks.iter().enumerate() {
            if !live.is_current() {
                self.playback.stop();
                return Ok(SpeakOutcome::Superseded);
            }

            if total > 1 {
                self.sink
                    .set_status(&format!("Reading aloud ({}/{total})…", i + 1));
            } else {
                self.sink.set_status("Reading aloud…");
            }

            let wav = self.synth.synthesize(chunk).await?;

            // The network round-trip is a suspension point; a stop or a new
            // play may have interleaved.
            if !live.is_current() {
                self.playback.stop();
                return Ok(SpeakOutcome::Superseded);
            }

            let measured = wav_duration(&wav);
            self.playback.play(wav)?;
            // A pause issued during the round trip hit an empty sink; the
            // fresh clip must load paused, not speak over the paused state.
            if live.is_paused() {
                self.playback.pause();
            }

            if i == 0 {
                // Armed exactly once — the word pointer advances
                // continuously across chunk boundaries.
                let mut scheduler = self.lock_scheduler();
                scheduler.start(false);
                if let Some(measured) = measured {
                    scheduler.recalibrate(measured, chunk.split_whitespace().count());
                }
            }

            if self.wait_for_drain(&live).await == SpeakOutcome::Superseded {
                return Ok(SpeakOutcome::Superseded);
            }
        }

        Ok(SpeakOutcome::Completed)
    }

    fn pause(&self) {
        self.playback.pause();
    }

    fn resume(&self) {
        self.playback.resume();
    }

    fn stop(&self) {
        self.playback.stop();
    }
}

/// Measured duration of a WAV clip, from its header.
fn wav_duration(wav: &[u8]) -> Option<Duration> {
    let reader = hound::WavReader::new(Cursor::new(wav)).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    Some(Duration::from_secs_f64(
        f64::from(reader.duration()) / f64::from(spec.sample_rate),
    ))
}
