//! Reader configuration — remote credential and voice selection.
//!
//! The engine does not own a config store; it consumes a [`ReaderConfig`]
//! from the embedder. [`ReaderConfig::from_env`] is the conventional loader
//! (dotenv + environment variables) and is cheap enough that the session
//! re-reads the credential before every play, so a key saved after startup
//! is picked up without a restart.

use serde::{Deserialize, Serialize};

/// Default remote synthesis endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://texttospeech.googleapis.com";

/// Remote voice selection, mirrored onto the wire contract's `voice` object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSelection {
    /// BCP-47 language code, e.g. `"en-US"`.
    pub language_code: String,

    /// Provider voice name, e.g. `"en-US-Neural2-C"`.
    pub name: String,

    /// `"FEMALE"`, `"MALE"`, or `"NEUTRAL"`.
    pub ssml_gender: String,
}

impl Default for VoiceSelection {
    fn default() -> Self {
        Self {
            language_code: "en-US".to_string(),
            name: "en-US-Neural2-C".to_string(),
            ssml_gender: "FEMALE".to_string(),
        }
    }
}

/// Configuration consumed by the playback session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// API key for the remote synthesis service. `None` disables the remote
    /// backend (and the local-error fallback).
    pub api_key: Option<String>,

    /// Remote voice selection.
    #[serde(default)]
    pub voice: VoiceSelection,

    /// Speaking rate multiplier sent to the remote service.
    #[serde(default = "default_rate")]
    pub speaking_rate: f32,

    /// Pitch adjustment sent to the remote service.
    #[serde(default)]
    pub pitch: f32,

    /// Base URL of the synthesis endpoint. Overridable for tests and
    /// proxies.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_rate() -> f32 {
    1.0
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            voice: VoiceSelection::default(),
            speaking_rate: 1.0,
            pitch: 0.0,
            endpoint: default_endpoint(),
        }
    }
}

impl ReaderConfig {
    /// Load configuration from the environment (`.env` honoured).
    ///
    /// Recognised variables: `LECTOR_TTS_KEY`, `LECTOR_TTS_VOICE`,
    /// `LECTOR_TTS_LANGUAGE`, `LECTOR_TTS_ENDPOINT`.
    #[must_use]
    pub fn from_env() -> Self {
        // Missing .env is the normal case, not an error.
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        config.api_key = std::env::var("LECTOR_TTS_KEY").ok().filter(|k| !k.is_empty());
        if let Ok(voice) = std::env::var("LECTOR_TTS_VOICE") {
            config.voice.name = voice;
        }
        if let Ok(language) = std::env::var("LECTOR_TTS_LANGUAGE") {
            config.voice.language_code = language;
        }
        if let Ok(endpoint) = std::env::var("LECTOR_TTS_ENDPOINT") {
            config.endpoint = endpoint;
        }
        config
    }

    /// Whether a remote credential is configured.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.api_key.as_ref().is_some_and(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_credential() {
        let config = ReaderConfig::default();
        assert!(!config.has_credential());
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn empty_key_is_not_a_credential() {
        let config = ReaderConfig {
            api_key: Some(String::new()),
            ..ReaderConfig::default()
        };
        assert!(!config.has_credential());
    }

    #[test]
    fn voice_selection_serializes_camel_case() {
        let json = serde_json::to_value(VoiceSelection::default()).unwrap();
        assert!(json.get("languageCode").is_some());
        assert!(json.get("ssmlGender").is_some());
    }
}
