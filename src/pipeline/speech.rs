//! Speech-synthesis capability: "submit text and a voice, get audio bytes".
//!
//! [`GoogleTtsSynthesizer`] talks to the Google Cloud Text-to-Speech REST
//! endpoint. Anything else (a local engine, a test double) only has to
//! implement [`SpeechSynthesizer`].

use crate::error::{NotecastError, ProviderError};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Google Cloud Text-to-Speech `text:synthesize` endpoint.
pub const GOOGLE_TTS_ENDPOINT: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

/// Environment variable holding the Text-to-Speech API key.
pub const GOOGLE_TTS_KEY_ENV: &str = "GOOGLE_TTS_API_KEY";

/// Audio container/codec requested from the synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioEncoding {
    #[default]
    Mp3,
    OggOpus,
    Linear16,
}

impl AudioEncoding {
    /// File extension for audio in this encoding.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioEncoding::Mp3 => "mp3",
            AudioEncoding::OggOpus => "ogg",
            AudioEncoding::Linear16 => "wav",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            AudioEncoding::Mp3 => "audio/mpeg",
            AudioEncoding::OggOpus => "audio/ogg",
            AudioEncoding::Linear16 => "audio/wav",
        }
    }
}

/// Voice used to read the lecture manuscript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    /// BCP-47 language tag, e.g. `en-US`.
    pub language_code: String,
    /// Provider voice identity, e.g. `en-US-Neural2-D`.
    pub name: String,
    /// `MALE`, `FEMALE` or `NEUTRAL`.
    pub ssml_gender: String,
    pub audio_encoding: AudioEncoding,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language_code: "en-US".to_string(),
            name: "en-US-Neural2-D".to_string(),
            ssml_gender: "MALE".to_string(),
            audio_encoding: AudioEncoding::Mp3,
        }
    }
}

/// Converts text to audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>, ProviderError>;
}

// ── Google Cloud Text-to-Speech ──────────────────────────────────────────

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    #[serde(rename = "audioConfig")]
    audio_config: AudioConfig,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
    ssml_gender: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: AudioEncoding,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

/// [`SpeechSynthesizer`] backed by the Google Cloud Text-to-Speech REST API.
pub struct GoogleTtsSynthesizer {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    timeout_secs: u64,
}

impl GoogleTtsSynthesizer {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, NotecastError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| NotecastError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: GOOGLE_TTS_ENDPOINT.to_string(),
            timeout_secs,
        })
    }

    /// Read the API key from `GOOGLE_TTS_API_KEY`.
    pub fn from_env(timeout_secs: u64) -> Result<Self, NotecastError> {
        match std::env::var(GOOGLE_TTS_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Self::new(key.trim(), timeout_secs),
            _ => Err(NotecastError::ProviderNotConfigured {
                provider: "google-tts".to_string(),
                hint: format!("Set {GOOGLE_TTS_KEY_ENV} to a Cloud Text-to-Speech API key."),
            }),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTtsSynthesizer {
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>, ProviderError> {
        let body = synthesize_request(text, voice);

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    ProviderError::Failed {
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SynthesizeResponse = response.json().await.map_err(|e| ProviderError::Failed {
            detail: format!("malformed synthesis response: {e}"),
        })?;

        let audio = decode_audio_content(&parsed.audio_content)?;
        debug!("Synthesized {} bytes of {:?} audio", audio.len(), voice.audio_encoding);
        Ok(audio)
    }
}

fn synthesize_request<'a>(text: &'a str, voice: &'a VoiceConfig) -> SynthesizeRequest<'a> {
    SynthesizeRequest {
        input: SynthesisInput { text },
        voice: VoiceSelection {
            language_code: &voice.language_code,
            name: &voice.name,
            ssml_gender: &voice.ssml_gender,
        },
        audio_config: AudioConfig {
            audio_encoding: voice.audio_encoding,
        },
    }
}

fn decode_audio_content(encoded: &str) -> Result<Vec<u8>, ProviderError> {
    if encoded.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| ProviderError::Failed {
            detail: format!("audioContent is not valid base64: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_voice_matches_lecture_voice() {
        let v = VoiceConfig::default();
        assert_eq!(v.language_code, "en-US");
        assert_eq!(v.name, "en-US-Neural2-D");
        assert_eq!(v.ssml_gender, "MALE");
        assert_eq!(v.audio_encoding, AudioEncoding::Mp3);
    }

    #[test]
    fn request_body_uses_api_field_names() {
        let voice = VoiceConfig::default();
        let json = serde_json::to_value(synthesize_request("Hello class.", &voice)).unwrap();
        assert_eq!(json["input"]["text"], "Hello class.");
        assert_eq!(json["voice"]["languageCode"], "en-US");
        assert_eq!(json["voice"]["name"], "en-US-Neural2-D");
        assert_eq!(json["voice"]["ssmlGender"], "MALE");
        assert_eq!(json["audioConfig"]["audioEncoding"], "MP3");
    }

    #[test]
    fn ogg_encoding_serialises_screaming_case() {
        let json = serde_json::to_string(&AudioEncoding::OggOpus).unwrap();
        assert_eq!(json, "\"OGG_OPUS\"");
    }

    #[test]
    fn decode_rejects_empty_and_garbage() {
        assert!(matches!(decode_audio_content(""), Err(ProviderError::EmptyResponse)));
        assert!(matches!(
            decode_audio_content("not base64!!"),
            Err(ProviderError::Failed { .. })
        ));
        assert_eq!(decode_audio_content("SUQz").unwrap(), b"ID3");
    }

    #[test]
    fn response_parses_audio_content() {
        let parsed: SynthesizeResponse =
            serde_json::from_str(r#"{"audioContent":"SUQz"}"#).unwrap();
        assert_eq!(parsed.audio_content, "SUQz");
    }
}
