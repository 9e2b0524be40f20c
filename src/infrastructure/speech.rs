//! Google Speech client
//!
//! Batch speech recognition and synthesis over the REST API, tuned for
//! phone audio: MULAW at 8 kHz both ways, with Quebec French as the
//! alternative recognition language. Low-confidence transcripts are
//! discarded rather than answered.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use crate::application::language::Language;
use crate::errors::{ComptoirError, Result};

const STT_ENDPOINT: &str = "https://speech.googleapis.com/v1/speech:recognize";
const TTS_ENDPOINT: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

/// Transcripts below this confidence are dropped; phone audio is noisy
const MIN_TRANSCRIPT_CONFIDENCE: f64 = 0.6;

#[derive(Clone)]
pub struct SpeechClient {
    api_key: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<RecognitionAlternative>,
}

#[derive(Deserialize)]
struct RecognitionAlternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    confidence: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

impl SpeechClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: reqwest::Client::new(),
        }
    }

    /// Transcribe a chunk of MULAW call audio. Returns `None` for silence
    /// or low-confidence recognition.
    pub async fn speech_to_text(&self, audio: &[u8]) -> Result<Option<String>> {
        let payload = serde_json::json!({
            "config": {
                "encoding": "MULAW",
                "sampleRateHertz": 8000,
                "languageCode": "en-US",
                "alternativeLanguageCodes": ["fr-CA"],
                "enableAutomaticPunctuation": true,
                "model": "phone_call",
            },
            "audio": {
                "content": BASE64.encode(audio),
            },
        });

        let response = self
            .http
            .post(STT_ENDPOINT)
            .query(&[("key", &self.api_key)])
            .json(&payload)
            .send()
            .await
            .map_err(|e| ComptoirError::NetworkError(format!("speech request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ComptoirError::SpeechError(format!(
                "speech API returned {}: {}",
                status, body
            )));
        }

        let recognized: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| ComptoirError::SpeechError(format!("bad speech response: {}", e)))?;

        let best = recognized
            .results
            .into_iter()
            .next()
            .and_then(|r| r.alternatives.into_iter().next());

        Ok(match best {
            Some(alt) if alt.confidence > MIN_TRANSCRIPT_CONFIDENCE => {
                let transcript = alt.transcript.trim().to_string();
                debug!(confidence = alt.confidence, "transcript accepted");
                if transcript.is_empty() {
                    None
                } else {
                    Some(transcript)
                }
            }
            Some(alt) => {
                debug!(confidence = alt.confidence, "transcript below threshold");
                None
            }
            None => None,
        })
    }

    /// Synthesize a spoken reply as MULAW call audio
    pub async fn text_to_speech(&self, text: &str, language: Language) -> Result<Vec<u8>> {
        let (language_code, voice_name) = match language {
            Language::French => ("fr-CA", "fr-CA-Neural2-A"),
            Language::English => ("en-US", "en-US-Standard-C"),
        };

        let payload = serde_json::json!({
            "input": {"text": text},
            "voice": {
                "languageCode": language_code,
                "name": voice_name,
                "ssmlGender": "FEMALE",
            },
            "audioConfig": {
                "audioEncoding": "MULAW",
                "sampleRateHertz": 8000,
                "speakingRate": 1.0,
                "pitch": 0.0,
            },
        });

        let response = self
            .http
            .post(TTS_ENDPOINT)
            .query(&[("key", &self.api_key)])
            .json(&payload)
            .send()
            .await
            .map_err(|e| ComptoirError::NetworkError(format!("synthesis request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ComptoirError::SpeechError(format!(
                "synthesis API returned {}: {}",
                status, body
            )));
        }

        let synthesized: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| ComptoirError::SpeechError(format!("bad synthesis response: {}", e)))?;

        BASE64
            .decode(&synthesized.audio_content)
            .map_err(|e| ComptoirError::SpeechError(format!("undecodable audio content: {}", e)))
    }
}
