//! Houndify cloud engine
//!
//! Audio is posted to the Houndify voice endpoint in one request. Every
//! request is signed with the client key:
//!
//! ```text
//! Hound-Request-Authentication: {user_id};{request_id}
//! Hound-Client-Authentication:  {client_id};{timestamp};{signature}
//! signature = base64url(HMAC-SHA256(base64url_decode(client_key),
//!                                   "{user_id};{request_id}{timestamp}"))
//! ```

use async_trait::async_trait;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chipper_core::audio::{collect_audio, pcm16_duration};
use chipper_core::{
    AudioCodec, AudioSource, EngineCell, EngineConfig, EngineError, RecognitionContext,
    SpeechEngine, Transcript,
};
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;

use crate::wav::pcm16_to_wav;
use crate::{ensure_supported, upstream_language, MAX_UTTERANCE_BYTES};

pub const HOUNDIFY_ID: &str = "houndify";

const DEFAULT_ENDPOINT: &str = "https://api.houndify.com/v1/audio";
const CODECS: &[AudioCodec] = &[AudioCodec::Pcm16, AudioCodec::OggOpus];

type HmacSha256 = Hmac<Sha256>;

/// Client credentials and request signing
#[derive(Clone)]
pub struct HoundifySigner {
    client_id: String,
    client_key: Vec<u8>,
    user_id: String,
}

impl HoundifySigner {
    pub fn new(client_id: &str, client_key: &str, user_id: &str) -> Result<Self, EngineError> {
        let client_key = URL_SAFE
            .decode(client_key)
            .or_else(|_| URL_SAFE_NO_PAD.decode(client_key.trim_end_matches('=')))
            .map_err(|_| {
                EngineError::initialization(HOUNDIFY_ID, "client_key is not valid base64url")
            })?;
        if client_key.is_empty() {
            return Err(EngineError::initialization(HOUNDIFY_ID, "client_key is empty"));
        }
        Ok(Self {
            client_id: client_id.to_string(),
            client_key,
            user_id: user_id.to_string(),
        })
    }

    pub fn signature(&self, request_id: &str, timestamp: i64) -> Result<String, EngineError> {
        let mut mac = HmacSha256::new_from_slice(&self.client_key)
            .map_err(|e| EngineError::Recognition(format!("Failed to key HMAC: {}", e)))?;
        mac.update(format!("{};{}{}", self.user_id, request_id, timestamp).as_bytes());
        Ok(URL_SAFE.encode(mac.finalize().into_bytes()))
    }

    /// `(Hound-Request-Authentication, Hound-Client-Authentication)` values
    pub fn auth_headers(
        &self,
        request_id: &str,
        timestamp: i64,
    ) -> Result<(String, String), EngineError> {
        let signature = self.signature(request_id, timestamp)?;
        Ok((
            format!("{};{}", self.user_id, request_id),
            format!("{};{};{}", self.client_id, timestamp, signature),
        ))
    }

    fn request_info(&self, request_id: &str, timestamp: i64, language: &str) -> serde_json::Value {
        serde_json::json!({
            "ClientID": self.client_id,
            "UserID": self.user_id,
            "RequestID": request_id,
            "TimeStamp": timestamp,
            "PartialTranscriptsDesired": false,
            "InputLanguageIETFTag": language,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HoundResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    disambiguation: Option<Disambiguation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Disambiguation {
    #[serde(default)]
    choice_data: Vec<ChoiceData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ChoiceData {
    #[serde(default)]
    transcription: String,
    #[serde(default)]
    confidence_score: Option<f32>,
}

/// Extract the top transcription and its confidence from a voice response
pub fn parse_response(body: &[u8]) -> Result<(String, Option<f32>), EngineError> {
    let response: HoundResponse = serde_json::from_slice(body)
        .map_err(|e| EngineError::Recognition(format!("Failed to parse Houndify response: {}", e)))?;

    if !response.status.eq_ignore_ascii_case("ok") {
        return Err(EngineError::Recognition(format!(
            "Houndify returned status '{}': {}",
            response.status,
            response.error_message.unwrap_or_default()
        )));
    }

    Ok(response
        .disambiguation
        .and_then(|d| d.choice_data.into_iter().next())
        .map(|c| (c.transcription.trim().to_string(), c.confidence_score))
        .unwrap_or_default())
}

struct HoundifyState {
    signer: HoundifySigner,
    client: reqwest::Client,
    endpoint: String,
    languages: Vec<String>,
    sample_rate: u32,
    timeout: Duration,
}

/// Houndify speech engine
pub struct HoundifyEngine {
    state: EngineCell<HoundifyState>,
}

impl HoundifyEngine {
    pub fn new() -> Self {
        Self {
            state: EngineCell::new(HOUNDIFY_ID),
        }
    }
}

impl Default for HoundifyEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechEngine for HoundifyEngine {
    fn identifier(&self) -> &'static str {
        HOUNDIFY_ID
    }

    async fn initialize(&self, config: &EngineConfig) -> Result<(), EngineError> {
        let signer = HoundifySigner::new(
            config.credential(HOUNDIFY_ID, "client_id")?,
            config.credential(HOUNDIFY_ID, "client_key")?,
            config.credential(HOUNDIFY_ID, "user_id")?,
        )?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                EngineError::initialization(HOUNDIFY_ID, format!("Failed to create HTTP client: {}", e))
            })?;

        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        tracing::info!(engine = HOUNDIFY_ID, endpoint = %endpoint, "Houndify engine ready");

        self.state.set(HoundifyState {
            signer,
            client,
            endpoint,
            languages: config.languages.clone(),
            sample_rate: config.sample_rate,
            timeout: config.timeout(),
        })
    }

    async fn recognize(
        &self,
        audio: &mut dyn AudioSource,
        ctx: &RecognitionContext,
    ) -> Result<Transcript, EngineError> {
        let state = self.state.get()?;
        ensure_supported(ctx, &state.languages, CODECS)?;

        let raw = collect_audio(audio, MAX_UTTERANCE_BYTES).await?;
        let language = upstream_language(ctx);
        if raw.is_empty() {
            return Ok(Transcript::new(HOUNDIFY_ID, "", language));
        }

        let (body, audio_ms) = match ctx.codec {
            AudioCodec::Pcm16 => {
                let ms = pcm16_duration(raw.len(), state.sample_rate).as_millis() as u64;
                (pcm16_to_wav(&raw, state.sample_rate)?, ms)
            },
            _ => (raw, 0),
        };
        let content_type = match ctx.codec {
            AudioCodec::Pcm16 => "audio/wav",
            other => other.mime_type(),
        };

        let request_id = uuid::Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().timestamp();
        let (request_auth, client_auth) = state.signer.auth_headers(&request_id, timestamp)?;
        let request_info = state.signer.request_info(&request_id, timestamp, language);

        tracing::debug!(
            engine = HOUNDIFY_ID,
            session_id = %ctx.session_id,
            request_id = %request_id,
            bytes = body.len(),
            "Sending audio to Houndify"
        );

        let response = state
            .client
            .post(&state.endpoint)
            .header(CONTENT_TYPE, content_type)
            .header("Hound-Request-Authentication", request_auth)
            .header("Hound-Client-Authentication", client_auth)
            .header("Hound-Request-Info", request_info.to_string())
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout(state.timeout)
                } else {
                    EngineError::Unavailable(format!("Houndify request failed: {}", e))
                }
            })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| EngineError::Unavailable(format!("Houndify response interrupted: {}", e)))?;
        if !status.is_success() {
            return Err(EngineError::Recognition(format!(
                "Houndify returned HTTP {}: {}",
                status,
                String::from_utf8_lossy(&bytes)
            )));
        }

        let (text, confidence) = parse_response(&bytes)?;
        let mut transcript = Transcript::new(HOUNDIFY_ID, text, language).with_audio_ms(audio_ms);
        if let Some(confidence) = confidence {
            transcript = transcript.with_confidence(confidence);
        }
        Ok(transcript)
    }
}
