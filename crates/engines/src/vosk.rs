//! Vosk offline engine
//!
//! The Kaldi-based Vosk model runs in a local sidecar. chipper checks that
//! the model directory looks like a Vosk model, that the sidecar serving it
//! is healthy, and warms it up once.

use async_trait::async_trait;
use chipper_core::audio::{collect_audio, pcm16_duration};
use chipper_core::{
    AudioCodec, AudioSource, EngineCell, EngineConfig, EngineError, RecognitionContext,
    SpeechEngine, Transcript,
};
use std::path::{Path, PathBuf};

use crate::sidecar::SidecarClient;
use crate::{ensure_supported, upstream_language, MAX_UTTERANCE_BYTES};

pub const VOSK_ID: &str = "vosk";

const DEFAULT_SIDECAR_URL: &str = "http://127.0.0.1:8092";
const CODECS: &[AudioCodec] = &[AudioCodec::Pcm16];

struct VoskState {
    sidecar: SidecarClient,
    languages: Vec<String>,
    sample_rate: u32,
}

/// Vosk speech engine
pub struct VoskEngine {
    state: EngineCell<VoskState>,
}

impl VoskEngine {
    pub fn new() -> Self {
        Self {
            state: EngineCell::new(VOSK_ID),
        }
    }
}

impl Default for VoskEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Check that `dir` is an unpacked Vosk model
pub fn validate_model_dir(dir: &Path) -> Result<(), EngineError> {
    if !dir.is_dir() {
        return Err(EngineError::initialization(
            VOSK_ID,
            format!("model directory not found: {}", dir.display()),
        ));
    }
    let markers = [dir.join("conf").join("model.conf"), dir.join("am").join("final.mdl")];
    if !markers.iter().any(|m| m.is_file()) {
        return Err(EngineError::initialization(
            VOSK_ID,
            format!(
                "{} does not look like a Vosk model (no conf/model.conf or am/final.mdl)",
                dir.display()
            ),
        ));
    }
    Ok(())
}

fn model_dir(config: &EngineConfig) -> Result<&PathBuf, EngineError> {
    config
        .model_path
        .as_ref()
        .ok_or_else(|| EngineError::initialization(VOSK_ID, "model_path is not configured"))
}

#[async_trait]
impl SpeechEngine for VoskEngine {
    fn identifier(&self) -> &'static str {
        VOSK_ID
    }

    async fn initialize(&self, config: &EngineConfig) -> Result<(), EngineError> {
        let dir = model_dir(config)?;
        validate_model_dir(dir)?;

        let headers = [("x-model-path", dir.display().to_string())];
        let sidecar = SidecarClient::connect(VOSK_ID, DEFAULT_SIDECAR_URL, config, &headers).await?;
        if config.warm_up {
            sidecar.warm_up().await?;
        }

        tracing::info!(
            engine = VOSK_ID,
            model = %dir.display(),
            sidecar = sidecar.base_url(),
            "Vosk engine ready"
        );
        self.state.set(VoskState {
            sidecar,
            languages: config.languages.clone(),
            sample_rate: config.sample_rate,
        })
    }

    async fn recognize(
        &self,
        audio: &mut dyn AudioSource,
        ctx: &RecognitionContext,
    ) -> Result<Transcript, EngineError> {
        let state = self.state.get()?;
        ensure_supported(ctx, &state.languages, CODECS)?;

        let pcm = collect_audio(audio, MAX_UTTERANCE_BYTES).await?;
        let language = upstream_language(ctx);
        if pcm.is_empty() {
            return Ok(Transcript::new(VOSK_ID, "", language));
        }

        let audio_ms = pcm16_duration(pcm.len(), state.sample_rate).as_millis() as u64;
        let result = state.sidecar.transcribe(pcm, language).await?;

        let mut transcript =
            Transcript::new(VOSK_ID, result.text.trim(), language).with_audio_ms(audio_ms);
        if let Some(confidence) = result.confidence {
            transcript = transcript.with_confidence(confidence);
        }
        Ok(transcript)
    }
}
