//! Leopard local neural engine
//!
//! Leopard needs an access key and a `.pv` model file. Inference runs in the
//! local sidecar, which receives both with every request.

use async_trait::async_trait;
use chipper_core::audio::{collect_audio, pcm16_duration};
use chipper_core::{
    AudioCodec, AudioSource, EngineCell, EngineConfig, EngineError, RecognitionContext,
    SpeechEngine, Transcript,
};
use std::path::Path;

use crate::sidecar::SidecarClient;
use crate::{ensure_supported, upstream_language, MAX_UTTERANCE_BYTES};

pub const LEOPARD_ID: &str = "leopard";

const DEFAULT_SIDECAR_URL: &str = "http://127.0.0.1:8091";
const CODECS: &[AudioCodec] = &[AudioCodec::Pcm16];

struct LeopardState {
    sidecar: SidecarClient,
    languages: Vec<String>,
    sample_rate: u32,
}

/// Leopard speech engine
pub struct LeopardEngine {
    state: EngineCell<LeopardState>,
}

impl LeopardEngine {
    pub fn new() -> Self {
        Self {
            state: EngineCell::new(LEOPARD_ID),
        }
    }
}

impl Default for LeopardEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_model_file(path: &Path) -> Result<(), EngineError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        EngineError::initialization(
            LEOPARD_ID,
            format!("model file {} not readable: {}", path.display(), e),
        )
    })?;
    if !metadata.is_file() || metadata.len() == 0 {
        return Err(EngineError::initialization(
            LEOPARD_ID,
            format!("model file {} is empty or not a file", path.display()),
        ));
    }
    Ok(())
}

#[async_trait]
impl SpeechEngine for LeopardEngine {
    fn identifier(&self) -> &'static str {
        LEOPARD_ID
    }

    async fn initialize(&self, config: &EngineConfig) -> Result<(), EngineError> {
        let access_key = config.credential(LEOPARD_ID, "access_key")?;
        let model = config
            .model_path
            .as_ref()
            .ok_or_else(|| EngineError::initialization(LEOPARD_ID, "model_path is not configured"))?;
        validate_model_file(model)?;

        let headers = [
            ("x-access-key", access_key.to_string()),
            ("x-model-path", model.display().to_string()),
        ];
        let sidecar =
            SidecarClient::connect(LEOPARD_ID, DEFAULT_SIDECAR_URL, config, &headers).await?;
        if config.warm_up {
            sidecar.warm_up().await?;
        }

        tracing::info!(
            engine = LEOPARD_ID,
            model = %model.display(),
            sidecar = sidecar.base_url(),
            "Leopard engine ready"
        );
        self.state.set(LeopardState {
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
            return Ok(Transcript::new(LEOPARD_ID, "", language));
        }

        let audio_ms = pcm16_duration(pcm.len(), state.sample_rate).as_millis() as u64;
        let result = state.sidecar.transcribe(pcm, language).await?;

        let mut transcript =
            Transcript::new(LEOPARD_ID, result.text.trim(), language).with_audio_ms(audio_ms);
        if let Some(confidence) = result.confidence {
            transcript = transcript.with_confidence(confidence);
        }
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with_key() -> EngineConfig {
        EngineConfig {
            credentials: HashMap::from([("access_key".to_string(), "pv-key".to_string())]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_access_key() {
        let engine = LeopardEngine::new();
        let err = engine.initialize(&EngineConfig::default()).await.unwrap_err();
        assert!(err.is_initialization());
        assert!(err.to_string().contains("access_key"));
    }

    #[tokio::test]
    async fn test_missing_model_file() {
        let engine = LeopardEngine::new();
        let mut config = config_with_key();
        config.model_path = Some("/nonexistent/leopard_params.pv".into());
        let err = engine.initialize(&config).await.unwrap_err();
        assert!(err.is_initialization());
        assert!(err.to_string().contains("leopard_params.pv"));
    }

    #[test]
    fn test_empty_model_file_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(validate_model_file(file.path()).is_err());
        std::fs::write(file.path(), [1u8; 16]).unwrap();
        assert!(validate_model_file(file.path()).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_sidecar_fails_initialization() {
        let model = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(model.path(), [1u8; 16]).unwrap();

        // Bind then drop to get a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let mut config = config_with_key();
        config.model_path = Some(model.path().to_path_buf());
        config.endpoint = Some(format!("http://127.0.0.1:{}", port));
        config.timeout_ms = 500;

        let engine = LeopardEngine::new();
        let err = engine.initialize(&config).await.unwrap_err();
        assert!(err.is_initialization());
        assert!(err.to_string().contains("not reachable"));
    }
}
