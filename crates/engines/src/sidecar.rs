//! HTTP inference sidecar client
//!
//! Local engines (Leopard, Vosk) run their model in a sidecar process next to
//! chipper. The sidecar exposes:
//! - `GET /health` - 2xx once the model is loaded
//! - `POST /transcribe` - raw PCM16 body, `X-Language` and `X-Sample-Rate`
//!   headers, JSON transcript response

use chipper_core::{EngineConfig, EngineError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;

/// Response from the sidecar `/transcribe` endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SidecarTranscript {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Connection to one engine's inference sidecar
#[derive(Debug, Clone)]
pub struct SidecarClient {
    engine: &'static str,
    base_url: String,
    client: reqwest::Client,
    sample_rate: u32,
    timeout: Duration,
}

impl SidecarClient {
    /// Build the client and verify the sidecar is healthy.
    ///
    /// `headers` are sent with every request (model path, access key).
    pub async fn connect(
        engine: &'static str,
        default_url: &str,
        config: &EngineConfig,
        headers: &[(&'static str, String)],
    ) -> Result<Self, EngineError> {
        let base_url = config
            .endpoint
            .as_deref()
            .unwrap_or(default_url)
            .trim_end_matches('/')
            .to_string();

        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            let invalid =
                || EngineError::initialization(engine, format!("invalid header {}", name));
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            default_headers.insert(header, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers)
            .build()
            .map_err(|e| {
                EngineError::initialization(engine, format!("Failed to create HTTP client: {}", e))
            })?;

        let health_url = format!("{}/health", base_url);
        match client.get(&health_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(engine, url = %base_url, "Inference sidecar is healthy");
            },
            Ok(resp) => {
                return Err(EngineError::initialization(
                    engine,
                    format!("sidecar at {} returned status {}", base_url, resp.status()),
                ));
            },
            Err(e) => {
                return Err(EngineError::initialization(
                    engine,
                    format!("sidecar at {} not reachable: {}", base_url, e),
                ));
            },
        }

        Ok(Self {
            engine,
            base_url,
            client,
            sample_rate: config.sample_rate,
            timeout: config.timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run one short silent inference so the first real request is not slow
    pub async fn warm_up(&self) -> Result<(), EngineError> {
        let silence = vec![0u8; (self.sample_rate as usize / 2) * 2];
        self.transcribe(silence, "en-US")
            .await
            .map_err(|e| EngineError::initialization(self.engine, format!("warm-up failed: {}", e)))?;
        tracing::debug!(engine = self.engine, "Sidecar warm-up complete");
        Ok(())
    }

    /// Send PCM16 audio to the sidecar and get its transcript
    pub async fn transcribe(
        &self,
        pcm: Vec<u8>,
        language: &str,
    ) -> Result<SidecarTranscript, EngineError> {
        let url = format!("{}/transcribe", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "audio/pcm")
            .header("X-Language", language)
            .header("X-Sample-Rate", self.sample_rate.to_string())
            .body(pcm)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout(self.timeout)
                } else {
                    EngineError::Unavailable(format!("{} sidecar request failed: {}", self.engine, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Recognition(format!(
                "{} sidecar returned error: {}",
                self.engine, status
            )));
        }

        let result: SidecarTranscript = response.json().await.map_err(|e| {
            EngineError::Recognition(format!("Failed to parse {} sidecar response: {}", self.engine, e))
        })?;

        if let Some(error) = &result.error {
            return Err(EngineError::Recognition(format!(
                "{} sidecar reported: {}",
                self.engine, error
            )));
        }

        Ok(result)
    }
}
