//! Speech engine contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use crate::audio::{AudioCodec, AudioSource, DEFAULT_SAMPLE_RATE};
use crate::error::EngineError;
use crate::language::LanguageTag;
use crate::transcript::Transcript;

/// Speech-to-text backend
///
/// Implementations:
/// - `HoundifyEngine` - cloud-hosted recognition
/// - `LeopardEngine` - local neural model
/// - `VoskEngine` - offline acoustic model
///
/// The contract is deliberately three operations wide so the dispatcher and
/// the bootstrap harness can treat every backend the same way.
///
/// # Example
///
/// ```ignore
/// let engine: Arc<dyn SpeechEngine> = Arc::new(VoskEngine::new());
/// engine.initialize(&settings.engine_config(engine.identifier())).await?;
/// let transcript = engine.recognize(&mut audio, &ctx).await?;
/// ```
#[async_trait]
pub trait SpeechEngine: Send + Sync + 'static {
    /// Stable name of the backend, unique within a process
    fn identifier(&self) -> &'static str;

    /// One-time setup: credentials, model files, warm-up, upstream connection.
    ///
    /// Called exactly once per process. An error here means the engine is
    /// unavailable for the lifetime of the process and should be returned
    /// as [`EngineError::Initialization`].
    async fn initialize(&self, config: &EngineConfig) -> Result<(), EngineError>;

    /// Recognize one utterance pulled from `audio`.
    ///
    /// Invoked concurrently by independent sessions; implementations keep no
    /// per-call state on `self`.
    async fn recognize(
        &self,
        audio: &mut dyn AudioSource,
        ctx: &RecognitionContext,
    ) -> Result<Transcript, EngineError>;
}

/// Per-request information handed to an engine
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionContext {
    pub session_id: String,
    pub device_id: String,
    pub language: LanguageTag,
    pub codec: AudioCodec,
}

/// Engine-specific configuration, keyed by engine identifier in settings
#[derive(Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upstream URL (cloud API or local inference sidecar)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Model file or directory for local engines
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Languages the deployed model understands (BCP-47 or primary code).
    /// Empty means "whatever the engine supports".
    #[serde(default)]
    pub languages: Vec<String>,

    /// Secrets such as API keys, looked up by name
    #[serde(default)]
    pub credentials: HashMap<String, String>,

    /// Upstream request timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Run a warm-up inference during initialization
    #[serde(default = "default_true")]
    pub warm_up: bool,

    /// Expected input sample rate
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_true() -> bool {
    true
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model_path: None,
            languages: Vec::new(),
            credentials: HashMap::new(),
            timeout_ms: default_timeout_ms(),
            warm_up: true,
            sample_rate: default_sample_rate(),
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Look up a non-empty credential, failing initialization if missing
    pub fn credential(&self, engine: &'static str, name: &str) -> Result<&str, EngineError> {
        match self.credentials.get(name).map(|v| v.trim()) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(EngineError::initialization(
                engine,
                format!("missing credential '{}'", name),
            )),
        }
    }

    /// Whether `language` is one of the configured languages
    pub fn accepts_language(&self, language: &LanguageTag) -> bool {
        self.languages.is_empty() || self.languages.iter().any(|l| language.matches(l))
    }
}

// Credentials never reach the logs.
impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut credential_names: Vec<&String> = self.credentials.keys().collect();
        credential_names.sort();
        f.debug_struct("EngineConfig")
            .field("endpoint", &self.endpoint)
            .field("model_path", &self.model_path)
            .field("languages", &self.languages)
            .field("credentials", &credential_names)
            .field("timeout_ms", &self.timeout_ms)
            .field("warm_up", &self.warm_up)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// State an engine builds in `initialize` and reads in `recognize`
pub struct EngineCell<T> {
    engine: &'static str,
    inner: OnceLock<T>,
}

impl<T> EngineCell<T> {
    pub const fn new(engine: &'static str) -> Self {
        Self {
            engine,
            inner: OnceLock::new(),
        }
    }

    pub fn set(&self, value: T) -> Result<(), EngineError> {
        self.inner
            .set(value)
            .map_err(|_| EngineError::initialization(self.engine, "already initialized"))
    }

    pub fn get(&self) -> Result<&T, EngineError> {
        self.inner
            .get()
            .ok_or(EngineError::NotInitialized(self.engine))
    }
}
