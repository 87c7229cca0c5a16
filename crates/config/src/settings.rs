//! Main settings module

use chipper_core::{AudioLimits, EngineConfig};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ConfigError;

/// Prefix of environment variable overrides (`CHIPPER__SERVER__GRPC_PORT`)
pub const ENV_PREFIX: &str = "CHIPPER";

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - missing model paths only warn
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Which engine the multi-engine binary dispatches to
    #[serde(default)]
    pub engine: EngineSelection,

    /// Per-engine configuration, keyed by engine identifier
    #[serde(default)]
    pub engines: HashMap<String, EngineConfig>,

    /// Intent-resolution stage
    #[serde(default)]
    pub intent: IntentConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for one engine, defaults when the section is absent
    pub fn engine_config(&self, id: &str) -> EngineConfig {
        self.engines.get(id).cloned().unwrap_or_default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_engines()?;
        self.validate_intent()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        let server = &self.server;

        if server.grpc_port == 0 {
            return Err(ConfigError::invalid("server.grpc_port", "Port cannot be 0"));
        }
        if server.http_port == 0 {
            return Err(ConfigError::invalid("server.http_port", "Port cannot be 0"));
        }
        if server.grpc_port == server.http_port {
            return Err(ConfigError::invalid(
                "server.http_port",
                format!("Must differ from server.grpc_port ({})", server.grpc_port),
            ));
        }
        if server.first_message_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "server.first_message_timeout_ms",
                "Timeout must be at least 1 ms",
            ));
        }
        if server.max_concurrent_streams == 0 {
            return Err(ConfigError::invalid(
                "server.max_concurrent_streams",
                "Must be at least 1",
            ));
        }
        if server.response_buffer == 0 {
            return Err(ConfigError::invalid("server.response_buffer", "Must be at least 1"));
        }

        if let Some(tls) = &server.tls {
            let files = [
                ("server.tls.cert_path", &tls.cert_path),
                ("server.tls.key_path", &tls.key_path),
            ];
            for (field, path) in files {
                if !path.is_file() {
                    return Err(ConfigError::invalid(
                        field,
                        format!("File not found: {}", path.display()),
                    ));
                }
            }
        }

        Ok(())
    }

    fn validate_engines(&self) -> Result<(), ConfigError> {
        let active = self.engine.active.trim();
        if active.is_empty() {
            return Err(ConfigError::invalid("engine.active", "Engine identifier cannot be empty"));
        }
        if !active
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(ConfigError::invalid(
                "engine.active",
                format!("'{}' is not a valid engine identifier", active),
            ));
        }

        for (id, engine) in &self.engines {
            if engine.timeout_ms == 0 {
                return Err(ConfigError::invalid(
                    &format!("engines.{}.timeout_ms", id),
                    "Timeout must be at least 1 ms",
                ));
            }
            if engine.sample_rate == 0 {
                return Err(ConfigError::invalid(
                    &format!("engines.{}.sample_rate", id),
                    "Sample rate cannot be 0",
                ));
            }
            if let Some(path) = &engine.model_path {
                if !path.exists() {
                    if self.environment.is_strict() {
                        return Err(ConfigError::invalid(
                            &format!("engines.{}.model_path", id),
                            format!("Path not found: {}", path.display()),
                        ));
                    }
                    tracing::warn!(
                        engine = %id,
                        path = %path.display(),
                        "Engine model path does not exist"
                    );
                }
            }
        }

        Ok(())
    }

    fn validate_intent(&self) -> Result<(), ConfigError> {
        let intent = &self.intent;

        if intent.max_audio_ms < 100 {
            return Err(ConfigError::invalid(
                "intent.max_audio_ms",
                format!("Must be at least 100 ms, got {}", intent.max_audio_ms),
            ));
        }
        if intent.endpoint_silence_ms == 0 || intent.endpoint_silence_ms >= intent.max_audio_ms {
            return Err(ConfigError::invalid(
                "intent.endpoint_silence_ms",
                "Must be positive and shorter than intent.max_audio_ms",
            ));
        }
        if !(-96.0..=0.0).contains(&intent.energy_floor_db) {
            return Err(ConfigError::invalid(
                "intent.energy_floor_db",
                format!("Must be within [-96, 0] dBFS, got {}", intent.energy_floor_db),
            ));
        }
        for (name, phrases) in &intent.phrases {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid("intent.phrases", "Intent name cannot be empty"));
            }
            if phrases.iter().all(|p| p.trim().is_empty()) {
                return Err(ConfigError::invalid(
                    &format!("intent.phrases.{}", name),
                    "At least one non-empty phrase is required",
                ));
            }
        }

        Ok(())
    }
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for both listeners
    #[serde(default = "default_host")]
    pub host: String,

    /// gRPC (robot-facing) port
    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,

    /// Health and metrics port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Upper bound on the wait for a call's first message
    #[serde(default = "default_first_message_timeout_ms")]
    pub first_message_timeout_ms: u64,

    /// HTTP/2 keepalive ping interval
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// Maximum concurrent streams per connection
    #[serde(default = "default_max_concurrent_streams")]
    pub max_concurrent_streams: u32,

    /// Outbound responses buffered per call
    #[serde(default = "default_response_buffer")]
    pub response_buffer: usize,

    /// TLS for the gRPC listener; plaintext when absent
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl ServerConfig {
    pub fn first_message_timeout(&self) -> Duration {
        Duration::from_millis(self.first_message_timeout_ms)
    }

    pub fn grpc_addr(&self) -> String {
        format!("{}:{}", self.host, self.grpc_port)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_grpc_port() -> u16 {
    8084
}
fn default_http_port() -> u16 {
    8080
}
fn default_first_message_timeout_ms() -> u64 {
    10_000
}
fn default_keepalive_secs() -> u64 {
    30
}
fn default_max_concurrent_streams() -> u32 {
    256
}
fn default_response_buffer() -> usize {
    16
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            grpc_port: default_grpc_port(),
            http_port: default_http_port(),
            first_message_timeout_ms: default_first_message_timeout_ms(),
            keepalive_secs: default_keepalive_secs(),
            max_concurrent_streams: default_max_concurrent_streams(),
            response_buffer: default_response_buffer(),
            tls: None,
        }
    }
}

/// PEM certificate and key for the gRPC listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Active engine selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSelection {
    /// Engine identifier the multi-engine binary routes sessions to
    #[serde(default = "default_active_engine")]
    pub active: String,
}

fn default_active_engine() -> String {
    "vosk".to_string()
}

impl Default for EngineSelection {
    fn default() -> Self {
        Self {
            active: default_active_engine(),
        }
    }
}

/// What the intent stage returns for a recognized utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntentMode {
    /// Resolve the transcript to an intent
    #[default]
    IntentGraph,
    /// Return the transcript itself
    Transcription,
}

/// Intent-resolution stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    #[serde(default)]
    pub mode: IntentMode,

    /// Hard cap on one utterance
    #[serde(default = "default_max_audio_ms")]
    pub max_audio_ms: u64,

    /// Trailing silence that ends an utterance
    #[serde(default = "default_endpoint_silence_ms")]
    pub endpoint_silence_ms: u64,

    /// Energy below which PCM audio counts as silence (dBFS)
    #[serde(default = "default_energy_floor_db")]
    pub energy_floor_db: f32,

    /// Intent name -> trigger phrases
    #[serde(default = "default_phrases")]
    pub phrases: BTreeMap<String, Vec<String>>,
}

impl IntentConfig {
    /// Audio limits for a session recognized at `sample_rate`
    pub fn audio_limits(&self, sample_rate: u32) -> AudioLimits {
        AudioLimits {
            max_audio: Duration::from_millis(self.max_audio_ms),
            endpoint_silence: Duration::from_millis(self.endpoint_silence_ms),
            energy_floor_db: self.energy_floor_db,
            sample_rate,
        }
    }
}

fn default_max_audio_ms() -> u64 {
    10_000
}
fn default_endpoint_silence_ms() -> u64 {
    800
}
fn default_energy_floor_db() -> f32 {
    -45.0
}

fn default_phrases() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 6] = [
        ("intent_greeting_hello", &["hello", "hi there", "good morning", "good evening"]),
        ("intent_greeting_goodbye", &["goodbye", "see you later", "good night"]),
        ("intent_clock_time", &["what time is it", "the time", "what's the time"]),
        ("intent_weather_extend", &["weather", "is it going to rain", "temperature"]),
        ("intent_imperative_volumeup", &["volume up", "louder"]),
        ("intent_imperative_volumedown", &["volume down", "quieter"]),
    ];
    table
        .iter()
        .map(|(name, phrases)| {
            (
                name.to_string(),
                phrases.iter().map(|p| p.to_string()).collect(),
            )
        })
        .collect()
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            mode: IntentMode::default(),
            max_audio_ms: default_max_audio_ms(),
            endpoint_silence_ms: default_endpoint_silence_ms(),
            energy_floor_db: default_energy_floor_db(),
            phrases: default_phrases(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Serve Prometheus metrics on the HTTP listener
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from `config/` and the environment
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings from files under `dir` and the environment
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    let default = dir.join("default");
    builder = builder.add_source(File::with_name(&default.to_string_lossy()).required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        let path = dir.join(env_name);
        builder = builder.add_source(File::with_name(&path.to_string_lossy()).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
