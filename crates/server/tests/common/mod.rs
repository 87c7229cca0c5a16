//! Shared fixtures for server integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chipper_config::Settings;
use chipper_core::audio::collect_audio;
use chipper_core::{
    AudioCodec, AudioSource, EngineConfig, EngineError, IntentGraph,
    IntentGraphError, IntentResponse, LanguageTag, RecognitionContext, SessionMessage,
    SessionRequest, SessionStream, SpeechEngine, StreamError, Transcript,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct TestMessage {
    pub device: String,
    pub session: String,
    pub language: String,
    pub codec: AudioCodec,
    pub audio: Vec<u8>,
}

impl TestMessage {
    pub fn new(device: &str, session: &str, language: &str, codec: AudioCodec) -> Self {
        Self {
            device: device.to_string(),
            session: session.to_string(),
            language: language.to_string(),
            codec,
            audio: Vec::new(),
        }
    }

    pub fn robot(audio: Vec<u8>) -> Self {
        Self {
            audio,
            ..Self::new("robot-1", "abc", "en-US", AudioCodec::Pcm16)
        }
    }
}

impl SessionMessage for TestMessage {
    fn device_id(&self) -> &str {
        &self.device
    }
    fn session_id(&self) -> &str {
        &self.session
    }
    fn language_tag(&self) -> LanguageTag {
        LanguageTag::new(self.language.clone())
    }
    fn audio_codec(&self) -> AudioCodec {
        self.codec
    }
    fn audio(&self) -> &[u8] {
        &self.audio
    }
}

/// Scripted call stream
#[derive(Default)]
pub struct TestStream {
    pub inbound: VecDeque<Result<TestMessage, StreamError>>,
    pub sent: Vec<IntentResponse>,
    pub recv_calls: usize,
    /// Block forever once the script is exhausted instead of half-closing
    pub hang_when_empty: bool,
}

impl TestStream {
    pub fn with_messages(messages: impl IntoIterator<Item = TestMessage>) -> Self {
        Self {
            inbound: messages.into_iter().map(Ok).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SessionStream for TestStream {
    type Message = TestMessage;

    async fn recv(&mut self) -> Result<Option<TestMessage>, StreamError> {
        self.recv_calls += 1;
        match self.inbound.pop_front() {
            Some(next) => next.map(Some),
            None if self.hang_when_empty => std::future::pending().await,
            None => Ok(None),
        }
    }

    async fn send(&mut self, response: IntentResponse) -> Result<(), StreamError> {
        self.sent.push(response);
        Ok(())
    }
}

/// What the intent graph saw of a request
#[derive(Debug, Clone, PartialEq)]
pub struct SeenRequest {
    pub device_id: String,
    pub session_id: String,
    pub language: String,
    pub codec: AudioCodec,
    pub first_audio: Vec<u8>,
}

/// Intent graph that records requests and answers from a script
pub struct MockGraph {
    pub seen: Mutex<Vec<SeenRequest>>,
    outcome: Result<String, IntentGraphError>,
    delay: Option<Duration>,
}

impl MockGraph {
    pub fn responding(intent: &str) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            outcome: Ok(intent.to_string()),
            delay: None,
        }
    }

    pub fn failing(error: IntentGraphError) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            outcome: Err(error),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl<M: SessionMessage> IntentGraph<M> for MockGraph {
    async fn process_intent_graph(
        &self,
        mut request: SessionRequest<'_, M>,
    ) -> Result<IntentResponse, IntentGraphError> {
        self.seen.lock().push(SeenRequest {
            device_id: request.device_id().to_string(),
            session_id: request.session_id().to_string(),
            language: request.language().to_string(),
            codec: request.codec(),
            first_audio: request.first_message().audio().to_vec(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.outcome {
            Ok(intent) => {
                // echo the language so concurrent sessions can be told apart
                let response =
                    IntentResponse::new(request.session_id(), request.device_id(), intent.as_str())
                        .with_parameter("language", request.language().as_str());
                request.respond(response.clone()).await?;
                Ok(response)
            },
            Err(e) => Err(e.clone()),
        }
    }
}

/// Speech engine returning a fixed transcript for any non-empty audio
pub struct MockEngine {
    id: &'static str,
    text: String,
    init_error: Option<&'static str>,
    recognize_error: Option<fn() -> EngineError>,
    pub init_calls: AtomicUsize,
    pub recognize_calls: AtomicUsize,
}

impl MockEngine {
    pub fn new(id: &'static str, text: &str) -> Self {
        Self {
            id,
            text: text.to_string(),
            init_error: None,
            recognize_error: None,
            init_calls: AtomicUsize::new(0),
            recognize_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_init(id: &'static str) -> Self {
        Self {
            init_error: Some("model file missing"),
            ..Self::new(id, "")
        }
    }

    pub fn failing_recognize(id: &'static str, error: fn() -> EngineError) -> Self {
        Self {
            recognize_error: Some(error),
            ..Self::new(id, "")
        }
    }

    pub fn init_count(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechEngine for MockEngine {
    fn identifier(&self) -> &'static str {
        self.id
    }

    async fn initialize(&self, _config: &EngineConfig) -> Result<(), EngineError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        match self.init_error {
            Some(reason) => Err(EngineError::initialization(self.id, reason)),
            None => Ok(()),
        }
    }

    async fn recognize(
        &self,
        audio: &mut dyn AudioSource,
        ctx: &RecognitionContext,
    ) -> Result<Transcript, EngineError> {
        self.recognize_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(make) = self.recognize_error {
            return Err(make());
        }
        let audio = collect_audio(audio, usize::MAX).await?;
        let text = if audio.is_empty() { "" } else { self.text.as_str() };
        Ok(Transcript::new(self.id, text, ctx.language.as_str()).with_confidence(0.9))
    }
}

/// 16 kHz PCM16 square wave, well above the energy floor
pub fn loud_pcm(ms: u64) -> Vec<u8> {
    let samples = (16 * ms) as usize;
    (0..samples)
        .flat_map(|i| if i % 2 == 0 { 9000i16 } else { -9000i16 }.to_le_bytes())
        .collect()
}

/// Settings bound to loopback with ephemeral ports
pub fn loopback_settings() -> Settings {
    let mut settings = Settings::default();
    settings.server.host = "127.0.0.1".to_string();
    settings.server.grpc_port = 0;
    settings.server.http_port = 0;
    settings.observability.metrics_enabled = false;
    settings
}
