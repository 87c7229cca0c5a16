//! Default intent graph over a mock engine

mod common;

use chipper_config::{IntentConfig, IntentMode, Settings};
use chipper_core::{
    AudioLimits, EngineError, ErrorCode, IntentGraph, SessionRequest, SpeechEngine,
    INTENT_NO_AUDIO, INTENT_TRANSCRIPTION, INTENT_UNMATCHED,
};
use chipper_server::{PhraseMatcher, RecognitionGraph};
use chrono::Utc;
use common::{loud_pcm, MockEngine, TestMessage, TestStream};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn graph(engine: Arc<MockEngine>, mode: IntentMode) -> RecognitionGraph {
    RecognitionGraph::new(
        engine,
        Arc::new(PhraseMatcher::new(&IntentConfig::default().phrases)),
        mode,
        AudioLimits::default(),
    )
}

#[tokio::test]
async fn test_phrase_match_resolves_intent() {
    let engine = Arc::new(MockEngine::new("mock", "Hello there, robot"));
    let graph = graph(engine.clone(), IntentMode::IntentGraph);

    let mut stream = TestStream::with_messages([TestMessage::robot(loud_pcm(100))]);
    let first = TestMessage::robot(loud_pcm(100));
    let request = SessionRequest::new(Utc::now(), first, &mut stream).unwrap();

    let response = graph.process_intent_graph(request).await.unwrap();

    assert_eq!(response.intent, "intent_greeting_hello");
    assert_eq!(response.query_text, "Hello there, robot");
    assert!(response.is_final);
    assert_eq!(engine.recognize_calls.load(Ordering::SeqCst), 1);
    assert_eq!(stream.sent, vec![response]);
}

#[tokio::test]
async fn test_silence_resolves_to_no_audio() {
    let engine = Arc::new(MockEngine::new("mock", "ignored"));
    let graph = graph(engine, IntentMode::IntentGraph);

    let mut stream = TestStream::default();
    let request = SessionRequest::new(Utc::now(), TestMessage::robot(vec![]), &mut stream).unwrap();

    let response = graph.process_intent_graph(request).await.unwrap();

    assert_eq!(response.intent, INTENT_NO_AUDIO);
    assert_eq!(stream.sent.len(), 1);
}

#[tokio::test]
async fn test_unknown_phrase_resolves_to_unmatched() {
    let engine = Arc::new(MockEngine::new("mock", "purple monkey dishwasher"));
    let graph = graph(engine, IntentMode::IntentGraph);

    let mut stream = TestStream::default();
    let request =
        SessionRequest::new(Utc::now(), TestMessage::robot(loud_pcm(50)), &mut stream).unwrap();

    let response = graph.process_intent_graph(request).await.unwrap();

    assert_eq!(response.intent, INTENT_UNMATCHED);
    assert_eq!(response.query_text, "purple monkey dishwasher");
}

#[tokio::test]
async fn test_transcription_mode_returns_text() {
    let engine = Arc::new(MockEngine::new("mock", "hello there"));
    let graph = graph(engine, IntentMode::Transcription);

    let mut stream = TestStream::default();
    let request =
        SessionRequest::new(Utc::now(), TestMessage::robot(loud_pcm(50)), &mut stream).unwrap();

    let response = graph.process_intent_graph(request).await.unwrap();

    assert_eq!(response.intent, INTENT_TRANSCRIPTION);
    assert_eq!(response.query_text, "hello there");
    assert_eq!(stream.sent.len(), 1);
}

#[tokio::test]
async fn test_engine_failure_writes_nothing() {
    let engine = Arc::new(MockEngine::failing_recognize("mock", || {
        EngineError::Unavailable("sidecar connection refused".to_string())
    }));
    let graph = graph(engine, IntentMode::IntentGraph);

    let mut stream = TestStream::default();
    let request =
        SessionRequest::new(Utc::now(), TestMessage::robot(loud_pcm(50)), &mut stream).unwrap();

    let err = graph.process_intent_graph(request).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::Unavailable);
    assert!(err.message.contains("sidecar connection refused"));
    assert!(stream.sent.is_empty());
}

#[tokio::test]
async fn test_from_settings_uses_configured_mode() {
    let mut settings = Settings::default();
    settings.intent.mode = IntentMode::Transcription;
    let engine = Arc::new(MockEngine::new("mock", "what time is it"));
    assert_eq!(engine.identifier(), "mock");
    let graph = RecognitionGraph::from_settings(engine, &settings);

    let mut stream = TestStream::default();
    let request =
        SessionRequest::new(Utc::now(), TestMessage::robot(loud_pcm(50)), &mut stream).unwrap();

    let response = graph.process_intent_graph(request).await.unwrap();
    assert_eq!(response.intent, INTENT_TRANSCRIPTION);
}

/// Echoes the session language after a language-dependent delay
struct LanguageEcho;

#[async_trait::async_trait]
impl SpeechEngine for LanguageEcho {
    fn identifier(&self) -> &'static str {
        "echo"
    }

    async fn initialize(&self, _config: &chipper_core::EngineConfig) -> Result<(), EngineError> {
        Ok(())
    }

    async fn recognize(
        &self,
        audio: &mut dyn chipper_core::AudioSource,
        ctx: &chipper_core::RecognitionContext,
    ) -> Result<chipper_core::Transcript, EngineError> {
        chipper_core::audio::collect_audio(audio, usize::MAX).await?;
        let delay = if ctx.language.as_str() == "en-US" { 40 } else { 5 };
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        Ok(chipper_core::Transcript::new(
            "echo",
            format!("heard {}", ctx.language),
            ctx.language.as_str(),
        ))
    }
}

#[tokio::test]
async fn test_concurrent_sessions_keep_their_language() {
    let graph = RecognitionGraph::new(
        Arc::new(LanguageEcho),
        Arc::new(PhraseMatcher::default()),
        IntentMode::Transcription,
        AudioLimits::default(),
    );

    let mut english_stream = TestStream::default();
    let mut english = TestMessage::robot(loud_pcm(20));
    english.session = "s-en".to_string();
    let english_request = SessionRequest::new(Utc::now(), english, &mut english_stream).unwrap();

    let mut german_stream = TestStream::default();
    let mut german = TestMessage::robot(loud_pcm(20));
    german.session = "s-de".to_string();
    german.language = "de-DE".to_string();
    let german_request = SessionRequest::new(Utc::now(), german, &mut german_stream).unwrap();

    let (english_response, german_response) = tokio::join!(
        graph.process_intent_graph(english_request),
        graph.process_intent_graph(german_request),
    );

    let english_response = english_response.unwrap();
    let german_response = german_response.unwrap();
    assert_eq!(english_response.session_id, "s-en");
    assert_eq!(english_response.query_text, "heard en-US");
    assert_eq!(german_response.session_id, "s-de");
    assert_eq!(german_response.query_text, "heard de-DE");
    assert_eq!(english_stream.sent, vec![english_response]);
    assert_eq!(german_stream.sent, vec![german_response]);
}
