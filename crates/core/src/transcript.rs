//! Recognition results

use serde::Serialize;

/// Final transcript produced by one `recognize` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    /// Recognized text, empty if nothing was heard
    pub text: String,
    /// Confidence (0.0 - 1.0), when the engine reports one
    pub confidence: Option<f32>,
    /// Language the engine recognized in
    pub language: String,
    /// Identifier of the engine that produced this transcript
    pub engine: &'static str,
    /// Audio duration processed, in milliseconds
    pub audio_ms: u64,
}

impl Transcript {
    pub fn new(engine: &'static str, text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
            language: language.into(),
            engine,
            audio_ms: 0,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    pub fn with_audio_ms(mut self, audio_ms: u64) -> Self {
        self.audio_ms = audio_ms;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
