//! Default intent graph: recognize, resolve, respond

use async_trait::async_trait;
use chipper_config::{IntentMode, Settings};
use chipper_core::{
    AudioLimits, IntentGraph, IntentGraphError, IntentResponse, SessionMessage, SessionRequest,
    SpeechEngine, Transcript, INTENT_NO_AUDIO, INTENT_TRANSCRIPTION, INTENT_UNMATCHED,
};
use std::sync::Arc;
use std::time::Instant;

use crate::matcher::{IntentMatcher, PhraseMatcher};
use crate::metrics;

/// Runs one engine over the session audio and writes a single final response
pub struct RecognitionGraph {
    engine: Arc<dyn SpeechEngine>,
    matcher: Arc<dyn IntentMatcher>,
    mode: IntentMode,
    limits: AudioLimits,
}

impl RecognitionGraph {
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        matcher: Arc<dyn IntentMatcher>,
        mode: IntentMode,
        limits: AudioLimits,
    ) -> Self {
        Self {
            engine,
            matcher,
            mode,
            limits,
        }
    }

    /// Graph for `engine` with the configured phrase table and limits
    pub fn from_settings(engine: Arc<dyn SpeechEngine>, settings: &Settings) -> Self {
        let sample_rate = settings.engine_config(engine.identifier()).sample_rate;
        Self::new(
            engine,
            Arc::new(PhraseMatcher::new(&settings.intent.phrases)),
            settings.intent.mode,
            settings.intent.audio_limits(sample_rate),
        )
    }

    fn resolve<M: SessionMessage>(
        &self,
        request: &SessionRequest<'_, M>,
        transcript: &Transcript,
    ) -> IntentResponse {
        let base = |intent: &str| {
            IntentResponse::new(request.session_id(), request.device_id(), intent)
                .with_query_text(transcript.text.clone())
        };

        if transcript.is_empty() {
            return base(INTENT_NO_AUDIO);
        }

        match self.mode {
            IntentMode::Transcription => base(INTENT_TRANSCRIPTION),
            IntentMode::IntentGraph => {
                match self.matcher.match_intent(&transcript.text, request.language()) {
                    Some(matched) => {
                        let mut response = base(&matched.intent);
                        response.parameters = matched.parameters;
                        response
                    },
                    None => base(INTENT_UNMATCHED),
                }
            },
        }
    }
}

#[async_trait]
impl<M: SessionMessage> IntentGraph<M> for RecognitionGraph {
    async fn process_intent_graph(
        &self,
        mut request: SessionRequest<'_, M>,
    ) -> Result<IntentResponse, IntentGraphError> {
        let engine_id = self.engine.identifier();
        let ctx = request.recognition_context();

        let started = Instant::now();
        let recognized = {
            let mut audio = request.audio_source(self.limits);
            let result = self.engine.recognize(&mut audio, &ctx).await;
            tracing::debug!(
                engine = engine_id,
                bytes = audio.received_bytes(),
                "Audio collected"
            );
            result
        };
        metrics::record_recognition(engine_id, started.elapsed(), recognized.is_ok());

        let transcript = recognized.map_err(|e| {
            tracing::warn!(engine = engine_id, error = %e, "Recognition failed");
            IntentGraphError::from(e)
        })?;
        tracing::info!(
            engine = engine_id,
            transcript = %transcript.text,
            confidence = ?transcript.confidence,
            "Recognized utterance"
        );

        let response = self.resolve(&request, &transcript);
        metrics::record_intent(
            engine_id,
            matches!(response.intent.as_str(), INTENT_NO_AUDIO | INTENT_UNMATCHED),
        );

        request.respond(response.clone()).await?;
        Ok(response)
    }
}
