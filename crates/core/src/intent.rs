//! Intent-stage response types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fallback intent when nothing was heard
pub const INTENT_NO_AUDIO: &str = "intent_system_noaudio";
/// Fallback intent when the transcript matched nothing
pub const INTENT_UNMATCHED: &str = "intent_system_unmatched";
/// Intent used when the stage runs in transcription mode
pub const INTENT_TRANSCRIPTION: &str = "intent_transcription";

/// Response message written back to the client
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntentResponse {
    pub session_id: String,
    pub device_id: String,
    /// Resolved intent (action) name
    pub intent: String,
    /// What the engine heard
    pub query_text: String,
    /// Extracted intent parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    pub is_final: bool,
}

impl IntentResponse {
    pub fn new(
        session_id: impl Into<String>,
        device_id: impl Into<String>,
        intent: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            device_id: device_id.into(),
            intent: intent.into(),
            query_text: String::new(),
            parameters: BTreeMap::new(),
            is_final: true,
        }
    }

    pub fn with_query_text(mut self, text: impl Into<String>) -> Self {
        self.query_text = text.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}
