//! Core traits and types for chipper
//!
//! This crate provides the foundational types shared by the engine adapters
//! and the server:
//! - The `SpeechEngine` contract and its configuration
//! - Audio sources, codecs and PCM helpers
//! - Session requests built from the first message of a call
//! - The `IntentGraph` collaborator contract and its response type
//! - The engine registry
//! - Error types

pub mod audio;
pub mod error;
pub mod intent;
pub mod language;
pub mod registry;
pub mod session;
pub mod traits;
pub mod transcript;

pub use audio::{AudioCodec, AudioLimits, AudioSource, BufferedAudio, Endpointer};
pub use error::{EngineError, ErrorCode, IntentGraphError, RegistryError, StreamError};
pub use intent::{IntentResponse, INTENT_NO_AUDIO, INTENT_TRANSCRIPTION, INTENT_UNMATCHED};
pub use language::LanguageTag;
pub use registry::{EngineRegistry, EngineStatus};
pub use session::{
    MalformedFirstMessage, SessionAudioSource, SessionMessage, SessionRequest, SessionStream,
};
pub use traits::{EngineCell, EngineConfig, IntentGraph, RecognitionContext, SpeechEngine};
pub use transcript::Transcript;
