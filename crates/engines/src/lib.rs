//! Speech engine adapters
//!
//! - [`HoundifyEngine`]: cloud recognition, signed HTTPS requests
//! - [`LeopardEngine`]: local neural model behind an inference sidecar
//! - [`VoskEngine`]: offline Kaldi model behind an inference sidecar

pub mod houndify;
pub mod leopard;
pub mod sidecar;
pub mod vosk;
pub mod wav;

pub use houndify::{HoundifyEngine, HOUNDIFY_ID};
pub use leopard::{LeopardEngine, LEOPARD_ID};
pub use sidecar::{SidecarClient, SidecarTranscript};
pub use vosk::{VoskEngine, VOSK_ID};

use chipper_core::audio::DEFAULT_SAMPLE_RATE;
use chipper_core::{AudioCodec, EngineError, EngineRegistry, RecognitionContext, RegistryError};

/// Upper bound on audio collected for one recognition (60s of 16kHz PCM16)
pub(crate) const MAX_UTTERANCE_BYTES: usize = 60 * DEFAULT_SAMPLE_RATE as usize * 2;

/// Reject sessions whose codec or language the engine cannot handle
pub(crate) fn ensure_supported(
    ctx: &RecognitionContext,
    languages: &[String],
    codecs: &[AudioCodec],
) -> Result<(), EngineError> {
    if !codecs.contains(&ctx.codec) {
        return Err(EngineError::UnsupportedCodec(ctx.codec));
    }
    if !languages.is_empty() && !languages.iter().any(|l| ctx.language.matches(l)) {
        return Err(EngineError::UnsupportedLanguage(ctx.language.to_string()));
    }
    Ok(())
}

/// Language tag sent upstream: BCP-47 when known, otherwise as received
pub(crate) fn upstream_language(ctx: &RecognitionContext) -> &str {
    ctx.language.locale().unwrap_or_else(|| ctx.language.as_str())
}

/// Registry with every compiled-in engine registered (not yet initialized)
pub fn create_default_registry() -> Result<EngineRegistry, RegistryError> {
    let mut registry = EngineRegistry::new();
    registry.register(HoundifyEngine::new())?;
    registry.register(LeopardEngine::new())?;
    registry.register(VoskEngine::new())?;
    Ok(registry)
}
