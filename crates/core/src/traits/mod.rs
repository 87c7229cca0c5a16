//! Core traits
//!
//! ```text
//! Speech:
//!   - SpeechEngine: Identifier / Initialize / Recognize contract
//!
//! Sessions:
//!   - IntentGraph: collaborator that receives a SessionRequest and drives
//!     the rest of the call
//! ```

mod intent;
mod speech;

pub use intent::IntentGraph;
pub use speech::{EngineCell, EngineConfig, RecognitionContext, SpeechEngine};
