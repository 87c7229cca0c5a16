//! Intent-resolution collaborator

use async_trait::async_trait;

use crate::error::IntentGraphError;
use crate::intent::IntentResponse;
use crate::session::{SessionMessage, SessionRequest};

/// Downstream stage that owns a session once the dispatcher hands it over.
///
/// Implementations read the remaining audio from the request's stream, run
/// recognition, resolve the intent and write responses on the same stream.
/// The returned response is the one that was sent, for logging and metrics.
#[async_trait]
pub trait IntentGraph<M: SessionMessage>: Send + Sync {
    async fn process_intent_graph(
        &self,
        request: SessionRequest<'_, M>,
    ) -> Result<IntentResponse, IntentGraphError>;
}
