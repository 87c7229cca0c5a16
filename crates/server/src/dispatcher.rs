//! Streaming Session Dispatcher
//!
//! Entry point of every recognition call. The dispatcher waits for the first
//! client message, turns it into a [`SessionRequest`] and hands the call to
//! the intent graph exactly once. After delegation it neither reads from nor
//! writes to the stream.

use chipper_core::{
    ErrorCode, IntentGraph, IntentGraphError, MalformedFirstMessage, SessionMessage,
    SessionRequest, SessionStream, StreamError,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::Instrument;

use crate::metrics;

/// Terminal error of one call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("failed to receive first message: {}", .0.message)]
    Receive(StreamError),

    #[error("stream closed before the first message")]
    StreamClosed,

    #[error("no first message within {0:?}")]
    FirstMessageTimeout(Duration),

    #[error("malformed first message: {0}")]
    Malformed(#[from] MalformedFirstMessage),

    /// Collaborator failure, forwarded verbatim
    #[error(transparent)]
    IntentGraph(#[from] IntentGraphError),

    #[error("call deadline exceeded")]
    DeadlineExceeded,
}

impl DispatchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DispatchError::Receive(e) => e.code,
            DispatchError::StreamClosed => ErrorCode::Cancelled,
            DispatchError::FirstMessageTimeout(_) | DispatchError::DeadlineExceeded => {
                ErrorCode::DeadlineExceeded
            },
            DispatchError::Malformed(_) => ErrorCode::InvalidArgument,
            DispatchError::IntentGraph(e) => e.code,
        }
    }

    /// Message reported to the client
    pub fn message(&self) -> String {
        match self {
            DispatchError::Receive(e) => e.message.clone(),
            DispatchError::IntentGraph(e) => e.message.clone(),
            other => other.to_string(),
        }
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Receive(_) => "receive",
            DispatchError::StreamClosed => "closed",
            DispatchError::FirstMessageTimeout(_) => "first_message_timeout",
            DispatchError::Malformed(_) => "malformed",
            DispatchError::IntentGraph(_) => "intent_graph",
            DispatchError::DeadlineExceeded => "deadline",
        }
    }

    /// Whether the failure happened before the intent graph was invoked
    pub fn before_delegation(&self) -> bool {
        !matches!(self, DispatchError::IntentGraph(_) | DispatchError::DeadlineExceeded)
    }
}

/// Routes each call's first message to the intent graph
pub struct SessionDispatcher<M: SessionMessage> {
    graph: Arc<dyn IntentGraph<M>>,
    engine: &'static str,
    first_message_timeout: Duration,
}

impl<M: SessionMessage> Clone for SessionDispatcher<M> {
    fn clone(&self) -> Self {
        Self {
            graph: Arc::clone(&self.graph),
            engine: self.engine,
            first_message_timeout: self.first_message_timeout,
        }
    }
}

impl<M: SessionMessage> SessionDispatcher<M> {
    pub fn new(
        graph: Arc<dyn IntentGraph<M>>,
        engine: &'static str,
        first_message_timeout: Duration,
    ) -> Self {
        Self {
            graph,
            engine,
            first_message_timeout,
        }
    }

    /// Handle one call.
    ///
    /// `call_deadline` is the time left on the call as announced by the
    /// client; it bounds the first receive (together with the configured
    /// first-message timeout) and the delegated remainder of the call.
    pub async fn handle_session(
        &self,
        stream: &mut dyn SessionStream<Message = M>,
        call_deadline: Option<Duration>,
    ) -> Result<(), DispatchError> {
        let started = Instant::now();
        metrics::record_session_started(self.engine);

        let result = self.dispatch(stream, started, call_deadline).await;

        let outcome = match &result {
            Ok(()) => "ok",
            Err(e) => {
                metrics::record_session_error(self.engine, e.kind());
                e.kind()
            },
        };
        metrics::record_session_finished(self.engine, started.elapsed(), outcome);
        result
    }

    async fn dispatch(
        &self,
        stream: &mut dyn SessionStream<Message = M>,
        started: Instant,
        call_deadline: Option<Duration>,
    ) -> Result<(), DispatchError> {
        let received_at = Utc::now();
        let first_wait = call_deadline.map_or(self.first_message_timeout, |d| {
            d.min(self.first_message_timeout)
        });

        let first = match tokio::time::timeout(first_wait, stream.recv()).await {
            Ok(Ok(Some(message))) => message,
            Ok(Ok(None)) => {
                tracing::warn!(engine = self.engine, "Stream closed before first message");
                return Err(DispatchError::StreamClosed);
            },
            Ok(Err(e)) => {
                tracing::warn!(
                    engine = self.engine,
                    code = %e.code,
                    error = %e.message,
                    "Failed to receive first message"
                );
                return Err(DispatchError::Receive(e));
            },
            Err(_) => {
                tracing::warn!(
                    engine = self.engine,
                    waited_ms = first_wait.as_millis() as u64,
                    "Timed out waiting for first message"
                );
                return Err(DispatchError::FirstMessageTimeout(first_wait));
            },
        };

        let request = SessionRequest::new(received_at, first, stream).map_err(|e| {
            tracing::warn!(engine = self.engine, error = %e, "Rejected first message");
            DispatchError::Malformed(e)
        })?;

        let span = tracing::info_span!(
            "session",
            engine = self.engine,
            device_id = %request.device_id(),
            session_id = %request.session_id(),
        );
        tracing::info!(
            parent: &span,
            language = %request.language(),
            codec = %request.codec(),
            "Session started"
        );

        let graph = self.graph.process_intent_graph(request);
        let outcome = match call_deadline {
            Some(deadline) => tokio::time::timeout_at(started + deadline, graph)
                .instrument(span.clone())
                .await
                .map_err(|_| {
                    tracing::warn!(parent: &span, "Call deadline exceeded in intent graph");
                    DispatchError::DeadlineExceeded
                })?,
            None => graph.instrument(span.clone()).await,
        };

        match outcome {
            Ok(response) => {
                tracing::info!(
                    parent: &span,
                    intent = %response.intent,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Session complete"
                );
                Ok(())
            },
            Err(e) => {
                tracing::error!(
                    parent: &span,
                    code = %e.code,
                    error = %e.message,
                    "Intent graph failed"
                );
                Err(DispatchError::IntentGraph(e))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_graph_error_is_forwarded_verbatim() {
        let err = DispatchError::from(IntentGraphError::unavailable("engine unavailable"));
        assert_eq!(err.code(), ErrorCode::Unavailable);
        assert_eq!(err.message(), "engine unavailable");
        assert!(!err.before_delegation());
    }

    #[test]
    fn test_receive_errors_keep_their_code() {
        let err = DispatchError::Receive(StreamError::new(ErrorCode::Cancelled, "peer reset"));
        assert_eq!(err.code(), ErrorCode::Cancelled);
        assert_eq!(err.message(), "peer reset");
        assert!(err.before_delegation());

        assert_eq!(DispatchError::StreamClosed.code(), ErrorCode::Cancelled);
        assert_eq!(
            DispatchError::FirstMessageTimeout(Duration::from_secs(1)).code(),
            ErrorCode::DeadlineExceeded
        );
        assert_eq!(
            DispatchError::from(MalformedFirstMessage::EmptyDeviceId).code(),
            ErrorCode::InvalidArgument
        );
    }
}
