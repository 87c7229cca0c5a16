//! Error types shared by engines, streams and the intent stage

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::audio::AudioCodec;

/// Protocol-neutral status code.
///
/// Mirrors the gRPC code set so stream and intent errors can cross the
/// protocol boundary without being reclassified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    FailedPrecondition,
    Aborted,
    ResourceExhausted,
    Unimplemented,
    Internal,
    Unavailable,
    Unauthenticated,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::Unknown => "unknown",
            ErrorCode::InvalidArgument => "invalid_argument",
            ErrorCode::DeadlineExceeded => "deadline_exceeded",
            ErrorCode::NotFound => "not_found",
            ErrorCode::FailedPrecondition => "failed_precondition",
            ErrorCode::Aborted => "aborted",
            ErrorCode::ResourceExhausted => "resource_exhausted",
            ErrorCode::Unimplemented => "unimplemented",
            ErrorCode::Internal => "internal",
            ErrorCode::Unavailable => "unavailable",
            ErrorCode::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reading from or writing to a session stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct StreamError {
    pub code: ErrorCode,
    pub message: String,
}

impl StreamError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The peer went away (client disconnect or dropped receiver)
    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, message)
    }
}

/// Speech engine errors
///
/// `Initialization` means the engine is unusable for the lifetime of the
/// process. Every other variant is scoped to a single recognition request.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine '{engine}' failed to initialize: {reason}")]
    Initialization { engine: &'static str, reason: String },

    #[error("engine '{0}' has not been initialized")]
    NotInitialized(&'static str),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("unsupported audio codec: {0}")]
    UnsupportedCodec(AudioCodec),

    #[error("audio stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("recognition timed out after {0:?}")]
    Timeout(Duration),

    #[error("recognition failed: {0}")]
    Recognition(String),
}

impl EngineError {
    pub fn initialization(engine: &'static str, reason: impl Into<String>) -> Self {
        EngineError::Initialization {
            engine,
            reason: reason.into(),
        }
    }

    /// True when the engine itself is unavailable, not just this request
    pub fn is_initialization(&self) -> bool {
        matches!(self, EngineError::Initialization { .. })
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Initialization { .. } | EngineError::NotInitialized(_) => {
                ErrorCode::FailedPrecondition
            },
            EngineError::UnsupportedLanguage(_) | EngineError::UnsupportedCodec(_) => {
                ErrorCode::InvalidArgument
            },
            EngineError::Stream(e) => e.code,
            EngineError::Unavailable(_) => ErrorCode::Unavailable,
            EngineError::Timeout(_) => ErrorCode::DeadlineExceeded,
            EngineError::Recognition(_) => ErrorCode::Internal,
        }
    }
}

/// Error returned by the intent-resolution stage.
///
/// Opaque to the dispatcher: code and message are forwarded to the client
/// as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct IntentGraphError {
    pub code: ErrorCode,
    pub message: String,
}

impl IntentGraphError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unavailable, message)
    }
}

impl From<EngineError> for IntentGraphError {
    fn from(err: EngineError) -> Self {
        let code = err.code();
        match err {
            // keep the transport's own wording for stream failures
            EngineError::Stream(stream) => Self::new(code, stream.message),
            other => Self::new(code, other.to_string()),
        }
    }
}

impl From<StreamError> for IntentGraphError {
    fn from(err: StreamError) -> Self {
        Self::new(err.code, err.message)
    }
}

/// Engine registration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("an engine with identifier '{0}' is already registered")]
    DuplicateIdentifier(&'static str),

    #[error("no engine registered with identifier '{0}'")]
    NotFound(String),

    #[error("engine '{0}' is unavailable (initialization failed)")]
    Unavailable(String),

    #[error("engine '{0}' has not been initialized")]
    NotInitialized(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialization_is_distinguishable() {
        let init = EngineError::initialization("vosk", "model missing");
        assert!(init.is_initialization());
        assert_eq!(init.code(), ErrorCode::FailedPrecondition);

        let req = EngineError::Recognition("decoder crashed".to_string());
        assert!(!req.is_initialization());
        assert_eq!(req.code(), ErrorCode::Internal);
    }

    #[test]
    fn test_stream_error_keeps_code_through_intent_error() {
        let stream = StreamError::new(ErrorCode::DeadlineExceeded, "deadline");
        let engine: EngineError = stream.into();
        let intent: IntentGraphError = engine.into();
        assert_eq!(intent.code, ErrorCode::DeadlineExceeded);
        assert_eq!(intent.message, "deadline");
    }

    #[test]
    fn test_unsupported_language_maps_to_invalid_argument() {
        let err: IntentGraphError = EngineError::UnsupportedLanguage("xx-XX".into()).into();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
        assert!(err.message.contains("xx-XX"));
    }
}
