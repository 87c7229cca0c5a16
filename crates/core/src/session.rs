//! Session request model
//!
//! A [`SessionRequest`] describes one inbound audio-recognition call. It is
//! built by the dispatcher once the first message of the call has arrived and
//! carries a mutable borrow of the live stream, so the intent stage can keep
//! reading audio and writing responses on the same call.
//!
//! The borrow ties the request to the call: once the call handler returns,
//! the stream is gone and so is every request that pointed at it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::audio::{AudioCodec, AudioLimits, AudioSource, Endpointer};
use crate::error::{EngineError, StreamError};
use crate::intent::IntentResponse;
use crate::language::LanguageTag;
use crate::traits::RecognitionContext;

/// Fields every protocol message must expose to the session layer
pub trait SessionMessage: Send + Sync + 'static {
    fn device_id(&self) -> &str;
    fn session_id(&self) -> &str;
    fn language_tag(&self) -> LanguageTag;
    fn audio_codec(&self) -> AudioCodec;
    /// Audio payload carried by this message (may be empty)
    fn audio(&self) -> &[u8];
}

/// Bidirectional stream of one call, as seen by the session layer
#[async_trait]
pub trait SessionStream: Send {
    type Message: SessionMessage;

    /// Next client message. `Ok(None)` means the client half-closed.
    async fn recv(&mut self) -> Result<Option<Self::Message>, StreamError>;

    /// Write one response message to the client
    async fn send(&mut self, response: IntentResponse) -> Result<(), StreamError>;
}

/// First message rejected before a session request could be built
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedFirstMessage {
    #[error("first message has an empty device identifier")]
    EmptyDeviceId,

    #[error("first message has an empty session identifier")]
    EmptySessionId,
}

/// One client audio session, valid for the duration of the call
pub struct SessionRequest<'call, M> {
    received_at: DateTime<Utc>,
    device_id: String,
    session_id: String,
    language: LanguageTag,
    codec: AudioCodec,
    first_message: M,
    stream: &'call mut (dyn SessionStream<Message = M> + 'call),
}

impl<'call, M: SessionMessage> SessionRequest<'call, M> {
    /// Build a request from an already-received first message.
    ///
    /// Language and codec are copied as-is; only the identifiers are checked.
    pub fn new(
        received_at: DateTime<Utc>,
        first_message: M,
        stream: &'call mut (dyn SessionStream<Message = M> + 'call),
    ) -> Result<Self, MalformedFirstMessage> {
        if first_message.device_id().trim().is_empty() {
            return Err(MalformedFirstMessage::EmptyDeviceId);
        }
        if first_message.session_id().trim().is_empty() {
            return Err(MalformedFirstMessage::EmptySessionId);
        }

        Ok(Self {
            received_at,
            device_id: first_message.device_id().to_string(),
            session_id: first_message.session_id().to_string(),
            language: first_message.language_tag(),
            codec: first_message.audio_codec(),
            first_message,
            stream,
        })
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn language(&self) -> &LanguageTag {
        &self.language
    }

    pub fn codec(&self) -> AudioCodec {
        self.codec
    }

    /// The raw first message, for fields not lifted into this model
    pub fn first_message(&self) -> &M {
        &self.first_message
    }

    /// The live call stream
    pub fn stream(&mut self) -> &mut (dyn SessionStream<Message = M> + 'call) {
        &mut *self.stream
    }

    /// Context handed to the engine for this session
    pub fn recognition_context(&self) -> RecognitionContext {
        RecognitionContext {
            session_id: self.session_id.clone(),
            device_id: self.device_id.clone(),
            language: self.language.clone(),
            codec: self.codec,
        }
    }

    /// Audio of this session: first-message payload, then streamed chunks
    pub fn audio_source(&mut self, limits: AudioLimits) -> SessionAudioSource<'_, M> {
        let first = self.first_message.audio().to_vec();
        let codec = self.codec;
        SessionAudioSource::new(first, &mut *self.stream, codec, limits)
    }

    /// Write a response for this session on the call
    pub async fn respond(&mut self, response: IntentResponse) -> Result<(), StreamError> {
        self.stream.send(response).await
    }
}

impl<M> std::fmt::Debug for SessionRequest<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRequest")
            .field("received_at", &self.received_at)
            .field("device_id", &self.device_id)
            .field("session_id", &self.session_id)
            .field("language", &self.language)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

/// [`AudioSource`] that reads audio chunks from a live session stream
///
/// Ends when the client half-closes, when `max_audio` has been read, or (for
/// PCM16) when the endpointer hears trailing silence after speech.
pub struct SessionAudioSource<'s, M> {
    pending: Option<Vec<u8>>,
    stream: &'s mut (dyn SessionStream<Message = M> + 's),
    endpointer: Option<Endpointer>,
    max_bytes: usize,
    received: usize,
    finished: bool,
}

impl<'s, M: SessionMessage> SessionAudioSource<'s, M> {
    pub fn new(
        first_chunk: Vec<u8>,
        stream: &'s mut (dyn SessionStream<Message = M> + 's),
        codec: AudioCodec,
        limits: AudioLimits,
    ) -> Self {
        let endpointer = match codec {
            AudioCodec::Pcm16 => Some(Endpointer::new(limits)),
            _ => None,
        };
        Self {
            pending: Some(first_chunk),
            stream,
            endpointer,
            max_bytes: limits.max_bytes(),
            received: 0,
            finished: false,
        }
    }

    /// Bytes handed out so far
    pub fn received_bytes(&self) -> usize {
        self.received
    }
}

#[async_trait]
impl<'s, M: SessionMessage> AudioSource for SessionAudioSource<'s, M> {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, EngineError> {
        loop {
            if self.finished {
                return Ok(None);
            }

            let mut chunk = match self.pending.take() {
                Some(first) => first,
                None => match self.stream.recv().await? {
                    Some(message) => message.audio().to_vec(),
                    None => {
                        self.finished = true;
                        return Ok(None);
                    },
                },
            };
            if chunk.is_empty() {
                continue;
            }

            let remaining = self.max_bytes.saturating_sub(self.received);
            if chunk.len() >= remaining {
                chunk.truncate(remaining);
                self.finished = true;
            }
            if let Some(endpointer) = self.endpointer.as_mut() {
                if endpointer.push(&chunk) {
                    self.finished = true;
                }
            }
            if chunk.is_empty() {
                return Ok(None);
            }

            self.received += chunk.len();
            return Ok(Some(chunk));
        }
    }
}
