//! Audio codec types, audio sources and PCM utilities

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use crate::error::EngineError;

/// Sample rate of audio sent by robots (16kHz mono)
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Codec of the audio payload carried on a session stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioCodec {
    /// 16-bit signed PCM, little-endian, mono
    Pcm16,
    /// Opus frames in an Ogg container
    OggOpus,
    /// A codec value this build does not know about.
    ///
    /// Kept instead of rejected so the intent stage can decide what to do.
    Unknown(i32),
}

impl AudioCodec {
    /// MIME type used when forwarding the payload to an HTTP upstream
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioCodec::Pcm16 => "audio/pcm",
            AudioCodec::OggOpus => "audio/ogg",
            AudioCodec::Unknown(_) => "application/octet-stream",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, AudioCodec::Unknown(_))
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioCodec::Pcm16 => f.write_str("PCM16"),
            AudioCodec::OggOpus => f.write_str("OGG_OPUS"),
            AudioCodec::Unknown(v) => write!(f, "UNKNOWN({})", v),
        }
    }
}

/// Pull-based source of audio chunks for one recognition
///
/// Returns `Ok(None)` once the utterance is complete.
#[async_trait]
pub trait AudioSource: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, EngineError>;
}

/// In-memory audio source
#[derive(Debug, Default, Clone)]
pub struct BufferedAudio {
    chunks: VecDeque<Vec<u8>>,
}

impl BufferedAudio {
    pub fn new(chunks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into_iter().collect(),
        }
    }

    pub fn single(bytes: Vec<u8>) -> Self {
        Self::new([bytes])
    }
}

#[async_trait]
impl AudioSource for BufferedAudio {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, EngineError> {
        Ok(self.chunks.pop_front())
    }
}

/// Drain a source into one contiguous buffer, stopping at `max_bytes`
pub async fn collect_audio(
    source: &mut dyn AudioSource,
    max_bytes: usize,
) -> Result<Vec<u8>, EngineError> {
    let mut audio = Vec::new();
    while let Some(chunk) = source.next_chunk().await? {
        audio.extend_from_slice(&chunk);
        if audio.len() >= max_bytes {
            audio.truncate(max_bytes);
            break;
        }
    }
    Ok(audio)
}

/// Decode little-endian PCM16 bytes to samples. A trailing odd byte is dropped.
pub fn pcm16_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// RMS energy of a PCM16 chunk in dBFS
pub fn pcm16_energy_db(bytes: &[u8]) -> f32 {
    const PCM16_NORMALIZE: f32 = 32768.0;

    let samples = pcm16_samples(bytes);
    if samples.is_empty() {
        return -96.0;
    }

    let sum_squares: f32 = samples
        .iter()
        .map(|&s| {
            let v = s as f32 / PCM16_NORMALIZE;
            v * v
        })
        .sum();
    let rms = (sum_squares / samples.len() as f32).sqrt();

    if rms > 0.0 {
        20.0 * rms.log10()
    } else {
        -96.0
    }
}

/// Playback duration of a PCM16 mono buffer
pub fn pcm16_duration(byte_len: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let samples = (byte_len / 2) as u64;
    Duration::from_micros(samples * 1_000_000 / sample_rate as u64)
}

/// Byte length of `duration` worth of PCM16 mono audio
pub fn pcm16_bytes_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_millis() as usize * sample_rate as usize / 1000) * 2
}

/// Limits applied while pulling audio from a live session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioLimits {
    /// Hard cap on utterance length
    pub max_audio: Duration,
    /// Trailing silence that ends an utterance once speech was heard
    pub endpoint_silence: Duration,
    /// Chunks quieter than this count as silence
    pub energy_floor_db: f32,
    pub sample_rate: u32,
}

impl Default for AudioLimits {
    fn default() -> Self {
        Self {
            max_audio: Duration::from_secs(10),
            endpoint_silence: Duration::from_millis(800),
            energy_floor_db: -45.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl AudioLimits {
    pub fn max_bytes(&self) -> usize {
        pcm16_bytes_for(self.max_audio, self.sample_rate)
    }
}

/// Energy-based end-of-speech detector for PCM16 streams
#[derive(Debug, Clone)]
pub struct Endpointer {
    limits: AudioLimits,
    heard_speech: bool,
    trailing_silence: Duration,
}

impl Endpointer {
    pub fn new(limits: AudioLimits) -> Self {
        Self {
            limits,
            heard_speech: false,
            trailing_silence: Duration::ZERO,
        }
    }

    /// Feed one chunk; returns true once the utterance has ended
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        let duration = pcm16_duration(chunk.len(), self.limits.sample_rate);
        if pcm16_energy_db(chunk) >= self.limits.energy_floor_db {
            self.heard_speech = true;
            self.trailing_silence = Duration::ZERO;
        } else if self.heard_speech {
            self.trailing_silence += duration;
        }
        self.heard_speech && self.trailing_silence >= self.limits.endpoint_silence
    }

    pub fn heard_speech(&self) -> bool {
        self.heard_speech
    }
}
