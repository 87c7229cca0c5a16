//! PCM16 to WAV framing for upstreams that want a container

use chipper_core::EngineError;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

/// Wrap mono little-endian PCM16 in a WAV container
pub fn pcm16_to_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>, EngineError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| EngineError::Recognition(format!("Failed to create WAV writer: {}", e)))?;
        for sample in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([sample[0], sample[1]]))
                .map_err(|e| EngineError::Recognition(format!("Failed to write sample: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| EngineError::Recognition(format!("Failed to finalize WAV: {}", e)))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_header_and_samples() {
        let pcm: Vec<u8> = [100i16, -100, 32767]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let wav = pcm16_to_wav(&pcm, 16_000).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![100, -100, 32767]);
    }

    #[test]
    fn test_odd_trailing_byte_is_dropped() {
        let wav = pcm16_to_wav(&[1, 0, 7], 8_000).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.len(), 1);
    }
}
