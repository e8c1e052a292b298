use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::ai::AiError;
use crate::audio::AudioBuffer;

/// Sample rate of the narration the speech model returns.
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, AiError> {
    Ok(STANDARD.decode(encoded.trim())?)
}

/// Interpret `bytes` as interleaved signed 16-bit little-endian PCM.
/// A trailing odd byte is dropped.
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<AudioBuffer, AiError> {
    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();
    if samples.is_empty() {
        return Err(AiError::EmptyAudio);
    }
    Ok(AudioBuffer {
        samples,
        sample_rate,
        channels: channels.max(1),
    })
}

/// Both decoding steps for a speech payload.
pub fn decode_speech(encoded: &str, sample_rate: u32) -> Result<AudioBuffer, AiError> {
    let bytes = decode_base64(encoded)?;
    decode_pcm16(&bytes, sample_rate, 1)
}
