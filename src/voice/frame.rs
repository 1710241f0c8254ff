//! PCM frames exchanged between the devices and the session

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;

use crate::{Error, Result};

/// Sample rate used on the wire and on both devices (24kHz mono PCM16)
pub const SAMPLE_RATE: u32 = 24_000;

/// Samples per captured frame (50ms at 24kHz)
pub const FRAME_SAMPLES: usize = 1200;

/// An immutable slice of mono PCM16 audio
///
/// Outbound frames carry a capture sequence number; inbound frames carry
/// their sample offset within the response they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    seq: u64,
    position: u64,
    samples: Arc<[i16]>,
}

impl AudioFrame {
    /// Create a frame produced by the microphone
    #[must_use]
    pub fn captured(seq: u64, samples: Vec<i16>) -> Self {
        Self {
            seq,
            position: 0,
            samples: samples.into(),
        }
    }

    /// Create a frame received from the remote service
    #[must_use]
    pub fn inbound(position: u64, samples: Vec<i16>) -> Self {
        Self {
            seq: 0,
            position,
            samples: samples.into(),
        }
    }

    /// Decode a base64 PCM16 little-endian payload
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the payload is not valid base64 or has an
    /// odd number of bytes
    pub fn from_base64(payload: &str, position: u64) -> Result<Self> {
        let bytes = B64
            .decode(payload)
            .map_err(|e| Error::Protocol(format!("invalid audio payload: {e}")))?;

        if bytes.len() % 2 != 0 {
            return Err(Error::Protocol(format!(
                "audio payload has odd length {}",
                bytes.len()
            )));
        }

        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(Self::inbound(position, samples))
    }

    /// Encode as base64 PCM16 little-endian
    #[must_use]
    pub fn to_base64(&self) -> String {
        let bytes: Vec<u8> = self.samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        B64.encode(bytes)
    }

    /// Capture sequence number
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Sample offset within the owning response
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// The PCM samples
    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the frame holds no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// RMS level normalized to `[0, 1]`
    #[must_use]
    pub fn level(&self) -> f32 {
        rms(&self.samples)
    }
}

/// Convert an f32 sample in `[-1.0, 1.0]` to i16
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Convert an i16 sample to f32 in `[-1.0, 1.0]`
#[must_use]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

/// RMS level of PCM16 samples, normalized to `[0, 1]`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples
        .iter()
        .map(|&s| {
            let v = i16_to_f32(s);
            v * v
        })
        .sum();
    (sum_squares / samples.len() as f32).sqrt().min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian_pcm() {
        // 1, -2 as little-endian i16
        let payload = B64.encode([0x01, 0x00, 0xFE, 0xFF]);
        let frame = AudioFrame::from_base64(&payload, 480).unwrap();

        assert_eq!(frame.samples(), &[1, -2]);
        assert_eq!(frame.position(), 480);
    }

    #[test]
    fn rejects_odd_length_payload() {
        let payload = B64.encode([0x01, 0x00, 0xFE]);
        assert!(matches!(
            AudioFrame::from_base64(&payload, 0),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(AudioFrame::from_base64("not base64!!", 0).is_err());
    }

    #[test]
    fn encodes_what_the_server_expects() {
        let frame = AudioFrame::captured(7, vec![1, -2]);
        assert_eq!(frame.to_base64(), B64.encode([0x01, 0x00, 0xFE, 0xFF]));
        assert_eq!(frame.seq(), 7);
    }

    #[test]
    fn level_of_silence_is_zero() {
        assert!(rms(&[0; 64]).abs() < f32::EPSILON);
        assert!(rms(&[]).abs() < f32::EPSILON);
    }

    #[test]
    fn level_of_full_scale_square_wave_is_near_one() {
        let samples: Vec<i16> = (0..64).map(|i| if i % 2 == 0 { i16::MAX } else { i16::MIN }).collect();
        assert!(rms(&samples) > 0.99);
    }

    #[test]
    fn f32_conversion_clamps() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), i16::MIN);
        assert_eq!(f32_to_i16(0.0), 0);
    }
}
