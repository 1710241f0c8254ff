//! Voice I/O
//!
//! Microphone capture produces fixed-size PCM frames; assistant audio is
//! played from an ordered queue that can be flushed atomically on barge-in.

mod capture;
mod frame;
mod playback;

pub use capture::{AudioCapture, CaptureFrames, Framer, samples_to_wav};
pub use frame::{AudioFrame, FRAME_SAMPLES, SAMPLE_RATE, f32_to_i16, i16_to_f32, rms};
pub use playback::{AudioPlayback, FlushReport, PlaybackQueue, spawn_virtual_output};
