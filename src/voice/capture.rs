//! Audio capture from microphone

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::frame::{AudioFrame, FRAME_SAMPLES, SAMPLE_RATE, f32_to_i16};
use crate::{Error, Result};

/// Frames buffered between the device callback and the event loop (~5s)
const CAPTURE_QUEUE_FRAMES: usize = 100;

/// Lazy, effectively infinite sequence of captured frames
pub type CaptureFrames = ReceiverStream<AudioFrame>;

/// Cuts a continuous sample stream into fixed-size frames
///
/// Sequence numbers keep increasing across [`Framer::reset`], so a pause
/// shows up as a gap rather than a reordering.
#[derive(Debug)]
pub struct Framer {
    frame_samples: usize,
    pending: Vec<i16>,
    next_seq: u64,
}

impl Framer {
    /// Create a framer producing frames of `frame_samples` samples
    #[must_use]
    pub fn new(frame_samples: usize) -> Self {
        Self {
            frame_samples: frame_samples.max(1),
            pending: Vec::with_capacity(frame_samples),
            next_seq: 0,
        }
    }

    /// Push interleaved samples, downmixing `channels` to mono
    ///
    /// `emit` is called once for every completed frame, in capture order.
    #[allow(clippy::cast_precision_loss)]
    pub fn push(&mut self, data: &[f32], channels: usize, mut emit: impl FnMut(AudioFrame)) {
        let channels = channels.max(1);
        for chunk in data.chunks(channels) {
            let mixed = chunk.iter().sum::<f32>() / chunk.len() as f32;
            self.pending.push(f32_to_i16(mixed));

            if self.pending.len() == self.frame_samples {
                let samples = std::mem::replace(
                    &mut self.pending,
                    Vec::with_capacity(self.frame_samples),
                );
                emit(AudioFrame::captured(self.next_seq, samples));
                self.next_seq += 1;
            }
        }
    }

    /// Discard any partially filled frame
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Samples waiting for the current frame to fill
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Captures audio from the default input device
///
/// While paused, samples are dropped at the callback rather than buffered so
/// resuming never replays stale audio.
pub struct AudioCapture {
    config: StreamConfig,
    paused: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    faults: mpsc::UnboundedSender<Error>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// Device failures after start are reported on `faults`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Device` if no input device or suitable config exists
    pub fn new(faults: mpsc::UnboundedSender<Error>) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Device("no input device available".to_string()))?;

        let supports_rate = |c: &cpal::SupportedStreamConfigRange| {
            c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        };

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Device(e.to_string()))?
            .find(|c| c.channels() == 1 && supports_rate(c))
            .or_else(|| {
                // Fallback: any channel count, downmixed in the callback
                device
                    .supported_input_configs()
                    .ok()?
                    .find(|c| supports_rate(c))
            })
            .ok_or_else(|| Error::Device("no suitable input config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            config,
            paused: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
            faults,
            stream: None,
        })
    }

    /// Start capturing and return the frame sequence
    ///
    /// # Errors
    ///
    /// Returns `Error::Device` if already started or the stream cannot be built
    pub fn start(&mut self) -> Result<CaptureFrames> {
        if self.stream.is_some() {
            return Err(Error::Device("capture already started".to_string()));
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Device("no input device".to_string()))?;

        let (tx, rx) = mpsc::channel(CAPTURE_QUEUE_FRAMES);
        let paused = Arc::clone(&self.paused);
        let dropped = Arc::clone(&self.dropped);
        let faults = self.faults.clone();
        let channels = usize::from(self.config.channels);
        let mut framer = Framer::new(FRAME_SAMPLES);

        let stream = device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if paused.load(Ordering::Relaxed) {
                        framer.reset();
                        return;
                    }
                    framer.push(data, channels, |frame| {
                        // Never block the device thread
                        if tx.try_send(frame).is_err() {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    });
                },
                move |err| {
                    tracing::error!(error = %err, "audio capture error");
                    let _ = faults.send(Error::Device(format!("capture stream failed: {err}")));
                },
                None,
            )
            .map_err(|e| Error::Device(e.to_string()))?;

        stream.play().map_err(|e| Error::Device(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(ReceiverStream::new(rx))
    }

    /// Stop producing frames without releasing the device
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::Relaxed) {
            tracing::debug!("audio capture paused");
        }
    }

    /// Resume producing frames
    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::Relaxed) {
            tracing::debug!("audio capture resumed");
        }
    }

    /// Whether capture is currently paused
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Stop capturing and release the device
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!(
                dropped_frames = self.dropped_frames(),
                "audio capture stopped"
            );
        }
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Frames dropped because the event loop fell behind
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Convert PCM16 samples to WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::Device(format!("wav encode failed: {e}")))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Device(format!("wav encode failed: {e}")))?;
        }

        writer
            .finalize()
            .map_err(|e| Error::Device(format!("wav encode failed: {e}")))?;
    }

    Ok(cursor.into_inner())
}
