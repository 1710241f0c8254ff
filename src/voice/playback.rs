//! Audio playback to speakers

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::frame::{AudioFrame, SAMPLE_RATE, i16_to_f32};
use crate::{Error, Result};

/// How long the sink still counts as active after the last audible sample
const ACTIVE_HOLD: Duration = Duration::from_millis(250);

/// Default cap on buffered audio (60s)
const DEFAULT_MAX_BUFFERED_SAMPLES: usize = SAMPLE_RATE as usize * 60;

/// Tick of the headless output clock
const VIRTUAL_TICK: Duration = Duration::from_millis(20);

/// Outcome of [`PlaybackQueue::flush`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    /// Frames discarded before they were played
    pub discarded_frames: usize,
    /// Offset playback had reached within the newest audio item
    ///
    /// Zero when the newest item is still waiting in the queue.
    pub played_samples: u64,
}

impl FlushReport {
    /// Played position in milliseconds
    #[must_use]
    pub const fn played_ms(&self) -> u64 {
        self.played_samples * 1000 / SAMPLE_RATE as u64
    }
}

#[derive(Debug, Default)]
struct QueueState {
    frames: VecDeque<AudioFrame>,
    /// Read offset into the front frame
    cursor: usize,
    buffered_samples: usize,
    played_position: u64,
    last_audible: Option<Instant>,
    level: f32,
    overflowed: u64,
}

/// Ordered queue of assistant audio shared with the output device
///
/// Producers call [`enqueue`](Self::enqueue), which never blocks on the
/// device. The device thread drains it through [`fill`](Self::fill).
/// [`flush`](Self::flush) takes the same lock as `fill`, so once it returns
/// no discarded sample can reach the speaker.
#[derive(Debug, Clone)]
pub struct PlaybackQueue {
    state: Arc<Mutex<QueueState>>,
    max_buffered_samples: usize,
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackQueue {
    /// Create an empty queue holding at most 60s of audio
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_buffered(DEFAULT_MAX_BUFFERED_SAMPLES)
    }

    /// Create an empty queue holding at most `max_samples` samples
    #[must_use]
    pub fn with_max_buffered(max_samples: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            max_buffered_samples: max_samples.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a frame to the end of the queue
    ///
    /// When the buffer cap is exceeded the oldest frames are dropped.
    pub fn enqueue(&self, frame: AudioFrame) {
        if frame.is_empty() {
            return;
        }
        let mut state = self.lock();
        state.buffered_samples += frame.len();
        state.frames.push_back(frame);

        while state.buffered_samples > self.max_buffered_samples && state.frames.len() > 1 {
            if let Some(old) = state.frames.pop_front() {
                state.buffered_samples -= old.len() - state.cursor;
                state.cursor = 0;
                state.overflowed += 1;
                tracing::warn!(
                    overflowed = state.overflowed,
                    "playback buffer full, dropping oldest frame"
                );
            }
        }
    }

    /// Discard every queued frame that has not been played yet
    ///
    /// Items start at position 0, so a queued frame at position 0 that has
    /// not begun playing means nothing of the newest item was heard.
    pub fn flush(&self) -> FlushReport {
        let mut state = self.lock();
        let newest_unstarted = state
            .frames
            .iter()
            .rposition(|f| f.position() == 0)
            .is_some_and(|i| i > 0 || state.cursor == 0);
        let report = FlushReport {
            discarded_frames: state.frames.len(),
            played_samples: if newest_unstarted {
                0
            } else {
                state.played_position
            },
        };
        state.frames.clear();
        state.cursor = 0;
        state.buffered_samples = 0;
        state.played_position = 0;
        drop(state);

        if report.discarded_frames > 0 {
            tracing::debug!(
                discarded = report.discarded_frames,
                played_ms = report.played_ms(),
                "playback flushed"
            );
        }
        report
    }

    /// Write the next samples into an interleaved output buffer
    ///
    /// Every channel receives the same mono sample. Missing samples are
    /// written as silence. Returns the number of queued samples consumed.
    #[allow(clippy::cast_precision_loss)]
    pub fn fill(&self, out: &mut [f32], channels: usize) -> usize {
        let channels = channels.max(1);
        let mut state = self.lock();
        let mut consumed = 0usize;
        let mut sum_squares = 0.0f32;
        let mut audible = false;

        for slot in out.chunks_mut(channels) {
            let sample = next_sample(&mut state);
            let value = sample.map_or(0.0, i16_to_f32);
            if sample.is_some() {
                consumed += 1;
                sum_squares += value * value;
                audible |= value != 0.0;
            }
            for out in slot.iter_mut() {
                *out = value;
            }
        }

        if consumed > 0 {
            state.level = (sum_squares / consumed as f32).sqrt().min(1.0);
        } else {
            state.level = 0.0;
        }
        if audible {
            state.last_audible = Some(Instant::now());
        }
        consumed
    }

    /// Whether audio is queued or was audible within the last 250ms
    #[must_use]
    pub fn is_active(&self) -> bool {
        let state = self.lock();
        !state.frames.is_empty()
            || state
                .last_audible
                .is_some_and(|at| at.elapsed() < ACTIVE_HOLD)
    }

    /// Frames waiting to be played
    #[must_use]
    pub fn queued_frames(&self) -> usize {
        self.lock().frames.len()
    }

    /// Samples waiting to be played
    #[must_use]
    pub fn queued_samples(&self) -> usize {
        self.lock().buffered_samples
    }

    /// RMS level of the most recently played block
    #[must_use]
    pub fn level(&self) -> f32 {
        self.lock().level
    }
}

fn next_sample(state: &mut QueueState) -> Option<i16> {
    loop {
        let cursor = state.cursor;
        let front = state.frames.front()?;
        if let Some(&sample) = front.samples().get(cursor) {
            state.played_position = front.position() + cursor as u64 + 1;
            state.cursor += 1;
            state.buffered_samples -= 1;
            if state.cursor == front.len() {
                state.frames.pop_front();
                state.cursor = 0;
            }
            return Some(sample);
        }
        // Exhausted frame left behind by an earlier cursor reset
        state.frames.pop_front();
        state.cursor = 0;
    }
}

/// Plays a [`PlaybackQueue`] on the default output device
pub struct AudioPlayback {
    config: StreamConfig,
    faults: mpsc::UnboundedSender<Error>,
    stream: Option<Stream>,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// Device failures after start are reported on `faults`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Device` if no output device or suitable config exists
    pub fn new(faults: mpsc::UnboundedSender<Error>) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Device("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Device(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Device("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self {
            config,
            faults,
            stream: None,
        })
    }

    /// Start draining `queue` to the speaker
    ///
    /// # Errors
    ///
    /// Returns `Error::Device` if the output stream cannot be built
    pub fn start(&mut self, queue: PlaybackQueue) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Device("no output device".to_string()))?;

        let channels = usize::from(self.config.channels);
        let faults = self.faults.clone();

        let stream = device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    queue.fill(data, channels);
                },
                move |err| {
                    tracing::error!(error = %err, "audio playback error");
                    let _ = faults.send(Error::Device(format!("playback stream failed: {err}")));
                },
                None,
            )
            .map_err(|e| Error::Device(e.to_string()))?;

        stream.play().map_err(|e| Error::Device(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio playback started");
        Ok(())
    }

    /// Stop playback and release the device
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("audio playback stopped");
        }
    }
}

impl Drop for AudioPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drain `queue` in real time without an output device
///
/// Keeps the queue moving (and `is_active` meaningful) in headless mode.
#[must_use]
pub fn spawn_virtual_output(queue: PlaybackQueue) -> JoinHandle<()> {
    tokio::spawn(async move {
        let samples_per_tick = (SAMPLE_RATE as usize * 20) / 1000;
        let mut buffer = vec![0.0f32; samples_per_tick];
        let mut interval = tokio::time::interval(VIRTUAL_TICK);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            queue.fill(&mut buffer, 1);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(position: u64, len: usize) -> AudioFrame {
        AudioFrame::inbound(position, vec![1000; len])
    }

    #[test]
    fn plays_frames_in_arrival_order() {
        let queue = PlaybackQueue::new();
        queue.enqueue(AudioFrame::inbound(0, vec![1, 2]));
        queue.enqueue(AudioFrame::inbound(2, vec![3]));

        let mut out = [0.0f32; 4];
        assert_eq!(queue.fill(&mut out, 1), 3);

        assert_eq!(out[0], i16_to_f32(1));
        assert_eq!(out[1], i16_to_f32(2));
        assert_eq!(out[2], i16_to_f32(3));
        assert_eq!(out[3], 0.0);
        assert_eq!(queue.queued_frames(), 0);
    }

    #[test]
    fn duplicates_mono_across_channels() {
        let queue = PlaybackQueue::new();
        queue.enqueue(AudioFrame::inbound(0, vec![500]));

        let mut out = [0.0f32; 2];
        queue.fill(&mut out, 2);
        assert_eq!(out[0], out[1]);
        assert!(out[0] > 0.0);
    }

    #[test]
    fn flush_discards_everything_unplayed() {
        let queue = PlaybackQueue::new();
        for i in 0..5 {
            queue.enqueue(tone(i * 100, 100));
        }
        assert_eq!(queue.queued_frames(), 5);

        let report = queue.flush();
        assert_eq!(report.discarded_frames, 5);
        assert_eq!(queue.queued_samples(), 0);

        let mut out = [1.0f32; 600];
        assert_eq!(queue.fill(&mut out, 1), 0);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(!queue.is_active());
    }

    #[test]
    fn flush_reports_played_position() {
        let queue = PlaybackQueue::new();
        queue.enqueue(tone(0, 2400));
        queue.enqueue(tone(2400, 2400));

        let mut out = vec![0.0f32; 3600];
        queue.fill(&mut out, 1);

        let report = queue.flush();
        assert_eq!(report.played_samples, 3600);
        assert_eq!(report.played_ms(), 150);
        assert_eq!(report.discarded_frames, 1);
    }

    #[test]
    fn flush_ignores_position_of_a_finished_item() {
        let queue = PlaybackQueue::new();
        queue.enqueue(tone(0, 24_000));
        let mut out = vec![0.0f32; 24_000];
        queue.fill(&mut out, 1);

        // Next item queued, nothing of it played yet
        queue.enqueue(tone(0, 2400));
        assert_eq!(queue.flush().played_samples, 0);
    }

    #[test]
    fn flush_after_drain_reports_end_of_item() {
        let queue = PlaybackQueue::new();
        queue.enqueue(tone(0, 2400));
        let mut out = vec![0.0f32; 4800];
        queue.fill(&mut out, 1);

        assert_eq!(queue.flush().played_ms(), 100);
    }

    #[test]
    fn flush_tracks_next_item_once_it_plays() {
        let queue = PlaybackQueue::new();
        queue.enqueue(tone(0, 2400));
        queue.enqueue(tone(0, 2400));
        let mut out = vec![0.0f32; 3600];
        queue.fill(&mut out, 1);

        assert_eq!(queue.flush().played_samples, 1200);
    }

    #[test]
    fn active_while_queued_or_recently_audible() {
        let queue = PlaybackQueue::new();
        assert!(!queue.is_active());

        queue.enqueue(tone(0, 10));
        assert!(queue.is_active());

        let mut out = [0.0f32; 10];
        queue.fill(&mut out, 1);
        assert_eq!(queue.queued_frames(), 0);
        // Still inside the hold window
        assert!(queue.is_active());
        assert!(queue.level() > 0.0);
    }

    #[test]
    fn overflow_drops_oldest_frames() {
        let queue = PlaybackQueue::with_max_buffered(10);
        queue.enqueue(AudioFrame::inbound(0, vec![1; 6]));
        queue.enqueue(AudioFrame::inbound(6, vec![2; 6]));

        assert_eq!(queue.queued_frames(), 1);
        assert_eq!(queue.queued_samples(), 6);

        let mut out = [0.0f32; 1];
        queue.fill(&mut out, 1);
        assert_eq!(out[0], i16_to_f32(2));
    }

    #[test]
    fn flush_from_another_thread_is_observed_by_consumer() {
        let queue = PlaybackQueue::new();
        for i in 0..5 {
            queue.enqueue(tone(i * 10, 10));
        }

        let producer = queue.clone();
        std::thread::spawn(move || {
            producer.flush();
        })
        .join()
        .unwrap();

        let mut out = [0.0f32; 50];
        assert_eq!(queue.fill(&mut out, 1), 0);
    }
}
