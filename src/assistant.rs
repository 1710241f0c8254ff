//! Voice assistant orchestrator
//!
//! Owns the audio devices and the realtime connection, and runs the session
//! state machine on a single event loop. Transport failures are retried
//! according to the configured reconnect policy.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

use crate::config::{Config, VoiceConfig};
use crate::feedback::{ActivityState, VisualFeedback};
use crate::personalization::Personalization;
use crate::realtime::{
    CallOutcome, Connection, Dispatcher, Inbound, SessionConfig, SessionMachine, SessionState,
    build_session_config, transport,
};
use crate::tools::{FunctionRegistry, builtin_registry};
use crate::voice::{
    AudioCapture, AudioFrame, AudioPlayback, CaptureFrames, PlaybackQueue, SAMPLE_RATE,
    spawn_virtual_output,
};
use crate::{Error, Result};

/// Feedback refresh and half-duplex check interval
const TICK: Duration = Duration::from_millis(50);

/// Scale from speech RMS to meter level
const METER_GAIN: f32 = 4.0;

/// How long the writer gets to flush and close the socket
const WRITER_GRACE: Duration = Duration::from_secs(2);

/// How a single session ended
#[derive(Debug)]
enum SessionEnd {
    /// The user asked to stop
    Shutdown,
    /// The session failed; `established` if it got past configuration
    Failed { error: Error, established: bool },
}

/// The realtime voice assistant
#[derive(Debug)]
pub struct Assistant {
    config: Config,
    personalization: Personalization,
    registry: Arc<FunctionRegistry>,
}

impl Assistant {
    /// Load personalization and register the built-in functions
    ///
    /// # Errors
    ///
    /// Returns an error if the personalization file is invalid or the
    /// scratch directory cannot be created
    pub fn new(config: Config) -> Result<Self> {
        let personalization = Personalization::load(&config.personalization_path)?;
        let scratch_dir = config.ensure_scratch_dir()?;
        let registry = Arc::new(builtin_registry(scratch_dir));
        Ok(Self::with_registry(config, personalization, registry))
    }

    /// Assemble from explicit parts
    #[must_use]
    pub const fn with_registry(
        config: Config,
        personalization: Personalization,
        registry: Arc<FunctionRegistry>,
    ) -> Self {
        Self {
            config,
            personalization,
            registry,
        }
    }

    /// Functions offered to the model
    #[must_use]
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// The `session.update` payload sent when a session starts
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        build_session_config(
            &self.personalization,
            &self.registry.definitions(),
            &self.config.realtime,
        )
    }

    /// Run until Ctrl-C, a non-retryable error, or exhausted reconnects
    ///
    /// # Errors
    ///
    /// Returns the error that ended the assistant
    #[allow(clippy::future_not_send)]
    pub async fn run<F: VisualFeedback>(self, mut feedback: F) -> Result<()> {
        let api_key = self.config.require_api_key()?;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        let mut devices = Devices::open(&self.config.voice)?;
        let policy = self.config.reconnect;
        let mut attempt = 0u32;

        loop {
            let end = self
                .run_session(api_key, &mut devices, &mut shutdown_rx, &mut feedback)
                .await;

            let (error, established) = match end {
                SessionEnd::Shutdown => break,
                SessionEnd::Failed { error, established } => (error, established),
            };
            if !error.is_retryable() {
                return Err(error);
            }
            if established {
                attempt = 0;
            }
            attempt += 1;

            let Some(delay) = policy.delay(attempt) else {
                tracing::error!(attempts = attempt - 1, "giving up reconnecting");
                return Err(error);
            };
            tracing::warn!(
                error = %error,
                attempt,
                max_attempts = policy.max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "session lost, reconnecting"
            );

            devices.suspend();
            feedback.update(0.0, ActivityState::Idle);
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("assistant stopped");
        devices.stop();
        feedback.update(0.0, ActivityState::Idle);
        Ok(())
    }

    #[allow(clippy::future_not_send)]
    async fn run_session<F: VisualFeedback>(
        &self,
        api_key: &secrecy::SecretString,
        devices: &mut Devices,
        shutdown: &mut mpsc::Receiver<()>,
        feedback: &mut F,
    ) -> SessionEnd {
        let connection = tokio::select! {
            _ = shutdown.recv() => return SessionEnd::Shutdown,
            connection = transport::connect(&self.config.realtime, api_key) => connection,
        };
        let Connection {
            outbound,
            mut inbound,
            writer,
        } = match connection {
            Ok(connection) => connection,
            Err(error) => {
                return SessionEnd::Failed {
                    error,
                    established: false,
                };
            }
        };

        let (dispatcher, mut outcomes) = Dispatcher::new(Arc::clone(&self.registry));
        let mut machine = SessionMachine::new(outbound, devices.queue.clone(), dispatcher);
        let mut live = LiveSession {
            voice: &self.config.voice,
            devices,
            feedback,
            capture_level: 0.0,
            established: false,
        };

        let end = match machine.start(self.session_config()).await {
            Ok(()) => {
                live.devices.resume();
                live.drive(&mut machine, &mut inbound, &mut outcomes, shutdown)
                    .await
            }
            Err(error) => SessionEnd::Failed {
                error,
                established: false,
            },
        };

        machine.close();
        drop(machine);
        drop(outcomes);
        if tokio::time::timeout(WRITER_GRACE, writer).await.is_err() {
            tracing::debug!("writer did not finish in time");
        }
        end
    }
}

/// Per-session event loop state
struct LiveSession<'a, F> {
    voice: &'a VoiceConfig,
    devices: &'a mut Devices,
    feedback: &'a mut F,
    capture_level: f32,
    established: bool,
}

impl<F: VisualFeedback> LiveSession<'_, F> {
    #[allow(clippy::future_not_send)]
    async fn drive(
        &mut self,
        machine: &mut SessionMachine,
        inbound: &mut Inbound,
        outcomes: &mut mpsc::UnboundedReceiver<CallOutcome>,
        shutdown: &mut mpsc::Receiver<()>,
    ) -> SessionEnd {
        let mut tick = tokio::time::interval(TICK);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            let step = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("shutdown requested");
                    return SessionEnd::Shutdown;
                }
                Some(fault) = self.devices.faults.recv() => Err(fault),
                event = inbound.next_event() => match event {
                    Some(Ok(event)) => machine.handle(event).await,
                    Some(Err(e)) => {
                        machine.transport_closed(&e.to_string());
                        Err(e)
                    }
                    None => {
                        machine.transport_closed("closed by server");
                        Err(Error::Transport("connection closed by server".to_string()))
                    }
                },
                Some(outcome) = outcomes.recv() => machine.complete_call(outcome).await,
                Some(frame) = next_frame(&mut self.devices.frames) => {
                    self.on_frame(machine, &frame).await
                }
                _ = tick.tick() => {
                    self.on_tick(machine);
                    Ok(())
                }
            };

            if machine.state() == SessionState::Idle && !self.established {
                tracing::info!(session_id = ?machine.session_id(), "session ready, start talking");
                self.established = true;
            }

            if let Err(error) = step {
                return SessionEnd::Failed {
                    error,
                    established: self.established,
                };
            }
        }
    }

    async fn on_frame(&mut self, machine: &mut SessionMachine, frame: &AudioFrame) -> Result<()> {
        let level = frame.level();
        self.capture_level = level;

        // Keep the assistant from hearing itself through the speakers
        let guard = self.voice.echo_guard_threshold;
        if !self.voice.half_duplex && guard > 0.0 && level < guard && machine.sink().is_active() {
            return Ok(());
        }
        machine.push_audio(frame).await.map(|_| ())
    }

    fn on_tick(&mut self, machine: &SessionMachine) {
        let sink = machine.sink();
        if self.voice.half_duplex {
            if sink.is_active() {
                self.devices.pause_capture();
            } else {
                self.devices.resume();
            }
        }

        let activity = machine.activity();
        let level = match activity {
            ActivityState::Speaking => sink.level(),
            ActivityState::Listening => self.capture_level,
            _ => 0.0,
        };
        self.feedback
            .update((level * METER_GAIN).clamp(0.0, 1.0), activity);
    }
}

async fn next_frame(frames: &mut Option<CaptureFrames>) -> Option<AudioFrame> {
    match frames {
        Some(frames) => frames.next().await,
        None => std::future::pending().await,
    }
}

/// Audio devices shared by consecutive sessions
struct Devices {
    queue: PlaybackQueue,
    capture: Option<AudioCapture>,
    frames: Option<CaptureFrames>,
    playback: Option<AudioPlayback>,
    virtual_output: Option<JoinHandle<()>>,
    faults: mpsc::UnboundedReceiver<Error>,
}

impl Devices {
    /// Open the microphone and speakers, or a virtual output when headless
    fn open(voice: &VoiceConfig) -> Result<Self> {
        let (faults_tx, faults) = mpsc::unbounded_channel();
        let max_samples = SAMPLE_RATE as usize * voice.max_playback_secs as usize;
        let queue = PlaybackQueue::with_max_buffered(max_samples);

        if !voice.enabled {
            tracing::info!("running headless: no microphone, virtual speaker clock");
            return Ok(Self {
                virtual_output: Some(spawn_virtual_output(queue.clone())),
                queue,
                capture: None,
                frames: None,
                playback: None,
                faults,
            });
        }

        let mut capture = AudioCapture::new(faults_tx.clone())?;
        let frames = capture.start()?;
        capture.pause();

        let mut playback = AudioPlayback::new(faults_tx)?;
        playback.start(queue.clone())?;

        Ok(Self {
            queue,
            capture: Some(capture),
            frames: Some(frames),
            playback: Some(playback),
            virtual_output: None,
            faults,
        })
    }

    fn pause_capture(&self) {
        if let Some(capture) = &self.capture
            && !capture.is_paused()
        {
            capture.pause();
        }
    }

    fn resume(&self) {
        if let Some(capture) = &self.capture
            && capture.is_paused()
        {
            capture.resume();
        }
    }

    /// Quiesce between sessions: mute the microphone, drop stale audio
    fn suspend(&mut self) {
        self.pause_capture();
        self.queue.flush();
        if let Some(frames) = self.frames.as_mut() {
            let rx: &mut mpsc::Receiver<AudioFrame> = frames.as_mut();
            let mut stale = 0usize;
            while rx.try_recv().is_ok() {
                stale += 1;
            }
            if stale > 0 {
                tracing::debug!(stale, "discarded captured frames");
            }
        }
    }

    fn stop(&mut self) {
        self.frames = None;
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        if let Some(mut playback) = self.playback.take() {
            playback.stop();
        }
        if let Some(handle) = self.virtual_output.take() {
            handle.abort();
        }
    }
}

impl Drop for Devices {
    fn drop(&mut self) {
        self.stop();
    }
}
