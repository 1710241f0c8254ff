use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use beacon_realtime::config::LoadOptions;
use beacon_realtime::feedback::RateLimited;
use beacon_realtime::voice::{
    AudioCapture, AudioFrame, AudioPlayback, FRAME_SAMPLES, PlaybackQueue, SAMPLE_RATE,
    f32_to_i16, samples_to_wav,
};
use beacon_realtime::{Assistant, Config, NoFeedback, TerminalMeter};

/// Meter redraws per second while the assistant runs
const METER_RATE: u32 = 15;

/// Beacon Realtime - Talk to a realtime voice assistant
#[derive(Parser)]
#[command(name = "beacon-rt", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (default: ~/.config/omni/beacon-realtime/config.toml)
    #[arg(short, long, env = "BEACON_REALTIME_CONFIG")]
    config: Option<PathBuf>,

    /// Run without audio devices (speaker replaced by a virtual clock)
    #[arg(long, env = "BEACON_HEADLESS")]
    headless: bool,

    /// Mute the microphone while the assistant speaks
    #[arg(long)]
    half_duplex: bool,

    /// Realtime model
    #[arg(long)]
    model: Option<String>,

    /// Assistant voice
    #[arg(long)]
    voice: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
        /// Save the captured audio as a WAV file
        #[arg(short, long)]
        record: Option<PathBuf>,
    },
    /// Test speaker output
    TestSpeaker,
    /// Print the function definitions offered to the model
    Tools,
    /// Print the session.update payload sent on connect
    SessionConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,beacon_realtime=info",
        1 => "info,beacon_realtime=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let options = LoadOptions {
        config_file: cli.config,
        headless: cli.headless,
        half_duplex: cli.half_duplex,
        model: cli.model,
        voice: cli.voice,
    };

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration, record } => test_mic(duration, record).await,
            Command::TestSpeaker => test_speaker().await,
            Command::Tools => print_tools(&options),
            Command::SessionConfig => print_session_config(&options),
        };
    }

    let config = Config::load_with_options(&options)?;
    tracing::debug!(?config, "loaded configuration");

    let headless = !config.voice.enabled;
    tracing::info!(
        model = %config.realtime.model,
        voice = %config.realtime.voice,
        headless,
        half_duplex = config.voice.half_duplex,
        "starting beacon realtime"
    );

    let assistant = Assistant::new(config)?;
    tracing::info!(
        functions = assistant.registry().names().count(),
        "functions registered"
    );

    if headless {
        assistant.run(NoFeedback).await?;
    } else {
        let meter = RateLimited::new(TerminalMeter::default(), METER_RATE);
        assistant.run(meter).await?;
    }

    Ok(())
}

/// Print the function definitions as JSON
fn print_tools(options: &LoadOptions) -> anyhow::Result<()> {
    let assistant = Assistant::new(Config::load_with_options(options)?)?;
    let definitions = assistant.registry().definitions();
    println!("{}", serde_json::to_string_pretty(&definitions)?);
    Ok(())
}

/// Print the session configuration as JSON
fn print_session_config(options: &LoadOptions) -> anyhow::Result<()> {
    let assistant = Assistant::new(Config::load_with_options(options)?)?;
    let update = beacon_realtime::realtime::ClientEvent::SessionUpdate {
        session: assistant.session_config(),
    };
    println!("{}", serde_json::to_string_pretty(&update)?);
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64, record: Option<PathBuf>) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let (faults_tx, mut faults) = mpsc::unbounded_channel();
    let mut capture = AudioCapture::new(faults_tx)?;
    let mut frames = capture.start()?;

    println!("Sample rate: {SAMPLE_RATE} Hz, {FRAME_SAMPLES} samples per frame");
    println!("---");

    let mut recorded: Vec<i16> = Vec::new();
    let started = Instant::now();

    for i in 0..duration {
        let deadline = started + Duration::from_secs(i + 1);
        let mut second: Vec<AudioFrame> = Vec::new();

        loop {
            tokio::select! {
                () = tokio::time::sleep_until(deadline.into()) => break,
                Some(fault) = faults.recv() => return Err(fault.into()),
                frame = frames.next() => match frame {
                    Some(frame) => second.push(frame),
                    None => anyhow::bail!("capture stream ended"),
                },
            }
        }

        let samples: Vec<i16> = second.iter().flat_map(|f| f.samples().iter().copied()).collect();
        let energy = beacon_realtime::voice::rms(&samples);
        let peak = samples
            .iter()
            .map(|s| beacon_realtime::voice::i16_to_f32(*s).abs())
            .fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | Frames: {:2} | [{}]",
            i + 1,
            energy,
            peak,
            second.len(),
            meter
        );

        if record.is_some() {
            recorded.extend_from_slice(&samples);
        }
    }

    let dropped = capture.dropped_frames();
    capture.stop();
    if dropped > 0 {
        println!("({dropped} frames dropped)");
    }

    if let Some(path) = record {
        let wav = samples_to_wav(&recorded, SAMPLE_RATE)?;
        std::fs::write(&path, wav)?;
        println!("Saved {} samples to {}", recorded.len(), path.display());
    }

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");
    println!("  4. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Test speaker output with a sine wave
#[allow(clippy::future_not_send)]
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let frequency = 440.0_f32;
    let num_samples = SAMPLE_RATE as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<i16> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            // 30% volume
            f32_to_i16((2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3)
        })
        .collect();

    let queue = PlaybackQueue::new();
    let mut position = 0u64;
    for chunk in samples.chunks(FRAME_SAMPLES) {
        queue.enqueue(AudioFrame::inbound(position, chunk.to_vec()));
        position += chunk.len() as u64;
    }

    println!("Playing {num_samples} samples at {SAMPLE_RATE} Hz...");

    let (faults_tx, mut faults) = mpsc::unbounded_channel();
    let mut playback = AudioPlayback::new(faults_tx)?;
    playback.start(queue.clone())?;

    let mut poll = tokio::time::interval(Duration::from_millis(50));
    while queue.is_active() {
        tokio::select! {
            Some(fault) = faults.recv() => return Err(fault.into()),
            _ = poll.tick() => {}
        }
    }
    // Let the device drain its own buffer
    tokio::time::sleep(Duration::from_millis(200)).await;
    playback.stop();

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}
