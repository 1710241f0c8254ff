//! Configuration management for the realtime voice client
//!
//! Values are layered: defaults, then the TOML file, then environment
//! variables, then command-line overrides.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::{Error, Result};

use self::file::RealtimeConfigFile;

/// Default realtime endpoint
pub const DEFAULT_URL: &str = "wss://api.openai.com/v1/realtime";

/// Default realtime model
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview";

/// Realtime voice client configuration
#[derive(Debug)]
pub struct Config {
    /// `OpenAI` API key (from `OPENAI_API_KEY` or the config file)
    pub api_key: Option<SecretString>,

    /// Endpoint, model and session parameters
    pub realtime: RealtimeSettings,

    /// Audio device behavior
    pub voice: VoiceConfig,

    /// Personalization JSON file
    pub personalization_path: PathBuf,

    /// Directory file and calendar actions are confined to
    pub scratch_dir: PathBuf,

    /// Reconnect policy after transport failures
    pub reconnect: ReconnectPolicy,
}

/// Realtime session settings
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeSettings {
    /// WebSocket endpoint without the model query
    pub url: String,

    /// Model identifier
    pub model: String,

    /// Output voice, unless personalization overrides it
    pub voice: String,

    /// Sampling temperature (0.6 to 1.2)
    pub temperature: f32,

    /// Input transcription model, `None` disables user transcripts
    pub transcription_model: Option<String>,

    /// Server VAD parameters
    pub turn_detection: TurnDetectionSettings,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            voice: "alloy".to_string(),
            temperature: 0.8,
            transcription_model: Some("whisper-1".to_string()),
            turn_detection: TurnDetectionSettings::default(),
        }
    }
}

impl RealtimeSettings {
    /// Endpoint URL including the `model` query parameter
    ///
    /// # Errors
    ///
    /// `Error::Config` if the URL is invalid or not `ws`/`wss`
    pub fn endpoint(&self) -> Result<Url> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| Error::Config(format!("invalid realtime url {}: {e}", self.url)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::Config(format!(
                "realtime url must use ws or wss, got {}",
                url.scheme()
            )));
        }
        url.query_pairs_mut().append_pair("model", &self.model);
        Ok(url)
    }
}

/// Server VAD parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TurnDetectionSettings {
    /// Activation threshold (0.0 to 1.0)
    pub threshold: f32,

    /// Audio kept before detected speech
    pub prefix_padding_ms: u32,

    /// Silence that ends a user turn
    pub silence_duration_ms: u32,
}

impl Default for TurnDetectionSettings {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

/// Audio device configuration
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    /// Use audio devices; when false the client runs headless
    pub enabled: bool,

    /// Pause capture while assistant audio plays
    pub half_duplex: bool,

    /// While assistant audio plays, captured frames below this RMS level are
    /// not sent (0 disables)
    pub echo_guard_threshold: f32,

    /// Maximum buffered assistant audio
    pub max_playback_secs: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            half_duplex: false,
            echo_guard_threshold: 0.02,
            max_playback_secs: 60,
        }
    }
}

/// Linear backoff reconnect policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts after the first failure; 0 disables reconnecting
    pub max_attempts: u32,

    /// Delay added per attempt
    pub backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based), or `None` when
    /// attempts are exhausted
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        (1..=self.max_attempts)
            .contains(&attempt)
            .then(|| self.backoff * attempt)
    }
}

/// Command-line overrides, applied last
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file instead of the standard path
    pub config_file: Option<PathBuf>,

    /// Run without audio devices
    pub headless: bool,

    /// Force half-duplex mode
    pub half_duplex: bool,

    pub model: Option<String>,
    pub voice: Option<String>,
}

impl Config {
    /// Load with default options
    ///
    /// # Errors
    ///
    /// Returns an error if the config file or a value is invalid
    pub fn load() -> Result<Self> {
        Self::load_with_options(&LoadOptions::default())
    }

    /// Load configuration (CLI > env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns an error if the config file or a value is invalid
    pub fn load_with_options(options: &LoadOptions) -> Result<Self> {
        let fc = file::load_config_file(options.config_file.as_deref())?;
        Self::resolve(fc, |key| std::env::var(key).ok(), options)
    }

    /// Merge the file overlay, environment lookups and CLI overrides
    ///
    /// # Errors
    ///
    /// `Error::Config` if a merged value is out of range
    pub fn resolve(
        fc: RealtimeConfigFile,
        env: impl Fn(&str) -> Option<String>,
        options: &LoadOptions,
    ) -> Result<Self> {
        let defaults = RealtimeSettings::default();

        // Realtime settings (cli > env > toml > default)
        let transcription_model = match fc.realtime.transcription_model {
            Some(model) if model.trim().is_empty() => None,
            Some(model) => Some(model),
            None => defaults.transcription_model,
        };
        let realtime = RealtimeSettings {
            url: env("BEACON_REALTIME_URL")
                .or(fc.realtime.url)
                .unwrap_or(defaults.url),
            model: options
                .model
                .clone()
                .or_else(|| env("BEACON_REALTIME_MODEL"))
                .or(fc.realtime.model)
                .unwrap_or(defaults.model),
            voice: options
                .voice
                .clone()
                .or_else(|| env("BEACON_REALTIME_VOICE"))
                .or(fc.realtime.voice)
                .unwrap_or(defaults.voice),
            temperature: fc.realtime.temperature.unwrap_or(defaults.temperature),
            transcription_model,
            turn_detection: TurnDetectionSettings {
                threshold: fc
                    .turn_detection
                    .threshold
                    .unwrap_or(defaults.turn_detection.threshold),
                prefix_padding_ms: fc
                    .turn_detection
                    .prefix_padding_ms
                    .unwrap_or(defaults.turn_detection.prefix_padding_ms),
                silence_duration_ms: fc
                    .turn_detection
                    .silence_duration_ms
                    .unwrap_or(defaults.turn_detection.silence_duration_ms),
            },
        };

        // Voice config (cli > toml > default)
        let voice_defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            enabled: !options.headless && fc.voice.enabled.unwrap_or(voice_defaults.enabled),
            half_duplex: options.half_duplex
                || fc.voice.half_duplex.unwrap_or(voice_defaults.half_duplex),
            echo_guard_threshold: fc
                .voice
                .echo_guard_threshold
                .unwrap_or(voice_defaults.echo_guard_threshold),
            max_playback_secs: fc
                .voice
                .max_playback_secs
                .unwrap_or(voice_defaults.max_playback_secs),
        };

        if options.headless {
            tracing::info!("audio devices disabled via --headless");
        }

        let personalization_path = env("BEACON_PERSONALIZATION")
            .or(fc.paths.personalization)
            .map_or_else(default_personalization_path, PathBuf::from);

        let scratch_dir = env("BEACON_SCRATCH_DIR")
            .or(fc.paths.scratch_dir)
            .map_or_else(default_scratch_dir, PathBuf::from);

        let reconnect_defaults = ReconnectPolicy::default();
        let reconnect = ReconnectPolicy {
            max_attempts: fc
                .reconnect
                .max_attempts
                .unwrap_or(reconnect_defaults.max_attempts),
            backoff: fc
                .reconnect
                .backoff_ms
                .map_or(reconnect_defaults.backoff, Duration::from_millis),
        };

        let api_key = env("OPENAI_API_KEY")
            .or(fc.api_keys.openai)
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        let config = Self {
            api_key,
            realtime,
            voice,
            personalization_path,
            scratch_dir,
            reconnect,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.realtime.endpoint()?;

        let temperature = self.realtime.temperature;
        if !(0.6..=1.2).contains(&temperature) {
            return Err(Error::Config(format!(
                "temperature must be between 0.6 and 1.2, got {temperature}"
            )));
        }

        let threshold = self.realtime.turn_detection.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "turn detection threshold must be between 0 and 1, got {threshold}"
            )));
        }

        if !(0.0..=1.0).contains(&self.voice.echo_guard_threshold) {
            return Err(Error::Config(format!(
                "echo guard threshold must be between 0 and 1, got {}",
                self.voice.echo_guard_threshold
            )));
        }

        if self.voice.max_playback_secs == 0 {
            return Err(Error::Config("max_playback_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// The API key, or a config error naming where to set it
    ///
    /// # Errors
    ///
    /// `Error::Config` if no key is configured
    pub fn require_api_key(&self) -> Result<&SecretString> {
        self.api_key.as_ref().ok_or_else(|| {
            Error::Config(
                "no API key: set OPENAI_API_KEY or [api_keys] openai in the config file"
                    .to_string(),
            )
        })
    }

    /// Create the scratch directory if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created
    pub fn ensure_scratch_dir(&self) -> Result<&Path> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        Ok(&self.scratch_dir)
    }
}

/// `~/.config/omni/beacon-realtime/personalization.json`
fn default_personalization_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("personalization.json"),
        |d| {
            d.config_dir()
                .join("omni")
                .join("beacon-realtime")
                .join("personalization.json")
        },
    )
}

/// `~/.local/share/omni/beacon-realtime/scratch` on Linux
fn default_scratch_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("scratch"),
        |d| d.data_dir().join("omni").join("beacon-realtime").join("scratch"),
    )
}
