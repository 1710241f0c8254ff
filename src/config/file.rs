//! TOML configuration file loading
//!
//! Supports `~/.config/omni/beacon-realtime/config.toml` as a persistent
//! config source. All fields are optional: the file is a partial overlay on
//! top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct RealtimeConfigFile {
    /// API keys
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Realtime endpoint and model
    #[serde(default)]
    pub realtime: RealtimeFileConfig,

    /// Server-side voice activity detection
    #[serde(default)]
    pub turn_detection: TurnDetectionFileConfig,

    /// Audio devices
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Personalization and scratch locations
    #[serde(default)]
    pub paths: PathsFileConfig,

    /// Reconnect behavior
    #[serde(default)]
    pub reconnect: ReconnectFileConfig,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
}

/// Realtime endpoint configuration
#[derive(Debug, Default, Deserialize)]
pub struct RealtimeFileConfig {
    /// WebSocket endpoint without the model query
    pub url: Option<String>,

    /// Model identifier (e.g. "gpt-4o-realtime-preview")
    pub model: Option<String>,

    /// Output voice (e.g. "alloy")
    pub voice: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Input transcription model; empty string disables transcription
    pub transcription_model: Option<String>,
}

/// Turn detection configuration
#[derive(Debug, Default, Deserialize)]
pub struct TurnDetectionFileConfig {
    pub threshold: Option<f32>,
    pub prefix_padding_ms: Option<u32>,
    pub silence_duration_ms: Option<u32>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Use audio devices (false runs headless)
    pub enabled: Option<bool>,

    /// Mute the microphone while assistant audio plays
    pub half_duplex: Option<bool>,

    /// Captured frames quieter than this are dropped while assistant audio plays
    pub echo_guard_threshold: Option<f32>,

    /// Maximum buffered assistant audio in seconds
    pub max_playback_secs: Option<u32>,
}

/// Path configuration
#[derive(Debug, Default, Deserialize)]
pub struct PathsFileConfig {
    pub personalization: Option<String>,
    pub scratch_dir: Option<String>,
}

/// Reconnect configuration
#[derive(Debug, Default, Deserialize)]
pub struct ReconnectFileConfig {
    pub max_attempts: Option<u32>,
    pub backoff_ms: Option<u64>,
}

/// Load the TOML config file from `path`, or the standard path when `None`
///
/// A missing file yields `RealtimeConfigFile::default()`. An explicitly
/// requested file must exist.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed
pub fn load_config_file(path: Option<&Path>) -> Result<RealtimeConfigFile> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => match config_file_path() {
            Some(p) => (p, false),
            None => return Ok(RealtimeConfigFile::default()),
        },
    };

    if !explicit && !path.exists() {
        tracing::debug!(path = %path.display(), "no config file");
        return Ok(RealtimeConfigFile::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/omni/beacon-realtime/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("omni")
            .join("beacon-realtime")
            .join("config.toml")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let fc: RealtimeConfigFile = toml::from_str(
            r#"
            [realtime]
            model = "gpt-4o-mini-realtime-preview"

            [voice]
            half_duplex = true
            "#,
        )
        .unwrap();

        assert_eq!(
            fc.realtime.model.as_deref(),
            Some("gpt-4o-mini-realtime-preview")
        );
        assert_eq!(fc.voice.half_duplex, Some(true));
        assert!(fc.realtime.voice.is_none());
        assert!(fc.reconnect.max_attempts.is_none());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config_file(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[realtime\nmodel = 1").unwrap();
        assert!(load_config_file(Some(&path)).is_err());
    }
}
