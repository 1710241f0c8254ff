//! Session configuration payload

use crate::config::RealtimeSettings;
use crate::personalization::Personalization;
use crate::tools::ToolDefinition;

use super::events::{SessionConfig, TranscriptionConfig, TurnDetection};

/// Audio format used in both directions
pub const AUDIO_FORMAT: &str = "pcm16";

/// Build the `session.update` payload
///
/// Turn detection never creates responses on its own; the session machine
/// requests them so that at most one is in flight.
#[must_use]
pub fn build_session_config(
    personalization: &Personalization,
    tools: &[ToolDefinition],
    settings: &RealtimeSettings,
) -> SessionConfig {
    let voice = personalization
        .voice
        .clone()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| settings.voice.clone());

    SessionConfig {
        modalities: vec!["text".to_string(), "audio".to_string()],
        instructions: personalization.instructions(),
        voice,
        input_audio_format: AUDIO_FORMAT.to_string(),
        output_audio_format: AUDIO_FORMAT.to_string(),
        input_audio_transcription: settings
            .transcription_model
            .clone()
            .map(|model| TranscriptionConfig { model }),
        turn_detection: TurnDetection {
            detection_type: "server_vad".to_string(),
            threshold: settings.turn_detection.threshold,
            prefix_padding_ms: settings.turn_detection.prefix_padding_ms,
            silence_duration_ms: settings.turn_detection.silence_duration_ms,
            create_response: false,
        },
        tools: tools.to_vec(),
        tool_choice: if tools.is_empty() { "none" } else { "auto" }.to_string(),
        temperature: settings.temperature,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tools::{FunctionSpec, Parameter, ParameterSchema};

    fn tool() -> ToolDefinition {
        FunctionSpec::new(
            "get_weather",
            "Weather for a city",
            ParameterSchema::new().param(Parameter::string("city", "City name").required()),
        )
        .definition()
    }

    #[test]
    fn personalization_voice_overrides_settings() {
        let settings = RealtimeSettings::default();
        let personalization = Personalization {
            voice: Some("verse".to_string()),
            ..Personalization::default()
        };

        let config = build_session_config(&personalization, &[], &settings);
        assert_eq!(config.voice, "verse");
        assert_eq!(config.tool_choice, "none");
    }

    #[test]
    fn payload_shape() {
        let settings = RealtimeSettings::default();
        let config = build_session_config(&Personalization::default(), &[tool()], &settings);
        let wire = serde_json::to_value(&config).unwrap();

        assert_eq!(wire["input_audio_format"], "pcm16");
        assert_eq!(wire["output_audio_format"], "pcm16");
        assert_eq!(wire["turn_detection"]["type"], "server_vad");
        assert_eq!(wire["turn_detection"]["create_response"], false);
        assert_eq!(wire["tool_choice"], "auto");
        assert_eq!(wire["tools"][0]["type"], "function");
        assert_eq!(wire["tools"][0]["parameters"]["required"], json!(["city"]));
        assert_eq!(wire["voice"], settings.voice);
    }

    #[test]
    fn is_deterministic() {
        let settings = RealtimeSettings::default();
        let p = Personalization::default();
        assert_eq!(
            build_session_config(&p, &[tool()], &settings),
            build_session_config(&p, &[tool()], &settings)
        );
    }
}
