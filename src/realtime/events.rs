//! Wire events of the realtime protocol
//!
//! Every WebSocket text message is a JSON object tagged by `type`. Client
//! events are encoded from [`ClientEvent`]; server events are decoded into
//! [`ServerEvent`] in a single step, with unrecognized types mapped to
//! [`ServerEvent::Unknown`].

use serde::{Deserialize, Serialize};

use crate::tools::ToolDefinition;
use crate::{Error, Result};

/// Session configuration sent with `session.update`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<TranscriptionConfig>,
    pub turn_detection: TurnDetection,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: String,
    pub temperature: f32,
}

/// Input transcription settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptionConfig {
    pub model: String,
}

/// Server-side voice activity detection settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub detection_type: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
    /// Whether the server creates a response on its own when speech stops
    pub create_response: bool,
}

/// Conversation item created by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    /// Result of a function call
    FunctionCallOutput { call_id: String, output: String },
}

/// Events sent to the server
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64 little-endian PCM16
        audio: String,
    },

    #[serde(rename = "response.create")]
    ResponseCreate {
        /// Echoed by the server in `error` events caused by this request
        event_id: String,
    },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    #[serde(rename = "response.cancel")]
    ResponseCancel {
        #[serde(skip_serializing_if = "Option::is_none")]
        response_id: Option<String>,
    },

    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        item_id: String,
        content_index: u32,
        audio_end_ms: u64,
    },
}

impl ClientEvent {
    /// Wire name of the event
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::ResponseCreate { .. } => "response.create",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ResponseCancel { .. } => "response.cancel",
            Self::ConversationItemTruncate { .. } => "conversation.item.truncate",
        }
    }

    /// Encode as a JSON text message
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// `conversation.item.create` carrying a function call's output
    #[must_use]
    pub const fn function_output(call_id: String, output: String) -> Self {
        Self::ConversationItemCreate {
            item: ConversationItem::FunctionCallOutput { call_id, output },
        }
    }
}

/// Session fields the client cares about
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub id: String,
}

/// Response fields the client cares about
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResponseInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Output item announced by `response.output_item.added`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OutputItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Body of an `error` event
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub param: Option<String>,
    /// Client event that caused the error, if any
    #[serde(default)]
    pub event_id: Option<String>,
}

impl ErrorDetail {
    /// Whether the session cannot continue after this error
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.error_type.as_str(),
            "server_error" | "authentication_error"
        ) || matches!(
            self.code.as_deref(),
            Some("session_expired" | "invalid_api_key")
        )
    }
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({code}): {}", self.error_type, self.message),
            None => write!(f, "{}: {}", self.error_type, self.message),
        }
    }
}

/// Events received from the server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated { session: SessionInfo },

    #[serde(rename = "session.updated")]
    SessionUpdated { session: SessionInfo },

    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: u64,
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        audio_end_ms: u64,
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "response.created")]
    ResponseCreated { response: ResponseInfo },

    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        #[serde(default)]
        response_id: String,
        item: OutputItem,
    },

    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        #[serde(default)]
        response_id: String,
        #[serde(default)]
        item_id: String,
        delta: String,
    },

    #[serde(rename = "response.audio.done")]
    AudioDone {
        #[serde(default)]
        response_id: String,
        #[serde(default)]
        item_id: String,
    },

    #[serde(rename = "response.text.delta")]
    TextDelta {
        #[serde(default)]
        response_id: String,
        delta: String,
    },

    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta {
        #[serde(default)]
        response_id: String,
        delta: String,
    },

    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        #[serde(default)]
        response_id: String,
        call_id: String,
        delta: String,
    },

    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        #[serde(default)]
        response_id: String,
        call_id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        arguments: String,
    },

    #[serde(rename = "response.done")]
    ResponseDone { response: ResponseInfo },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted {
        #[serde(default)]
        item_id: String,
        #[serde(default)]
        transcript: String,
    },

    #[serde(rename = "error")]
    Error { error: ErrorDetail },

    /// Any event type this client does not act on
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Decode a JSON text message
    ///
    /// # Errors
    ///
    /// `Error::Protocol` if the message is not a well-formed event
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Protocol(format!("malformed event: {e}")))
    }

    /// Wire name of the event
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session.created",
            Self::SessionUpdated { .. } => "session.updated",
            Self::SpeechStarted { .. } => "input_audio_buffer.speech_started",
            Self::SpeechStopped { .. } => "input_audio_buffer.speech_stopped",
            Self::ResponseCreated { .. } => "response.created",
            Self::OutputItemAdded { .. } => "response.output_item.added",
            Self::AudioDelta { .. } => "response.audio.delta",
            Self::AudioDone { .. } => "response.audio.done",
            Self::TextDelta { .. } => "response.text.delta",
            Self::AudioTranscriptDelta { .. } => "response.audio_transcript.delta",
            Self::FunctionCallArgumentsDelta { .. } => "response.function_call_arguments.delta",
            Self::FunctionCallArgumentsDone { .. } => "response.function_call_arguments.done",
            Self::ResponseDone { .. } => "response.done",
            Self::InputTranscriptionCompleted { .. } => {
                "conversation.item.input_audio_transcription.completed"
            }
            Self::Error { .. } => "error",
            Self::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn decodes_audio_delta() {
        let event = ServerEvent::decode(
            r#"{"type":"response.audio.delta","event_id":"ev_1","response_id":"resp_1",
                "item_id":"item_1","output_index":0,"content_index":0,"delta":"AAA="}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ServerEvent::AudioDelta {
                response_id: "resp_1".to_string(),
                item_id: "item_1".to_string(),
                delta: "AAA=".to_string(),
            }
        );
    }

    #[test]
    fn unknown_types_decode_to_unknown() {
        let event = ServerEvent::decode(r#"{"type":"rate_limits.updated","rate_limits":[]}"#)
            .unwrap();
        assert_eq!(event, ServerEvent::Unknown);
    }

    #[test]
    fn malformed_events_are_protocol_errors() {
        assert!(matches!(
            ServerEvent::decode(r#"{"no_type":true}"#),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            ServerEvent::decode(r#"{"type":"response.audio.delta"}"#),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn error_fatality() {
        let event = ServerEvent::decode(
            r#"{"type":"error","error":{"type":"invalid_request_error",
                "code":"session_expired","message":"expired"}}"#,
        )
        .unwrap();
        let ServerEvent::Error { error } = event else {
            panic!("expected error event");
        };
        assert!(error.is_fatal());

        let benign = ErrorDetail {
            error_type: "invalid_request_error".to_string(),
            message: "Conversation already has an active response".to_string(),
            ..ErrorDetail::default()
        };
        assert!(!benign.is_fatal());
    }

    #[test]
    fn encodes_function_output() {
        let event = ClientEvent::function_output("call_1".to_string(), "{\"ok\":true}".to_string());
        let wire: Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({
                "type": "conversation.item.create",
                "item": {
                    "type": "function_call_output",
                    "call_id": "call_1",
                    "output": "{\"ok\":true}",
                }
            })
        );
    }

    #[test]
    fn encodes_cancel_without_response_id() {
        let event = ClientEvent::ResponseCancel { response_id: None };
        assert_eq!(event.encode().unwrap(), r#"{"type":"response.cancel"}"#);
    }
}
