//! Error types for the realtime voice client

use thiserror::Error;

/// Result type alias for realtime client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the realtime voice client
///
/// Only `Transport`, `Device` and `Remote` change session-level state.
/// Everything arising from a single event or function call is contained
/// to that event or call.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection dropped, timed out, or the outbound channel closed
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed or unexpected event from the remote service
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Audio device unavailable or failed
    #[error("audio device error: {0}")]
    Device(String),

    /// Fatal error reported by the remote service
    #[error("remote error: {0}")]
    Remote(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// WebSocket error
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl Error {
    /// Whether a fresh connection may recover from this error
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::WebSocket(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_retryable() {
        assert!(Error::Transport("reset".to_string()).is_retryable());
        assert!(!Error::Device("no input".to_string()).is_retryable());
        assert!(!Error::Remote("session_expired".to_string()).is_retryable());
        assert!(!Error::Config("missing key".to_string()).is_retryable());
    }
}
