//! WebSocket transport to the realtime endpoint
//!
//! Outbound events go through one bounded channel into a single writer task,
//! so they reach the socket in the order they were queued. Inbound messages
//! are decoded into [`ServerEvent`]s; malformed ones are logged and skipped.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::events::{ClientEvent, ServerEvent};
use crate::config::RealtimeSettings;
use crate::{Error, Result};

/// Client events queued ahead of the socket before senders wait
pub const OUTBOUND_QUEUE: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An open realtime connection
#[derive(Debug)]
pub struct Connection {
    /// Queue drained by the writer task
    pub outbound: mpsc::Sender<ClientEvent>,
    /// Decoded server events
    pub inbound: Inbound,
    /// Writer task; finishes when every sender is dropped or the socket fails
    pub writer: JoinHandle<Result<()>>,
}

/// Connect to the endpoint and start the writer task
///
/// # Errors
///
/// `Error::Config` for an unusable URL or key, `Error::Remote` when the
/// server rejects the credentials, `Error::Transport` for other failures
pub async fn connect(settings: &RealtimeSettings, api_key: &SecretString) -> Result<Connection> {
    let endpoint = settings.endpoint()?;
    let mut request = endpoint.as_str().into_client_request()?;

    let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
        .map_err(|_| Error::Config("API key contains invalid characters".to_string()))?;
    auth.set_sensitive(true);
    let headers = request.headers_mut();
    headers.insert("Authorization", auth);
    headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

    tracing::info!(url = %endpoint, "connecting to realtime endpoint");
    let (stream, response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| connect_error(&e))?;
    tracing::debug!(status = %response.status(), "realtime connection established");

    let (sink, stream) = stream.split();
    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
    let writer = tokio::spawn(write_loop(sink, rx));

    Ok(Connection {
        outbound: tx,
        inbound: Inbound { stream },
        writer,
    })
}

fn connect_error(err: &tungstenite::Error) -> Error {
    if let tungstenite::Error::Http(response) = err {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Error::Remote(format!("realtime endpoint rejected credentials ({status})"));
        }
        return Error::Transport(format!("realtime handshake failed ({status})"));
    }
    Error::Transport(format!("failed to connect: {err}"))
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::Receiver<ClientEvent>,
) -> Result<()> {
    while let Some(event) = rx.recv().await {
        let text = event.encode()?;
        tracing::trace!(event = event.name(), bytes = text.len(), "sending");
        sink.send(Message::Text(text)).await?;
    }

    tracing::debug!("outbound queue closed, closing socket");
    // Peer may already be gone
    let _ = sink.send(Message::Close(None)).await;
    Ok(())
}

/// Inbound half of the connection
pub struct Inbound {
    stream: SplitStream<WsStream>,
}

impl std::fmt::Debug for Inbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inbound").finish_non_exhaustive()
    }
}

impl Inbound {
    /// Next server event; `None` once the server closed the connection
    ///
    /// # Errors
    ///
    /// Returns the WebSocket error if the connection failed
    pub async fn next_event(&mut self) -> Option<Result<ServerEvent>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };

            match message {
                Message::Text(text) => match ServerEvent::decode(&text) {
                    Ok(event) => return Some(Ok(event)),
                    Err(e) => tracing::warn!(error = %e, "skipping undecodable server message"),
                },
                Message::Close(frame) => {
                    tracing::info!(frame = ?frame, "realtime endpoint closed the connection");
                    return None;
                }
                Message::Binary(data) => {
                    tracing::debug!(bytes = data.len(), "ignoring binary message");
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_tungstenite::tungstenite::http::Response;

    use super::*;

    #[test]
    fn rejected_credentials_are_not_transport_errors() {
        let response = Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .body(None)
            .unwrap();
        let err = connect_error(&tungstenite::Error::Http(response));
        assert!(matches!(err, Error::Remote(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn other_handshake_failures_are_retryable() {
        let response = Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .body(None)
            .unwrap();
        let err = connect_error(&tungstenite::Error::Http(response));
        assert!(err.is_retryable());
    }
}
