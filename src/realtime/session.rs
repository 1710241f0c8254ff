//! Realtime session state machine
//!
//! Owns the logical conversation: session lifecycle, turns, function calls
//! and response bookkeeping. It consumes decoded server events, captured
//! audio frames and function call outcomes one at a time, and emits client
//! events on a bounded channel drained by the transport writer.
//!
//! ```text
//! Connecting -> Configuring -> Idle <-> Listening <-> Responding
//!                                 \-------------------------/
//!                                   Closed | Errored
//! ```

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use uuid::Uuid;

use super::dispatch::{CallOutcome, Dispatcher};
use super::events::{ClientEvent, ErrorDetail, OutputItem, ServerEvent, SessionConfig};
use crate::feedback::ActivityState;
use crate::voice::{AudioFrame, PlaybackQueue};
use crate::{Error, Result};

/// Lifecycle state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport connected, configuration not sent yet
    Connecting,
    /// Configuration sent, waiting for the acknowledgment
    Configuring,
    /// Nobody is speaking
    Idle,
    /// The user is speaking
    Listening,
    /// A response is being produced
    Responding,
    /// Closed by the client
    Closed,
    /// Ended by a fatal error or transport loss
    Errored,
}

impl SessionState {
    /// Whether no further events are processed
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }

    /// Whether captured audio is forwarded
    #[must_use]
    pub const fn streams_audio(self) -> bool {
        matches!(self, Self::Idle | Self::Listening | Self::Responding)
    }
}

/// Who a turn belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

/// One speaker's contribution to the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub speaker: Speaker,
    pub open: bool,
    /// Accumulated transcript or text
    pub transcript: String,
    /// Response producing this turn (assistant)
    pub response_id: Option<String>,
    /// Audio item being played (assistant)
    pub audio_item_id: Option<String>,
}

impl Turn {
    fn new(speaker: Speaker) -> Self {
        Self {
            speaker,
            open: true,
            transcript: String::new(),
            response_id: None,
            audio_item_id: None,
        }
    }
}

/// Progress of a function call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    /// Argument fragments are arriving
    Accumulating,
    /// Arguments complete, handler running
    Dispatched,
    /// Output sent to the server; only the id is kept
    Answered,
}

/// A function call requested by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub call_id: String,
    pub name: Option<String>,
    /// Raw argument payload
    pub arguments: String,
    pub status: CallStatus,
}

impl FunctionCall {
    fn new(call_id: &str, name: Option<String>) -> Self {
        Self {
            call_id: call_id.to_string(),
            name,
            arguments: String::new(),
            status: CallStatus::Accumulating,
        }
    }

    /// Complete the payload with the `done` event's arguments
    ///
    /// A `done` payload that extends the accumulated fragments is the full
    /// string; anything else is the last fragment.
    fn finalize(&mut self, done: &str) {
        if done.starts_with(self.arguments.as_str()) {
            self.arguments = done.to_string();
        } else {
            self.arguments.push_str(done);
        }
    }
}

/// The `response.create` currently awaiting `response.done`
#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    event_id: String,
    response_id: Option<String>,
    /// Cancelled by barge-in; its output is no longer wanted
    abandoned: bool,
}

/// The realtime session state machine
#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    session_id: Option<String>,
    outbound: mpsc::Sender<ClientEvent>,
    sink: PlaybackQueue,
    dispatcher: Dispatcher,
    turn: Option<Turn>,
    last_turn: Option<Turn>,
    /// Calls still accumulating or running
    calls: HashMap<String, FunctionCall>,
    /// Calls whose output was sent
    answered: HashSet<String>,
    /// Responses this session requested, abandoned ones included
    issued: HashSet<String>,
    in_flight: Option<InFlight>,
    create_pending: bool,
    last_seq: Option<u64>,
    /// Sample offset of the next inbound frame within the current audio item
    audio_position: u64,
    /// Last assistant audio item, kept for truncation after the turn closes
    last_audio_item: Option<String>,
}

impl SessionMachine {
    /// Create a machine for a freshly connected transport
    ///
    /// Client events are written to `outbound`; assistant audio goes to
    /// `sink`; function calls run on `dispatcher`.
    #[must_use]
    pub fn new(
        outbound: mpsc::Sender<ClientEvent>,
        sink: PlaybackQueue,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            state: SessionState::Connecting,
            session_id: None,
            outbound,
            sink,
            dispatcher,
            turn: None,
            last_turn: None,
            calls: HashMap::new(),
            answered: HashSet::new(),
            issued: HashSet::new(),
            in_flight: None,
            create_pending: false,
            last_seq: None,
            audio_position: 0,
            last_audio_item: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Id assigned by `session.created`
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The open turn, if any
    #[must_use]
    pub const fn turn(&self) -> Option<&Turn> {
        self.turn.as_ref()
    }

    /// The most recently closed or abandoned turn
    #[must_use]
    pub const fn last_turn(&self) -> Option<&Turn> {
        self.last_turn.as_ref()
    }

    /// A function call that is still accumulating or running
    #[must_use]
    pub fn call(&self, call_id: &str) -> Option<&FunctionCall> {
        self.calls.get(call_id)
    }

    /// Progress of a call, including answered ones
    #[must_use]
    pub fn call_status(&self, call_id: &str) -> Option<CallStatus> {
        if self.answered.contains(call_id) {
            return Some(CallStatus::Answered);
        }
        self.calls.get(call_id).map(|c| c.status)
    }

    /// Whether a `response.create` is awaiting its `response.done`
    #[must_use]
    pub const fn response_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether a `response.create` is deferred behind the in-flight one
    #[must_use]
    pub const fn create_pending(&self) -> bool {
        self.create_pending
    }

    /// The playback queue assistant audio is written to
    #[must_use]
    pub const fn sink(&self) -> &PlaybackQueue {
        &self.sink
    }

    /// What the assistant is doing, for feedback
    #[must_use]
    pub fn activity(&self) -> ActivityState {
        let speaking = self.sink.is_active();
        match self.state {
            SessionState::Listening => ActivityState::Listening,
            SessionState::Responding if speaking => ActivityState::Speaking,
            SessionState::Responding => ActivityState::Processing,
            SessionState::Idle if speaking => ActivityState::Speaking,
            _ => ActivityState::Idle,
        }
    }

    /// Send the session configuration
    ///
    /// # Errors
    ///
    /// `Error::Protocol` if the session was already started, `Error::Transport`
    /// if the outbound channel is closed
    pub async fn start(&mut self, config: SessionConfig) -> Result<()> {
        if self.state != SessionState::Connecting {
            return Err(Error::Protocol(format!(
                "session already started (state {:?})",
                self.state
            )));
        }
        self.send(ClientEvent::SessionUpdate { session: config })
            .await?;
        self.transition(SessionState::Configuring);
        Ok(())
    }

    /// Forward a captured frame
    ///
    /// Returns `false` when the frame was not sent: the session is not
    /// streaming, or the frame is out of capture order.
    ///
    /// # Errors
    ///
    /// `Error::Transport` if the outbound channel is closed
    pub async fn push_audio(&mut self, frame: &AudioFrame) -> Result<bool> {
        if !self.state.streams_audio() {
            return Ok(false);
        }
        if let Some(last) = self.last_seq
            && frame.seq() <= last
        {
            tracing::warn!(seq = frame.seq(), last, "dropping out-of-order capture frame");
            return Ok(false);
        }
        self.last_seq = Some(frame.seq());
        self.send(ClientEvent::InputAudioBufferAppend {
            audio: frame.to_base64(),
        })
        .await?;
        Ok(true)
    }

    /// Process one server event
    ///
    /// Errors scoped to a single event are logged and contained.
    ///
    /// # Errors
    ///
    /// `Error::Remote` for fatal server errors (the session becomes
    /// `Errored`), `Error::Transport` if the outbound channel is closed
    pub async fn handle(&mut self, event: ServerEvent) -> Result<()> {
        if self.state.is_terminal() {
            tracing::debug!(event = event.name(), "session ended, ignoring event");
            return Ok(());
        }
        tracing::trace!(event = event.name(), state = ?self.state, "server event");

        match event {
            ServerEvent::SessionCreated { session } => {
                tracing::info!(session_id = %session.id, "session created");
                self.session_id = Some(session.id);
            }
            ServerEvent::SessionUpdated { .. } => {
                if self.state == SessionState::Configuring {
                    self.transition(SessionState::Idle);
                }
            }
            ServerEvent::SpeechStarted { .. } => self.on_speech_started().await?,
            ServerEvent::SpeechStopped { .. } => self.on_speech_stopped().await?,
            ServerEvent::ResponseCreated { response } => self.on_response_created(response.id),
            ServerEvent::OutputItemAdded { response_id, item } => {
                self.on_output_item(&response_id, item);
            }
            ServerEvent::AudioDelta {
                response_id,
                item_id,
                delta,
            } => self.on_audio_delta(&response_id, item_id, &delta),
            ServerEvent::AudioDone { response_id, .. } => {
                tracing::debug!(response_id = %response_id, "response audio complete");
            }
            ServerEvent::TextDelta { response_id, delta }
            | ServerEvent::AudioTranscriptDelta { response_id, delta } => {
                if self.accepts(&response_id)
                    && let Some(turn) = self.turn.as_mut()
                {
                    turn.transcript.push_str(&delta);
                }
            }
            ServerEvent::FunctionCallArgumentsDelta {
                response_id,
                call_id,
                delta,
            } => self.on_arguments_delta(&response_id, &call_id, &delta),
            ServerEvent::FunctionCallArgumentsDone {
                response_id,
                call_id,
                name,
                arguments,
            } => self.on_arguments_done(&response_id, &call_id, name, &arguments),
            ServerEvent::ResponseDone { response } => {
                self.on_response_done(&response.id, response.status.as_deref())
                    .await?;
            }
            ServerEvent::InputTranscriptionCompleted { transcript, .. } => {
                tracing::info!(transcript = %transcript.trim(), "user said");
                if let Some(turn) = self.turn.as_mut().filter(|t| t.speaker == Speaker::User) {
                    turn.transcript = transcript;
                } else if let Some(turn) = self
                    .last_turn
                    .as_mut()
                    .filter(|t| t.speaker == Speaker::User && t.transcript.is_empty())
                {
                    turn.transcript = transcript;
                }
            }
            ServerEvent::Error { error } => self.on_error(&error).await?,
            ServerEvent::Unknown => {}
        }
        Ok(())
    }

    /// Deliver a function call outcome
    ///
    /// Results for unknown, already answered or closed-session calls are
    /// discarded.
    ///
    /// # Errors
    ///
    /// `Error::Transport` if the outbound channel is closed
    pub async fn complete_call(&mut self, outcome: CallOutcome) -> Result<()> {
        self.dispatcher.finished(&outcome.call_id);
        if self.state.is_terminal() {
            tracing::debug!(call_id = %outcome.call_id, "session ended, discarding result");
            return Ok(());
        }

        if self.answered.contains(&outcome.call_id) {
            tracing::debug!(call_id = %outcome.call_id, "result for answered call discarded");
            return Ok(());
        }
        let Some(call) = self.calls.get(&outcome.call_id) else {
            tracing::warn!(call_id = %outcome.call_id, "result for unknown call discarded");
            return Ok(());
        };
        if call.status != CallStatus::Dispatched {
            tracing::debug!(call_id = %outcome.call_id, status = ?call.status, "late result discarded");
            return Ok(());
        }
        self.calls.remove(&outcome.call_id);
        self.answered.insert(outcome.call_id.clone());

        let output = outcome.wire_output();
        tracing::info!(
            call_id = %outcome.call_id,
            function = %outcome.name,
            ok = outcome.output.is_ok(),
            "sending function output"
        );
        self.send(ClientEvent::function_output(outcome.call_id, output))
            .await?;

        let outstanding = self
            .calls
            .values()
            .any(|c| c.status == CallStatus::Dispatched);
        if outstanding {
            return Ok(());
        }

        match self.state {
            // The end of the user's speech will request the next response
            SessionState::Listening => {
                tracing::debug!("user speaking, not requesting a response for function output");
                Ok(())
            }
            SessionState::Idle | SessionState::Responding => self.request_response().await,
            _ => Ok(()),
        }
    }

    /// The transport is gone; nothing more can be sent
    pub fn transport_closed(&mut self, reason: &str) {
        if self.state.is_terminal() {
            return;
        }
        tracing::warn!(reason, state = ?self.state, "transport closed");
        self.shutdown(SessionState::Errored);
    }

    /// Close the session, aborting running calls and discarding queued audio
    pub fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.shutdown(SessionState::Closed);
    }

    fn shutdown(&mut self, state: SessionState) {
        self.dispatcher.abort_all();
        self.calls.clear();
        self.sink.flush();
        self.abandon_turn();
        self.in_flight = None;
        self.create_pending = false;
        self.transition(state);
    }

    async fn on_speech_started(&mut self) -> Result<()> {
        match self.state {
            SessionState::Idle => {
                // Assistant audio may still be playing after its response ended
                if self.sink.is_active() {
                    let report = self.sink.flush();
                    if let Some(item_id) = self.last_audio_item.take() {
                        self.truncate(item_id, report.played_ms()).await?;
                    }
                }
                self.open_turn(Speaker::User);
                self.transition(SessionState::Listening);
            }
            SessionState::Responding => self.barge_in().await?,
            _ => {}
        }
        Ok(())
    }

    /// Interrupt the assistant: stop playback, cancel and truncate, then
    /// hand the floor to the user
    async fn barge_in(&mut self) -> Result<()> {
        let report = self.sink.flush();
        tracing::info!(
            discarded_frames = report.discarded_frames,
            played_ms = report.played_ms(),
            "barge-in"
        );

        if let Some(in_flight) = self.in_flight.as_mut()
            && !in_flight.abandoned
        {
            in_flight.abandoned = true;
            let response_id = in_flight.response_id.clone();
            self.send(ClientEvent::ResponseCancel { response_id }).await?;
        }

        let item_id = self
            .turn
            .as_ref()
            .and_then(|t| t.audio_item_id.clone())
            .or_else(|| self.last_audio_item.clone());
        if let Some(item_id) = item_id {
            self.truncate(item_id, report.played_ms()).await?;
        }
        self.last_audio_item = None;

        // A follow-up response is requested again when the user stops
        self.create_pending = false;
        self.abandon_turn();
        self.open_turn(Speaker::User);
        self.transition(SessionState::Listening);
        Ok(())
    }

    async fn truncate(&self, item_id: String, audio_end_ms: u64) -> Result<()> {
        self.send(ClientEvent::ConversationItemTruncate {
            item_id,
            content_index: 0,
            audio_end_ms,
        })
        .await
    }

    async fn on_speech_stopped(&mut self) -> Result<()> {
        if self.state != SessionState::Listening {
            return Ok(());
        }
        self.close_turn();
        self.request_response().await
    }

    /// Ask for a response, or defer the request behind the in-flight one
    ///
    /// Opens the assistant turn and moves to `Responding` unless already
    /// there.
    async fn request_response(&mut self) -> Result<()> {
        if self.in_flight.is_some() {
            tracing::debug!("response in flight, deferring response.create");
            self.create_pending = true;
        } else {
            self.send_create().await?;
        }

        if self.state != SessionState::Responding {
            self.open_turn(Speaker::Assistant);
            self.transition(SessionState::Responding);
        }
        Ok(())
    }

    async fn send_create(&mut self) -> Result<()> {
        let event_id = format!("evt_{}", Uuid::new_v4().simple());
        self.send(ClientEvent::ResponseCreate {
            event_id: event_id.clone(),
        })
        .await?;
        self.in_flight = Some(InFlight {
            event_id,
            response_id: None,
            abandoned: false,
        });
        self.create_pending = false;
        Ok(())
    }

    fn on_response_created(&mut self, response_id: String) {
        let Some(in_flight) = self.in_flight.as_mut() else {
            tracing::warn!(response_id = %response_id, "response created without a request");
            return;
        };
        if in_flight.response_id.is_none() {
            in_flight.response_id = Some(response_id.clone());
            self.issued.insert(response_id.clone());
        }
        if in_flight.abandoned || in_flight.response_id.as_deref() != Some(response_id.as_str()) {
            tracing::debug!(response_id = %response_id, "ignoring created event of abandoned response");
            return;
        }

        if self.state == SessionState::Responding
            && let Some(turn) = self
                .turn
                .as_mut()
                .filter(|t| t.speaker == Speaker::Assistant && t.response_id.is_none())
        {
            tracing::debug!(response_id = %response_id, "response started");
            turn.response_id = Some(response_id);
            self.audio_position = 0;
        }
    }

    /// Whether output of `response_id` belongs to the current assistant turn
    fn accepts(&self, response_id: &str) -> bool {
        if self.state != SessionState::Responding {
            return false;
        }
        self.turn.as_ref().is_some_and(|t| {
            t.speaker == Speaker::Assistant
                && match t.response_id.as_deref() {
                    Some(id) => response_id.is_empty() || id == response_id,
                    None => !self.in_flight.as_ref().is_some_and(|f| f.abandoned),
                }
        })
    }

    /// Whether function calls of `response_id` must be answered
    ///
    /// Calls of an interrupted response are already part of the
    /// conversation, so they are answered even though its audio is dropped.
    fn tracks_calls(&self, response_id: &str) -> bool {
        self.accepts(response_id) || self.issued.contains(response_id)
    }

    fn on_output_item(&mut self, response_id: &str, item: OutputItem) {
        if !self.tracks_calls(response_id) {
            return;
        }
        if item.item_type == "function_call"
            && let Some(call_id) = item.call_id
            && !self.answered.contains(&call_id)
        {
            tracing::debug!(call_id = %call_id, name = ?item.name, "function call announced");
            self.calls
                .entry(call_id.clone())
                .or_insert_with(|| FunctionCall::new(&call_id, item.name));
        }
    }

    fn on_audio_delta(&mut self, response_id: &str, item_id: String, delta: &str) {
        if !self.accepts(response_id) {
            tracing::trace!(response_id, "dropping audio of inactive response");
            return;
        }

        let Some(turn) = self.turn.as_mut() else {
            return;
        };
        if turn.audio_item_id.as_deref() != Some(item_id.as_str()) {
            turn.audio_item_id = Some(item_id.clone());
            self.last_audio_item = Some(item_id);
            self.audio_position = 0;
        }

        match AudioFrame::from_base64(delta, self.audio_position) {
            Ok(frame) => {
                self.audio_position += frame.len() as u64;
                self.sink.enqueue(frame);
            }
            Err(e) => tracing::warn!(error = %e, "dropping malformed audio delta"),
        }
    }

    fn on_arguments_delta(&mut self, response_id: &str, call_id: &str, delta: &str) {
        if !self.tracks_calls(response_id) || self.answered.contains(call_id) {
            return;
        }
        let call = self
            .calls
            .entry(call_id.to_string())
            .or_insert_with(|| FunctionCall::new(call_id, None));
        if call.status == CallStatus::Accumulating {
            call.arguments.push_str(delta);
        }
    }

    fn on_arguments_done(
        &mut self,
        response_id: &str,
        call_id: &str,
        name: Option<String>,
        arguments: &str,
    ) {
        if !self.tracks_calls(response_id) {
            tracing::debug!(call_id, "ignoring function call of unknown response");
            return;
        }
        if self.answered.contains(call_id) {
            tracing::debug!(call_id, "duplicate completion of answered call ignored");
            return;
        }

        let call = self
            .calls
            .entry(call_id.to_string())
            .or_insert_with(|| FunctionCall::new(call_id, None));
        if call.status != CallStatus::Accumulating {
            tracing::debug!(call_id, status = ?call.status, "duplicate function call completion ignored");
            return;
        }

        call.finalize(arguments);
        if name.is_some() {
            call.name = name;
        }
        call.status = CallStatus::Dispatched;

        let function = call.name.clone().unwrap_or_default();
        tracing::info!(call_id, function = %function, "dispatching function call");
        self.dispatcher
            .dispatch(call_id, &function, call.arguments.clone());
    }

    async fn on_response_done(&mut self, response_id: &str, status: Option<&str>) -> Result<()> {
        let mut cleared = false;
        if let Some(in_flight) = &self.in_flight
            && in_flight
                .response_id
                .as_deref()
                .is_none_or(|id| id == response_id)
        {
            self.in_flight = None;
            cleared = true;
        }

        if self.state == SessionState::Responding {
            let finished = self.turn.as_ref().is_some_and(|t| {
                t.speaker == Speaker::Assistant
                    && match t.response_id.as_deref() {
                        Some(id) => id == response_id,
                        None => cleared && !self.create_pending,
                    }
            });
            if finished {
                tracing::debug!(response_id, status, "response done");
                self.close_turn();
                self.transition(SessionState::Idle);
            }
        }

        if self.create_pending && self.in_flight.is_none() {
            self.request_response().await?;
        }
        Ok(())
    }

    async fn on_error(&mut self, error: &ErrorDetail) -> Result<()> {
        if error.is_fatal() {
            tracing::error!(error = %error, "fatal session error");
            self.shutdown(SessionState::Errored);
            return Err(Error::Remote(error.to_string()));
        }
        tracing::warn!(error = %error, "session error");

        // A rejected response.create will never produce a response
        let rejected_create = match (&self.in_flight, error.event_id.as_deref()) {
            (Some(in_flight), Some(event_id)) => in_flight.event_id == event_id,
            _ => false,
        };
        if !rejected_create {
            return Ok(());
        }

        self.in_flight = None;
        if self.create_pending {
            return self.request_response().await;
        }
        if self.state == SessionState::Responding
            && self
                .turn
                .as_ref()
                .is_some_and(|t| t.speaker == Speaker::Assistant && t.response_id.is_none())
        {
            self.close_turn();
            self.transition(SessionState::Idle);
        }
        Ok(())
    }

    fn open_turn(&mut self, speaker: Speaker) {
        self.abandon_turn();
        self.turn = Some(Turn::new(speaker));
    }

    fn close_turn(&mut self) {
        if let Some(mut turn) = self.turn.take() {
            turn.open = false;
            if turn.speaker == Speaker::Assistant && !turn.transcript.is_empty() {
                tracing::info!(transcript = %turn.transcript.trim(), "assistant said");
            }
            self.last_turn = Some(turn);
        }
    }

    fn abandon_turn(&mut self) {
        if let Some(mut turn) = self.turn.take() {
            tracing::debug!(speaker = ?turn.speaker, "turn abandoned");
            turn.open = false;
            self.last_turn = Some(turn);
        }
    }

    fn transition(&mut self, to: SessionState) {
        if self.state != to {
            tracing::debug!(from = ?self.state, to = ?to, "session state");
            self.state = to;
        }
    }

    async fn send(&self, event: ClientEvent) -> Result<()> {
        let name = event.name();
        self.outbound
            .send(event)
            .await
            .map_err(|_| Error::Transport(format!("outbound channel closed while sending {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_prefers_full_done_payload() {
        let mut call = FunctionCall::new("c", None);
        call.arguments.push_str("{\"a\":");
        call.finalize("{\"a\":1}");
        assert_eq!(call.arguments, "{\"a\":1}");
    }

    #[test]
    fn finalize_appends_trailing_fragment() {
        let mut call = FunctionCall::new("c", None);
        call.arguments.push_str("{\"a\":1");
        call.finalize(",\"b\":2}");
        assert_eq!(call.arguments, "{\"a\":1,\"b\":2}");
    }

    #[test]
    fn finalize_keeps_fragments_on_empty_done() {
        let mut call = FunctionCall::new("c", None);
        call.arguments.push_str("{}");
        call.finalize("");
        assert_eq!(call.arguments, "{}");
    }

    #[test]
    fn only_active_states_stream_audio() {
        assert!(SessionState::Idle.streams_audio());
        assert!(SessionState::Responding.streams_audio());
        assert!(!SessionState::Configuring.streams_audio());
        assert!(!SessionState::Closed.streams_audio());
    }
}
