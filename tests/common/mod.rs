//! Shared test utilities
//!
//! Drives a [`SessionMachine`] with scripted server events, without a socket
//! or audio hardware.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use beacon_realtime::realtime::{
    CallOutcome, ClientEvent, Dispatcher, ServerEvent, SessionConfig, SessionMachine, SessionState,
};
use beacon_realtime::tools::{FunctionRegistry, FunctionSpec, Parameter, ParameterSchema};
use beacon_realtime::voice::{AudioFrame, PlaybackQueue};
use serde_json::{Value, json};
use tokio::sync::mpsc;

/// Arguments each `record` invocation received
pub type Recorded = Arc<Mutex<Vec<Value>>>;

/// Registry with test functions
///
/// - `record`: stores its arguments and answers `{"ok": true}`
/// - `slow`: never finishes within a test
pub fn test_registry(recorded: &Recorded) -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();

    let log = Arc::clone(recorded);
    registry.register(
        FunctionSpec::new(
            "record",
            "Record the arguments",
            ParameterSchema::new()
                .param(Parameter::integer("a", "First value"))
                .param(Parameter::integer("b", "Second value"))
                .param(Parameter::string("text", "Some text")),
        ),
        move |args: Value| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(args);
                Ok::<_, String>(json!({ "ok": true }))
            }
        },
    );

    registry.register(
        FunctionSpec::new("slow", "Takes a long time", ParameterSchema::new()),
        |_: Value| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, String>(Value::Null)
        },
    );

    registry
}

/// A session machine wired to in-memory channels
pub struct Harness {
    pub machine: SessionMachine,
    pub sent: mpsc::Receiver<ClientEvent>,
    pub outcomes: mpsc::UnboundedReceiver<CallOutcome>,
    pub queue: PlaybackQueue,
    pub recorded: Recorded,
}

impl Harness {
    /// A machine in `Connecting`
    pub fn new() -> Self {
        let recorded: Recorded = Arc::default();
        let registry = Arc::new(test_registry(&recorded));
        let (dispatcher, outcomes) = Dispatcher::new(registry);
        let (tx, sent) = mpsc::channel(1024);
        let queue = PlaybackQueue::new();
        let machine = SessionMachine::new(tx, queue.clone(), dispatcher);
        Self {
            machine,
            sent,
            outcomes,
            queue,
            recorded,
        }
    }

    /// A configured machine in `Idle` with nothing sent yet
    pub async fn ready() -> Self {
        let mut harness = Self::new();
        harness
            .machine
            .start(session_config())
            .await
            .expect("start session");
        harness
            .feed(json!({ "type": "session.created", "session": { "id": "sess_1" } }))
            .await;
        harness
            .feed(json!({ "type": "session.updated", "session": { "id": "sess_1" } }))
            .await;
        assert_eq!(harness.machine.state(), SessionState::Idle);
        harness.drain();
        harness
    }

    /// Decode and handle one server event, panicking on error
    pub async fn feed(&mut self, event: Value) {
        self.try_feed(event).await.expect("event handled");
    }

    /// Decode and handle one server event
    pub async fn try_feed(&mut self, event: Value) -> beacon_realtime::Result<()> {
        let event = ServerEvent::decode(&event.to_string()).expect("valid server event");
        self.machine.handle(event).await
    }

    /// Client events sent since the last drain
    pub fn drain(&mut self) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.sent.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wire names of client events sent since the last drain
    pub fn drain_names(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(ClientEvent::name).collect()
    }

    /// Wait for the next dispatched call to finish
    pub async fn next_outcome(&mut self) -> CallOutcome {
        tokio::time::timeout(Duration::from_secs(5), self.outcomes.recv())
            .await
            .expect("outcome in time")
            .expect("dispatcher alive")
    }

    /// Wait for the next outcome and hand it to the machine
    pub async fn deliver_next_outcome(&mut self) {
        let outcome = self.next_outcome().await;
        self.machine
            .complete_call(outcome)
            .await
            .expect("outcome delivered");
    }

    /// User speaks and stops; a response is requested
    pub async fn user_turn(&mut self) {
        self.feed(speech_started()).await;
        self.feed(speech_stopped()).await;
    }

    /// Number of `record` invocations so far
    pub fn record_count(&self) -> usize {
        self.recorded.lock().unwrap().len()
    }
}

/// Minimal session configuration
pub fn session_config() -> SessionConfig {
    let settings = beacon_realtime::config::RealtimeSettings::default();
    beacon_realtime::realtime::build_session_config(
        &beacon_realtime::Personalization::default(),
        &[],
        &settings,
    )
}

pub fn speech_started() -> Value {
    json!({ "type": "input_audio_buffer.speech_started", "audio_start_ms": 100, "item_id": "item_user" })
}

pub fn speech_stopped() -> Value {
    json!({ "type": "input_audio_buffer.speech_stopped", "audio_end_ms": 900, "item_id": "item_user" })
}

pub fn response_created(id: &str) -> Value {
    json!({ "type": "response.created", "response": { "id": id, "status": "in_progress" } })
}

pub fn response_done(id: &str) -> Value {
    json!({ "type": "response.done", "response": { "id": id, "status": "completed" } })
}

/// Audio delta carrying `samples` samples of a constant tone
pub fn audio_delta(response_id: &str, item_id: &str, samples: usize) -> Value {
    let frame = AudioFrame::inbound(0, vec![1000; samples]);
    json!({
        "type": "response.audio.delta",
        "response_id": response_id,
        "item_id": item_id,
        "output_index": 0,
        "content_index": 0,
        "delta": frame.to_base64(),
    })
}

pub fn function_call_item(response_id: &str, call_id: &str, name: &str) -> Value {
    json!({
        "type": "response.output_item.added",
        "response_id": response_id,
        "output_index": 0,
        "item": { "id": format!("item_{call_id}"), "type": "function_call", "call_id": call_id, "name": name },
    })
}

pub fn arguments_delta(response_id: &str, call_id: &str, delta: &str) -> Value {
    json!({
        "type": "response.function_call_arguments.delta",
        "response_id": response_id,
        "call_id": call_id,
        "delta": delta,
    })
}

pub fn arguments_done(response_id: &str, call_id: &str, name: &str, arguments: &str) -> Value {
    json!({
        "type": "response.function_call_arguments.done",
        "response_id": response_id,
        "call_id": call_id,
        "name": name,
        "arguments": arguments,
    })
}

/// `event_id` of the `response.create` in `events`, if any
pub fn create_event_id(events: &[ClientEvent]) -> Option<String> {
    events.iter().find_map(|e| match e {
        ClientEvent::ResponseCreate { event_id } => Some(event_id.clone()),
        _ => None,
    })
}
