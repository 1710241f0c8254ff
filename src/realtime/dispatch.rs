//! Function call execution off the event loop

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::tools::{DispatchError, FunctionRegistry};

/// Result of a dispatched function call, delivered back to the session
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub call_id: String,
    pub name: String,
    pub output: std::result::Result<Value, DispatchError>,
}

impl CallOutcome {
    /// Output string sent as the call's `function_call_output`
    ///
    /// String results are sent as-is; other values and failures as JSON.
    #[must_use]
    pub fn wire_output(&self) -> String {
        match &self.output {
            Ok(Value::String(s)) => s.clone(),
            Ok(value) => value.to_string(),
            Err(e) => e.to_output().to_string(),
        }
    }
}

/// Runs each call as its own task and reports outcomes over a channel
///
/// Handler panics are reported as `HandlerFailure`. Dropping the outcome
/// receiver discards any result that arrives later.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<FunctionRegistry>,
    outcomes: mpsc::UnboundedSender<CallOutcome>,
    tasks: HashMap<String, AbortHandle>,
}

impl Dispatcher {
    /// Create a dispatcher and the receiver its outcomes arrive on
    #[must_use]
    pub fn new(registry: Arc<FunctionRegistry>) -> (Self, mpsc::UnboundedReceiver<CallOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                registry,
                outcomes: tx,
                tasks: HashMap::new(),
            },
            rx,
        )
    }

    /// Registry calls are dispatched to
    #[must_use]
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Start executing a call
    pub fn dispatch(&mut self, call_id: &str, name: &str, arguments: String) {
        let registry = Arc::clone(&self.registry);
        let function = name.to_string();
        let inner = tokio::spawn(async move { registry.invoke_raw(&function, &arguments).await });
        self.tasks.insert(call_id.to_string(), inner.abort_handle());

        let outcomes = self.outcomes.clone();
        let call_id = call_id.to_string();
        let name = name.to_string();
        tokio::spawn(async move {
            let output = match inner.await {
                Ok(output) => output,
                Err(e) if e.is_cancelled() => {
                    tracing::debug!(call_id = %call_id, function = %name, "function call aborted");
                    return;
                }
                Err(e) => Err(DispatchError::HandlerFailure {
                    function: name.clone(),
                    message: format!("handler panicked: {e}"),
                }),
            };

            if let Err(e) = &output {
                tracing::warn!(call_id = %call_id, function = %name, kind = e.kind(), error = %e, "function call failed");
            } else {
                tracing::debug!(call_id = %call_id, function = %name, "function call finished");
            }

            if outcomes
                .send(CallOutcome {
                    call_id,
                    name,
                    output,
                })
                .is_err()
            {
                tracing::debug!("session gone, discarding function result");
            }
        });
    }

    /// Forget the task of a call whose outcome has been consumed
    pub fn finished(&mut self, call_id: &str) {
        self.tasks.remove(call_id);
    }

    /// Calls still running or not yet consumed
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Abort every running call
    pub fn abort_all(&mut self) {
        let aborted = self.tasks.len();
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
        if aborted > 0 {
            tracing::debug!(aborted, "aborted in-flight function calls");
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::tools::{FunctionSpec, ParameterSchema};

    fn registry() -> Arc<FunctionRegistry> {
        let mut registry = FunctionRegistry::new();
        registry.register(
            FunctionSpec::new("echo", "Echo arguments", ParameterSchema::new()),
            |args: Value| async move { Ok::<_, String>(args) },
        );
        registry.register(
            FunctionSpec::new("boom", "Panics", ParameterSchema::new()),
            |args: Value| async move {
                assert!(args.is_null(), "handler bug");
                Ok::<Value, String>(args)
            },
        );
        registry.register(
            FunctionSpec::new("slow", "Never finishes in time", ParameterSchema::new()),
            |_: Value| async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok::<Value, String>(Value::Null)
            },
        );
        Arc::new(registry)
    }

    #[tokio::test]
    async fn delivers_outcome() {
        let (mut dispatcher, mut outcomes) = Dispatcher::new(registry());
        dispatcher.dispatch("call_1", "echo", "{}".to_string());

        let outcome = outcomes.recv().await.unwrap();
        assert_eq!(outcome.call_id, "call_1");
        assert_eq!(outcome.output, Ok(json!({})));
        assert_eq!(outcome.wire_output(), "{}");
    }

    #[tokio::test]
    async fn panics_become_handler_failures() {
        let (mut dispatcher, mut outcomes) = Dispatcher::new(registry());
        dispatcher.dispatch("call_1", "boom", String::new());

        let outcome = outcomes.recv().await.unwrap();
        assert_eq!(outcome.output.unwrap_err().kind(), "handler_failure");
    }

    #[tokio::test]
    async fn aborted_calls_report_nothing() {
        let (mut dispatcher, mut outcomes) = Dispatcher::new(registry());
        dispatcher.dispatch("call_1", "slow", String::new());
        assert_eq!(dispatcher.in_flight(), 1);

        dispatcher.abort_all();
        drop(dispatcher);

        assert!(outcomes.recv().await.is_none());
    }

    #[test]
    fn string_results_are_sent_raw() {
        let outcome = CallOutcome {
            call_id: "c".to_string(),
            name: "f".to_string(),
            output: Ok(json!("plain text")),
        };
        assert_eq!(outcome.wire_output(), "plain text");
    }
}
