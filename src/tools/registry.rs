//! Function dispatch registry
//!
//! Maps function names to a declared schema and a typed async handler.
//! Arguments are validated against the schema and deserialized into the
//! handler's argument type before the handler runs, so handlers never see
//! shapes they did not ask for.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

use super::schema::ParameterSchema;

/// Failure of a single dispatched call
///
/// Always reported back to the remote service as the call's output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No function registered under this name
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Arguments do not satisfy the function's schema
    #[error("invalid arguments for {function}: {}", reasons.join("; "))]
    SchemaViolation {
        function: String,
        reasons: Vec<String>,
    },

    /// The handler ran and failed
    #[error("{function} failed: {message}")]
    HandlerFailure { function: String, message: String },
}

impl DispatchError {
    /// Stable identifier for the failure class
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownFunction(_) => "unknown_function",
            Self::SchemaViolation { .. } => "schema_violation",
            Self::HandlerFailure { .. } => "handler_failure",
        }
    }

    /// Structured output sent to the remote service in place of a result
    #[must_use]
    pub fn to_output(&self) -> Value {
        json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        })
    }
}

/// Name, description and input contract of a callable function
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

impl FunctionSpec {
    /// Create a function spec
    #[must_use]
    pub fn new(name: &str, description: &str, parameters: ParameterSchema) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    /// Tool definition advertised in the session configuration
    #[must_use]
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.to_json(),
        }
    }
}

/// Tool entry of the session configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

type BoxedHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, DispatchError>> + Send + Sync>;

struct Registered {
    spec: FunctionSpec,
    handler: BoxedHandler,
}

/// Registry of callable functions
#[derive(Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Registered>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FunctionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `spec.name`, replacing any previous entry
    ///
    /// The handler receives its arguments deserialized as `A`; its output is
    /// serialized to JSON and its error rendered with `Display`.
    pub fn register<A, F, Fut, T, E>(&mut self, spec: FunctionSpec, handler: F)
    where
        A: DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize + Send,
        E: Display + Send,
    {
        let key = spec.name.clone();
        let name = spec.name.clone();
        let handler = Arc::new(handler);

        let boxed: BoxedHandler = Arc::new(move |args: Value| {
            let function = name.clone();
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let typed: A =
                    serde_json::from_value(args).map_err(|e| DispatchError::SchemaViolation {
                        function: function.clone(),
                        reasons: vec![e.to_string()],
                    })?;

                let output = (*handler)(typed)
                    .await
                    .map_err(|e| DispatchError::HandlerFailure {
                        function: function.clone(),
                        message: e.to_string(),
                    })?;

                serde_json::to_value(output).map_err(|e| DispatchError::HandlerFailure {
                    function,
                    message: format!("unserializable output: {e}"),
                })
            })
        });

        if self
            .functions
            .insert(key.clone(), Registered { spec, handler: boxed })
            .is_some()
        {
            tracing::warn!(function = %key, "function re-registered");
        }
    }

    /// Whether `name` is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered function names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Spec of a registered function
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.get(name).map(|r| &r.spec)
    }

    /// Tool definitions for every registered function, sorted by name
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.functions.values().map(|r| r.spec.definition()).collect()
    }

    /// Validate `args` and run the named function
    ///
    /// # Errors
    ///
    /// `UnknownFunction`, `SchemaViolation` or `HandlerFailure`
    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value, DispatchError> {
        let registered = self
            .functions
            .get(name)
            .ok_or_else(|| DispatchError::UnknownFunction(name.to_string()))?;

        registered
            .spec
            .parameters
            .validate(&args)
            .map_err(|reasons| DispatchError::SchemaViolation {
                function: name.to_string(),
                reasons,
            })?;

        let handler = Arc::clone(&registered.handler);
        tracing::debug!(function = name, "invoking function");
        (*handler)(args).await
    }

    /// Parse a raw argument payload and run the named function
    ///
    /// An empty payload is treated as `{}`.
    ///
    /// # Errors
    ///
    /// `UnknownFunction`, `SchemaViolation` (including unparseable JSON) or
    /// `HandlerFailure`
    pub async fn invoke_raw(&self, name: &str, raw: &str) -> Result<Value, DispatchError> {
        if !self.contains(name) {
            return Err(DispatchError::UnknownFunction(name.to_string()));
        }

        let args = if raw.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(raw).map_err(|e| DispatchError::SchemaViolation {
                function: name.to_string(),
                reasons: vec![format!("arguments are not valid JSON: {e}")],
            })?
        };

        self.invoke(name, args).await
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::super::schema::Parameter;
    use super::*;

    #[derive(Deserialize)]
    struct AddArgs {
        a: i64,
        b: i64,
    }

    fn registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        registry.register(
            FunctionSpec::new(
                "add",
                "Add two numbers",
                ParameterSchema::new()
                    .param(Parameter::integer("a", "left").required())
                    .param(Parameter::integer("b", "right").required()),
            ),
            |args: AddArgs| async move { Ok::<_, String>(args.a + args.b) },
        );
        registry.register(
            FunctionSpec::new("fail", "Always fails", ParameterSchema::new()),
            |_: Value| async move { Err::<(), _>("disk on fire") },
        );
        registry
    }

    #[tokio::test]
    async fn invokes_handler_with_typed_arguments() {
        let out = registry().invoke("add", json!({"a": 1, "b": 2})).await.unwrap();
        assert_eq!(out, json!(3));
    }

    #[tokio::test]
    async fn unknown_function() {
        let err = registry().invoke("nope", json!({})).await.unwrap_err();
        assert_eq!(err, DispatchError::UnknownFunction("nope".to_string()));
        assert_eq!(err.to_output()["error"]["kind"], "unknown_function");
    }

    #[tokio::test]
    async fn schema_violation_before_handler() {
        let err = registry().invoke("add", json!({"a": "1"})).await.unwrap_err();
        let DispatchError::SchemaViolation { function, reasons } = err else {
            panic!("expected schema violation");
        };
        assert_eq!(function, "add");
        assert_eq!(reasons.len(), 2);
    }

    #[tokio::test]
    async fn raw_payload_must_be_json() {
        let err = registry().invoke_raw("add", "{\"a\":1,").await.unwrap_err();
        assert_eq!(err.kind(), "schema_violation");
    }

    #[tokio::test]
    async fn empty_raw_payload_is_empty_object() {
        let err = registry().invoke_raw("fail", "").await.unwrap_err();
        assert_eq!(
            err,
            DispatchError::HandlerFailure {
                function: "fail".to_string(),
                message: "disk on fire".to_string(),
            }
        );
    }

    #[test]
    fn definitions_are_sorted_function_tools() {
        let defs = registry().definitions();
        let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["add", "fail"]);
        assert!(defs.iter().all(|d| d.tool_type == "function"));
        assert_eq!(defs[0].parameters["required"], json!(["a", "b"]));
    }
}
