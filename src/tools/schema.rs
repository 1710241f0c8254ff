//! Declared parameter schemas for callable functions
//!
//! A [`ParameterSchema`] is the single source of truth for a function's
//! input: it renders the JSON Schema advertised to the model and validates
//! the arguments the model sends back.

use serde::Serialize;
use serde_json::{Map, Value, json};

/// JSON type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// A single named parameter
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    kind: ParamKind,
    description: String,
    required: bool,
    minimum: Option<f64>,
    maximum: Option<f64>,
    choices: Vec<String>,
    default: Option<Value>,
}

impl Parameter {
    fn new(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: false,
            minimum: None,
            maximum: None,
            choices: Vec::new(),
            default: None,
        }
    }

    /// A string parameter
    #[must_use]
    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::String, description)
    }

    /// An integer parameter
    #[must_use]
    pub fn integer(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::Integer, description)
    }

    /// A floating point parameter
    #[must_use]
    pub fn number(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::Number, description)
    }

    /// A boolean parameter
    #[must_use]
    pub fn boolean(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::Boolean, description)
    }

    /// Mark the parameter as required
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Inclusive numeric bounds
    #[must_use]
    pub const fn range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    /// Restrict a string parameter to a fixed set of values
    #[must_use]
    pub fn one_of<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Default advertised to the model when the parameter is omitted
    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Parameter name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn to_json(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".to_string(), json!(self.kind));
        prop.insert("description".to_string(), json!(self.description));
        if let Some(min) = self.minimum {
            prop.insert("minimum".to_string(), number_json(min));
        }
        if let Some(max) = self.maximum {
            prop.insert("maximum".to_string(), number_json(max));
        }
        if !self.choices.is_empty() {
            prop.insert("enum".to_string(), json!(self.choices));
        }
        if let Some(default) = &self.default {
            prop.insert("default".to_string(), default.clone());
        }
        Value::Object(prop)
    }

    fn check(&self, value: &Value, problems: &mut Vec<String>) {
        if !self.kind.matches(value) {
            problems.push(format!(
                "`{}` must be of type {}",
                self.name,
                self.kind.name()
            ));
            return;
        }

        if let Some(n) = value.as_f64()
            && (self.minimum.is_some_and(|min| n < min) || self.maximum.is_some_and(|max| n > max))
        {
            problems.push(format!(
                "`{}` must be between {} and {}",
                self.name,
                self.minimum.map_or_else(|| "-inf".to_string(), |v| v.to_string()),
                self.maximum.map_or_else(|| "inf".to_string(), |v| v.to_string()),
            ));
        }

        if let Some(s) = value.as_str()
            && !self.choices.is_empty()
            && !self.choices.iter().any(|c| c == s)
        {
            problems.push(format!(
                "`{}` must be one of: {}",
                self.name,
                self.choices.join(", ")
            ));
        }
    }
}

/// Integral bounds render as JSON integers
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn number_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

/// The object schema of a function's arguments
///
/// Unknown properties are rejected.
#[derive(Debug, Clone, Default)]
pub struct ParameterSchema {
    params: Vec<Parameter>,
}

impl ParameterSchema {
    /// An empty schema (function takes no arguments)
    #[must_use]
    pub const fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add a parameter
    #[must_use]
    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    /// Declared parameters
    #[must_use]
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Render as JSON Schema
    #[must_use]
    pub fn to_json(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.clone(), p.to_json()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Validate arguments against the schema
    ///
    /// `null` counts as absent for optional parameters.
    ///
    /// # Errors
    ///
    /// Returns every problem found, in declaration order
    pub fn validate(&self, args: &Value) -> Result<(), Vec<String>> {
        let Some(object) = args.as_object() else {
            return Err(vec!["arguments must be a JSON object".to_string()]);
        };

        let mut problems = Vec::new();

        for key in object.keys() {
            if !self.params.iter().any(|p| &p.name == key) {
                problems.push(format!("unexpected property `{key}`"));
            }
        }

        for param in &self.params {
            match object.get(&param.name) {
                None | Some(Value::Null) => {
                    if param.required {
                        problems.push(format!("missing required property `{}`", param.name));
                    }
                }
                Some(value) => param.check(value, &mut problems),
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}
