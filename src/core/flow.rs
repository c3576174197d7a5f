//! Flow components and their per-run overrides ("tweaks").
//!
//! A flow is a pipeline of components on the remote service. Each component
//! exposes a list of tweaks; a tweak with a value is forwarded in the run
//! request, a tweak without one is left to the service's own default.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a tweak's raw text input is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TweakKind {
    Str,
    Int,
    Float,
    Json,
}

/// Input control a form should offer for a tweak kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweakInputKind {
    Text,
    Number,
}

impl TweakKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TweakKind::Str => "str",
            TweakKind::Int => "int",
            TweakKind::Float => "float",
            TweakKind::Json => "json",
        }
    }

    pub fn expected_input(self) -> TweakInputKind {
        match self {
            TweakKind::Str | TweakKind::Json => TweakInputKind::Text,
            TweakKind::Int | TweakKind::Float => TweakInputKind::Number,
        }
    }
}

impl TryFrom<&str> for TweakKind {
    type Error = TweakError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "str" => Ok(TweakKind::Str),
            "int" => Ok(TweakKind::Int),
            "float" => Ok(TweakKind::Float),
            "json" => Ok(TweakKind::Json),
            other => Err(TweakError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for TweakKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed tweak value as it is sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TweakValue {
    Str(String),
    Int(i64),
    Float(f64),
    Json(serde_json::Value),
}

impl TweakValue {
    /// Whether the value should be forwarded to the service. Empty strings
    /// and JSON nulls count as "not set".
    pub fn is_present(&self) -> bool {
        match self {
            TweakValue::Str(text) => !text.is_empty(),
            TweakValue::Int(_) | TweakValue::Float(_) => true,
            TweakValue::Json(serde_json::Value::Null) => false,
            TweakValue::Json(serde_json::Value::String(text)) => !text.is_empty(),
            TweakValue::Json(_) => true,
        }
    }

    pub fn kind(&self) -> TweakKind {
        match self {
            TweakValue::Str(_) => TweakKind::Str,
            TweakValue::Int(_) => TweakKind::Int,
            TweakValue::Float(_) => TweakKind::Float,
            TweakValue::Json(_) => TweakKind::Json,
        }
    }

    /// Convert a JSON default published by the catalog into a typed value.
    /// Strings are parsed with the same rules as user input.
    pub fn from_json(kind: TweakKind, value: &serde_json::Value) -> Result<Option<Self>, TweakError> {
        match (kind, value) {
            (_, serde_json::Value::Null) => Ok(None),
            (_, serde_json::Value::String(raw)) => parse_tweak_input(kind, raw),
            (TweakKind::Int, serde_json::Value::Number(number)) => number
                .as_i64()
                .map(|int| Some(TweakValue::Int(int)))
                .ok_or_else(|| TweakError::InvalidValue {
                    kind,
                    input: number.to_string(),
                }),
            (TweakKind::Float, serde_json::Value::Number(number)) => number
                .as_f64()
                .map(|float| Some(TweakValue::Float(float)))
                .ok_or_else(|| TweakError::InvalidValue {
                    kind,
                    input: number.to_string(),
                }),
            (TweakKind::Json, other) => Ok(Some(TweakValue::Json(other.clone()))),
            (TweakKind::Str, other) => Ok(Some(TweakValue::Str(other.to_string()))),
            (kind, other) => Err(TweakError::InvalidValue {
                kind,
                input: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TweakValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TweakValue::Str(text) => f.write_str(text),
            TweakValue::Int(int) => write!(f, "{int}"),
            TweakValue::Float(float) => write!(f, "{float}"),
            TweakValue::Json(json) => write!(f, "{json}"),
        }
    }
}

/// Parse raw user input for a tweak. Empty input means "not set".
pub fn parse_tweak_input(kind: TweakKind, raw: &str) -> Result<Option<TweakValue>, TweakError> {
    if raw.is_empty() {
        return Ok(None);
    }

    let invalid = || TweakError::InvalidValue {
        kind,
        input: raw.to_string(),
    };

    let value = match kind {
        TweakKind::Str => TweakValue::Str(raw.to_string()),
        TweakKind::Int => TweakValue::Int(raw.trim().parse::<i64>().map_err(|_| invalid())?),
        TweakKind::Float => {
            let float = raw.trim().parse::<f64>().map_err(|_| invalid())?;
            if !float.is_finite() {
                return Err(invalid());
            }
            TweakValue::Float(float)
        }
        TweakKind::Json => TweakValue::Json(serde_json::from_str(raw).map_err(|_| invalid())?),
    };
    Ok(Some(value))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tweak {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub value: Option<TweakValue>,
    pub kind: TweakKind,
}

impl Tweak {
    pub fn new(name: impl Into<String>, kind: TweakKind) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            description: None,
            value: None,
            kind,
        }
    }

    pub fn with_value(mut self, value: TweakValue) -> Self {
        self.value = Some(value);
        self
    }

    /// The value to forward, if one is set and non-empty.
    pub fn present_value(&self) -> Option<&TweakValue> {
        self.value.as_ref().filter(|value| value.is_present())
    }
}

/// An addressable node of a flow together with its tweaks, in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub id: String,
    pub tweaks: Vec<Tweak>,
}

impl Component {
    pub fn new(id: impl Into<String>, tweaks: Vec<Tweak>) -> Self {
        Self {
            id: id.into(),
            tweaks,
        }
    }

    pub fn tweak(&self, name: &str) -> Option<&Tweak> {
        self.tweaks.iter().find(|tweak| tweak.name == name)
    }

    /// Set (or clear, with empty input) the value of an existing tweak.
    pub fn set_override(&mut self, name: &str, raw: &str) -> Result<(), TweakError> {
        let component_id = self.id.clone();
        let tweak = self
            .tweaks
            .iter_mut()
            .find(|tweak| tweak.name == name)
            .ok_or_else(|| TweakError::UnknownTweak {
                component: component_id,
                name: name.to_string(),
            })?;
        tweak.value = parse_tweak_input(tweak.kind, raw)?;
        Ok(())
    }
}

/// Apply an override addressed by component id and tweak name. Only keys that
/// already exist in the flow definition are accepted.
pub fn apply_tweak_override(
    components: &mut [Component],
    component_id: &str,
    name: &str,
    raw: &str,
) -> Result<(), TweakError> {
    let component = components
        .iter_mut()
        .find(|component| component.id == component_id)
        .ok_or_else(|| TweakError::UnknownComponent(component_id.to_string()))?;
    component.set_override(name, raw)
}

/// Parse a `COMPONENT.NAME=VALUE` override spec as accepted on the command line.
pub fn parse_override_spec(spec: &str) -> Result<(&str, &str, &str), TweakError> {
    let malformed = || TweakError::MalformedOverride(spec.to_string());
    let (key, value) = spec.split_once('=').ok_or_else(malformed)?;
    let (component, name) = key.rsplit_once('.').ok_or_else(malformed)?;
    if component.is_empty() || name.is_empty() {
        return Err(malformed());
    }
    Ok((component, name, value))
}

/// A flow as known to the caller: its id, display name, and components.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub id: String,
    pub name: String,
    pub components: Vec<Component>,
}

impl Flow {
    pub fn tweaks(&self) -> impl Iterator<Item = &Tweak> {
        self.components
            .iter()
            .flat_map(|component| component.tweaks.iter())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TweakError {
    UnknownKind(String),
    InvalidValue { kind: TweakKind, input: String },
    UnknownComponent(String),
    UnknownTweak { component: String, name: String },
    MalformedOverride(String),
}

impl fmt::Display for TweakError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TweakError::UnknownKind(kind) => write!(f, "Unknown tweak value type '{kind}'"),
            TweakError::InvalidValue { kind, input } => {
                write!(f, "'{input}' is not a valid {kind} value")
            }
            TweakError::UnknownComponent(id) => {
                write!(f, "Flow has no component named '{id}'")
            }
            TweakError::UnknownTweak { component, name } => {
                write!(f, "Component '{component}' has no tweak named '{name}'")
            }
            TweakError::MalformedOverride(spec) => write!(
                f,
                "Malformed override '{spec}'. Expected COMPONENT.NAME=VALUE"
            ),
        }
    }
}

impl std::error::Error for TweakError {}
