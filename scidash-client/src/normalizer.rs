//! Object normalization
//!
//! Turns an input of unknown representation into a canonical mapping.
//! The shape is resolved once, here, through the [`RawObject`] tagged union;
//! everything downstream works on `serde_json::Map` only.
//!
//! # Supported shapes
//! - Serialized text: parsed as a JSON document
//! - Mapping: returned as-is, or stripped of markers for plain data
//! - Self-describing object: asked for its mapping via [`Describe`]
//! - Any `Serialize` value: reflected through serde, then filtered with the
//!   same [`MappingOptions`] a self-describing object would receive

use std::borrow::Cow;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::{CanonicalRecord, STATE_KEY};

/// Prefix shared by all identity markers (`py/object`, `py/state`, ...)
const MARKER_PREFIX: &str = "py/";

/// Markers whose payload is a plain sequence
const SEQUENCE_MARKERS: [&str; 2] = ["py/tuple", "py/set"];

/// Flags passed to the to-mapping capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingOptions {
    /// Include derived (computed) properties
    pub include_derived: bool,
    /// Ask for a textual rendering instead of a structured one
    pub stringify: bool,
    /// Keep `py/` identity markers and state containers
    pub preserve_identity: bool,
    /// Emit references for repeated objects instead of inlining them
    pub make_refs: bool,
}

impl MappingOptions {
    /// Options for plain data: identity markers stripped, references inlined
    pub fn plain() -> Self {
        Self {
            preserve_identity: false,
            ..Self::default()
        }
    }
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            include_derived: true,
            stringify: false,
            preserve_identity: true,
            make_refs: false,
        }
    }
}

/// To-mapping capability of a self-describing object
pub trait Describe {
    /// Render this object as a JSON value, honouring `options`.
    ///
    /// The value must be a JSON object; anything else is rejected by the
    /// normalizer as malformed.
    fn describe(&self, options: &MappingOptions) -> Result<Value>;
}

/// An input whose representation has not been resolved yet
pub enum RawObject<'a> {
    /// Serialized document
    Text(Cow<'a, str>),
    /// Already-normalized mapping
    Mapping(Map<String, Value>),
    /// Object exposing the to-mapping capability
    Described(&'a dyn Describe),
    /// Generic object captured through serde
    Reflected(Value),
}

impl<'a> RawObject<'a> {
    /// Capture any serializable value through the generic reflective path
    pub fn reflect<T: Serialize + ?Sized>(object: &T) -> Result<Self> {
        Ok(RawObject::Reflected(serde_json::to_value(object)?))
    }

    fn kind(&self) -> &'static str {
        match self {
            RawObject::Text(_) => "text",
            RawObject::Mapping(_) => "mapping",
            RawObject::Described(_) => "described",
            RawObject::Reflected(_) => "reflected",
        }
    }
}

impl std::fmt::Debug for RawObject<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawObject::Text(text) => f.debug_tuple("Text").field(text).finish(),
            RawObject::Mapping(map) => f.debug_tuple("Mapping").field(map).finish(),
            RawObject::Described(_) => f.write_str("Described(..)"),
            RawObject::Reflected(value) => f.debug_tuple("Reflected").field(value).finish(),
        }
    }
}

impl<'a> From<&'a str> for RawObject<'a> {
    fn from(text: &'a str) -> Self {
        RawObject::Text(Cow::Borrowed(text))
    }
}

impl From<String> for RawObject<'_> {
    fn from(text: String) -> Self {
        RawObject::Text(Cow::Owned(text))
    }
}

impl From<Map<String, Value>> for RawObject<'_> {
    fn from(map: Map<String, Value>) -> Self {
        RawObject::Mapping(map)
    }
}

impl From<Value> for RawObject<'_> {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => RawObject::Mapping(map),
            Value::String(text) => RawObject::Text(Cow::Owned(text)),
            other => RawObject::Reflected(other),
        }
    }
}

impl<'a, T: Describe> From<&'a T> for RawObject<'a> {
    fn from(object: &'a T) -> Self {
        RawObject::Described(object)
    }
}

/// Normalize an input into a canonical mapping.
///
/// With `preserve_identity` off, identity markers are stripped whatever the
/// input shape. Pure: the input is consumed, nothing else is touched.
pub fn normalize(raw: RawObject<'_>, options: &MappingOptions) -> Result<Map<String, Value>> {
    debug!(kind = raw.kind(), "Normalizing object");

    let value = match raw {
        RawObject::Mapping(map) if options.preserve_identity => return Ok(map),
        RawObject::Mapping(map) => Value::Object(map),
        RawObject::Text(text) => serde_json::from_str::<Value>(&text)?,
        RawObject::Described(object) => object.describe(options)?,
        RawObject::Reflected(value) => value,
    };

    let value = if options.preserve_identity {
        value
    } else {
        strip_identity_markers(value)
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::MalformedInput(format!(
            "expected a mapping, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Normalize with default options and resolve the record layout
pub fn normalize_record(raw: RawObject<'_>) -> Result<CanonicalRecord> {
    normalize(raw, &MappingOptions::default()).map(CanonicalRecord::new)
}

/// Recursively turn a marked-up value into plain data.
///
/// State containers are unwrapped into their parent, sequence markers become
/// arrays, and every other `py/` key is dropped.
pub fn strip_identity_markers(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            if let Some(state) = map.remove(STATE_KEY) {
                return strip_identity_markers(state);
            }
            for marker in SEQUENCE_MARKERS {
                if let Some(items) = map.remove(marker) {
                    return strip_identity_markers(items);
                }
            }
            Value::Object(
                map.into_iter()
                    .filter(|(key, _)| !key.starts_with(MARKER_PREFIX))
                    .map(|(key, value)| (key, strip_identity_markers(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(strip_identity_markers).collect()),
        other => other,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
