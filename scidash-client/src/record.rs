//! Canonical score records and layout-aware field access
//!
//! A normalized record keeps its fields either at the top level (flat) or
//! inside the reserved `py/state` container (wrapped). Every read and write
//! goes through [`RecordLayout`] so the container probe lives in one place.

use serde_json::{Map, Value};

use crate::error::Result;

/// Reserved container key of the wrapped layout
pub const STATE_KEY: &str = "py/state";

/// Where a record's fields live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    /// Fields at the top level
    Flat,
    /// Fields inside the `py/state` container
    Wrapped,
}

impl RecordLayout {
    /// Probe a mapping for the state container.
    ///
    /// Only a mapping under `py/state` counts as a container.
    pub fn detect(map: &Map<String, Value>) -> Self {
        match map.get(STATE_KEY) {
            Some(Value::Object(_)) => RecordLayout::Wrapped,
            _ => RecordLayout::Flat,
        }
    }

    /// Read a field under this layout
    pub fn get<'a>(self, map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
        match self {
            RecordLayout::Flat => map.get(key),
            RecordLayout::Wrapped => map.get(STATE_KEY)?.as_object()?.get(key),
        }
    }

    /// Mutable access to a field under this layout
    pub fn get_mut<'a>(self, map: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut Value> {
        match self {
            RecordLayout::Flat => map.get_mut(key),
            RecordLayout::Wrapped => map.get_mut(STATE_KEY)?.as_object_mut()?.get_mut(key),
        }
    }

    /// Write a field under this layout, replacing any previous value
    pub fn set(self, map: &mut Map<String, Value>, key: impl Into<String>, value: Value) {
        if self == RecordLayout::Wrapped {
            let state = map
                .entry(STATE_KEY)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(state) = state {
                state.insert(key.into(), value);
                return;
            }
        }
        map.insert(key.into(), value);
    }
}

/// Layout-aware read on a mapping whose layout is not yet known
pub fn get_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    RecordLayout::detect(map).get(map, key)
}

/// Layout-aware mutable access on a mapping whose layout is not yet known
pub fn get_field_mut<'a>(map: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut Value> {
    RecordLayout::detect(map).get_mut(map, key)
}

/// Layout-aware write on a mapping whose layout is not yet known
pub fn set_field(map: &mut Map<String, Value>, key: impl Into<String>, value: Value) {
    RecordLayout::detect(map).set(map, key, value)
}

/// Python-style truthiness: null, false, zero and empty containers are falsy
pub(crate) fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// A normalized test-score result with its layout resolved
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    fields: Map<String, Value>,
    layout: RecordLayout,
}

impl CanonicalRecord {
    /// Wrap a normalized mapping, detecting its layout once
    pub fn new(fields: Map<String, Value>) -> Self {
        let layout = RecordLayout::detect(&fields);
        Self { fields, layout }
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.layout.get(&self.fields, key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.layout.get_mut(&mut self.fields, key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.layout.set(&mut self.fields, key, value)
    }

    /// The whole mapping, container included
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    /// Compact JSON text used as the upload body
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.fields)?)
    }
}

impl From<Map<String, Value>> for CanonicalRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}
