//! Score mapping and validation
//!
//! Converts a merged raw score mapping into the record shape the SciDash
//! upload endpoint accepts, or reports why it cannot.

use serde_json::{Map, Value};

use crate::normalizer::strip_identity_markers;
use crate::record::{get_field, CanonicalRecord};

/// Identity marker carrying an object's class path
const CLASS_MARKER: &str = "py/object";

/// Optional score fields copied through when present
const PASSTHROUGH_FIELDS: [&str; 4] = ["sort_key", "norm_score", "summary", "related_data"];

/// Semantic mapping from a merged raw score to an upload record.
///
/// Returns the mapped record, or human-readable validation errors. A mapped
/// record must carry a `test_instance` mapping.
pub trait ScoreMapper {
    fn convert(&self, raw: Map<String, Value>) -> Result<CanonicalRecord, Vec<String>>;
}

/// Default mapper for sciunit-style score documents
///
/// Requires `score`, `test` and `model`; produces `test_instance` and
/// `model_instance` from the latter two, with class paths taken from their
/// identity markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralMapper;

impl ScoreMapper for StructuralMapper {
    fn convert(&self, raw: Map<String, Value>) -> Result<CanonicalRecord, Vec<String>> {
        let score_class = class_name(&raw);
        let test_class = get_field(&raw, "test").and_then(Value::as_object).and_then(class_name);
        let model_class = get_field(&raw, "model").and_then(Value::as_object).and_then(class_name);

        let plain = match strip_identity_markers(Value::Object(raw)) {
            Value::Object(plain) => plain,
            _ => return Err(vec!["score: expected a mapping".to_string()]),
        };

        let mut errors = Vec::new();

        let score = match plain.get("score") {
            Some(value) if !value.is_null() => Some(value.clone()),
            _ => {
                errors.push("score: field is required".to_string());
                None
            }
        };
        let test = required_mapping(&plain, "test", &mut errors);
        let model = required_mapping(&plain, "model", &mut errors);

        let (Some(score), Some(mut test), Some(mut model)) = (score, test, model) else {
            return Err(errors);
        };

        if let Some(class) = test_class {
            test.insert("test_class".to_string(), Value::String(class));
        }
        if let Some(class) = model_class {
            model.insert("model_class".to_string(), Value::String(class));
        }

        let mut record = Map::new();
        record.insert("score".to_string(), score);
        if let Some(class) = score_class {
            record.insert("score_class".to_string(), Value::String(class));
        }
        for field in PASSTHROUGH_FIELDS {
            if let Some(value) = plain.get(field) {
                record.insert(field.to_string(), value.clone());
            }
        }
        record.insert("test_instance".to_string(), Value::Object(test));
        record.insert("model_instance".to_string(), Value::Object(model));

        Ok(CanonicalRecord::new(record))
    }
}

fn class_name(map: &Map<String, Value>) -> Option<String> {
    map.get(CLASS_MARKER).and_then(Value::as_str).map(str::to_string)
}

fn required_mapping(
    plain: &Map<String, Value>,
    field: &str,
    errors: &mut Vec<String>,
) -> Option<Map<String, Value>> {
    match plain.get(field) {
        Some(Value::Object(map)) => Some(map.clone()),
        None | Some(Value::Null) => {
            errors.push(format!("{}: field is required", field));
            None
        }
        Some(_) => {
            errors.push(format!("{}: expected a mapping", field));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_flat_score_is_mapped() {
        let record = StructuralMapper
            .convert(map(json!({
                "score": 0.8,
                "sort_key": 0.9,
                "test": {"name": "RestingPotentialTest"},
                "model": {"name": "Izhikevich"},
                "related_data": {"trace": [1, 2]}
            })))
            .unwrap();

        assert_eq!(record.get("score"), Some(&json!(0.8)));
        assert_eq!(record.get("sort_key"), Some(&json!(0.9)));
        assert_eq!(record.get("related_data"), Some(&json!({"trace": [1, 2]})));
        assert_eq!(record.get("test_instance"), Some(&json!({"name": "RestingPotentialTest"})));
        assert_eq!(record.get("model_instance"), Some(&json!({"name": "Izhikevich"})));
    }

    #[test]
    fn test_wrapped_score_keeps_class_paths() {
        let record = StructuralMapper
            .convert(map(json!({
                "py/object": "sciunit.scores.ZScore",
                "py/state": {
                    "score": -1.2,
                    "test": {"py/object": "neuronunit.tests.RheobaseTest", "py/state": {"name": "rheobase"}},
                    "model": {"name": "cell"}
                }
            })))
            .unwrap();

        assert_eq!(record.get("score_class"), Some(&json!("sciunit.scores.ZScore")));
        assert_eq!(
            record.get("test_instance"),
            Some(&json!({"name": "rheobase", "test_class": "neuronunit.tests.RheobaseTest"}))
        );
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let errors = StructuralMapper
            .convert(map(json!({"model": "not-a-mapping"})))
            .unwrap_err();

        assert_eq!(
            errors,
            vec![
                "score: field is required".to_string(),
                "test: field is required".to_string(),
                "model: expected a mapping".to_string(),
            ]
        );
    }
}
