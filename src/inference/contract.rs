//! Prediction input contract.
//!
//! # Responsibilities
//! - Decide whether an untrusted JSON payload is a valid prediction request
//! - Coerce accepted numbers to `f64`
//! - Report every violation at once, located by JSON path
//!
//! # Design Decisions
//! - Validation runs on a parsed `serde_json::Value` rather than a typed
//!   `Deserialize`, so one pass can collect all element errors
//! - Length and element types are both checked before any numeric work
//! - Either the whole payload is accepted or nothing is

use axum::extract::rejection::JsonRejection;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::inference::FEATURE_COUNT;

/// A validated feature vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionInput {
    features: [f64; FEATURE_COUNT],
}

/// One segment of a violation location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LocSegment {
    Field(&'static str),
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    JsonInvalid,
    ContentType,
    ModelAttributesType,
    Missing,
    ListType,
    TooShort,
    TooLong,
    FloatType,
}

/// A single rule the payload broke.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub loc: Vec<LocSegment>,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
}

/// All violations found in one payload.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid prediction request ({} violation(s))", violations.len())]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    fn single(violation: Violation) -> Self {
        Self {
            violations: vec![violation],
        }
    }

    /// Map a body extraction failure onto the same error shape.
    pub fn from_rejection(rejection: &JsonRejection) -> Self {
        let (kind, msg) = match rejection {
            JsonRejection::MissingJsonContentType(_) => (
                ViolationKind::ContentType,
                "Expected request with `Content-Type: application/json`".to_string(),
            ),
            other => (ViolationKind::JsonInvalid, other.body_text()),
        };
        Self::single(Violation {
            kind,
            loc: vec![LocSegment::Field("body")],
            msg,
            input: None,
        })
    }
}

fn values_loc() -> Vec<LocSegment> {
    vec![LocSegment::Field("body"), LocSegment::Field("values")]
}

impl PredictionInput {
    /// Validate a parsed request body.
    pub fn validate(payload: &Value) -> Result<Self, ValidationError> {
        let Some(object) = payload.as_object() else {
            return Err(ValidationError::single(Violation {
                kind: ViolationKind::ModelAttributesType,
                loc: vec![LocSegment::Field("body")],
                msg: "Input should be a valid dictionary or object to extract fields from"
                    .to_string(),
                input: Some(payload.clone()),
            }));
        };

        let Some(values) = object.get("values") else {
            return Err(ValidationError::single(Violation {
                kind: ViolationKind::Missing,
                loc: values_loc(),
                msg: "Field required".to_string(),
                input: Some(payload.clone()),
            }));
        };

        let Some(items) = values.as_array() else {
            return Err(ValidationError::single(Violation {
                kind: ViolationKind::ListType,
                loc: values_loc(),
                msg: "Input should be a valid list".to_string(),
                input: Some(values.clone()),
            }));
        };

        let mut violations: Vec<Violation> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.as_f64().is_none())
            .map(|(index, item)| {
                let mut loc = values_loc();
                loc.push(LocSegment::Index(index));
                Violation {
                    kind: ViolationKind::FloatType,
                    loc,
                    msg: "Input should be a valid number".to_string(),
                    input: Some(item.clone()),
                }
            })
            .collect();

        if items.len() < FEATURE_COUNT {
            violations.push(Violation {
                kind: ViolationKind::TooShort,
                loc: values_loc(),
                msg: format!(
                    "List should have at least {FEATURE_COUNT} items after validation, not {}",
                    items.len()
                ),
                input: Some(values.clone()),
            });
        } else if items.len() > FEATURE_COUNT {
            violations.push(Violation {
                kind: ViolationKind::TooLong,
                loc: values_loc(),
                msg: format!(
                    "List should have at most {FEATURE_COUNT} items after validation, not {}",
                    items.len()
                ),
                input: Some(values.clone()),
            });
        }

        if !violations.is_empty() {
            return Err(ValidationError { violations });
        }

        let mut features = [0.0; FEATURE_COUNT];
        for (slot, item) in features.iter_mut().zip(items) {
            // Checked above: every element is a number.
            *slot = item.as_f64().unwrap_or_default();
        }
        Ok(Self { features })
    }

    pub fn features(&self) -> &[f64; FEATURE_COUNT] {
        &self.features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kinds(err: &ValidationError) -> Vec<ViolationKind> {
        err.violations.iter().map(|v| v.kind).collect()
    }

    #[test]
    fn test_accepts_four_numbers() {
        let input = PredictionInput::validate(&json!({"values": [5.1, 3.5, 1.4, 0.2]})).unwrap();
        assert_eq!(input.features(), &[5.1, 3.5, 1.4, 0.2]);
    }

    #[test]
    fn test_integers_are_coerced() {
        let input = PredictionInput::validate(&json!({"values": [5, 3, 1, 0]})).unwrap();
        assert_eq!(input.features(), &[5.0, 3.0, 1.0, 0.0]);
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let payload = json!({"values": [1, 2, 3, 4], "model": "iris"});
        assert!(PredictionInput::validate(&payload).is_ok());
    }

    #[test]
    fn test_too_short() {
        let err = PredictionInput::validate(&json!({"values": [1.0, 2.0, 3.0]})).unwrap_err();
        assert_eq!(kinds(&err), vec![ViolationKind::TooShort]);
        assert_eq!(
            err.violations[0].msg,
            "List should have at least 4 items after validation, not 3"
        );
    }

    #[test]
    fn test_empty_list_is_too_short() {
        let err = PredictionInput::validate(&json!({"values": []})).unwrap_err();
        assert_eq!(kinds(&err), vec![ViolationKind::TooShort]);
        assert!(err.violations[0].msg.ends_with("not 0"));
    }

    #[test]
    fn test_too_long() {
        let err = PredictionInput::validate(&json!({"values": [1, 2, 3, 4, 5]})).unwrap_err();
        assert_eq!(kinds(&err), vec![ViolationKind::TooLong]);
    }

    #[test]
    fn test_non_numeric_elements_are_located() {
        let err =
            PredictionInput::validate(&json!({"values": [1.0, "a", null, true]})).unwrap_err();
        assert_eq!(kinds(&err), vec![ViolationKind::FloatType; 3]);

        let body = serde_json::to_value(&err.violations[0]).unwrap();
        assert_eq!(body["type"], "float_type");
        assert_eq!(body["loc"], json!(["body", "values", 1]));
        assert_eq!(body["input"], "a");
    }

    #[test]
    fn test_violations_are_aggregated() {
        let err = PredictionInput::validate(&json!({"values": ["x", [1]]})).unwrap_err();
        assert_eq!(
            kinds(&err),
            vec![
                ViolationKind::FloatType,
                ViolationKind::FloatType,
                ViolationKind::TooShort
            ]
        );
    }

    #[test]
    fn test_structural_violations() {
        let err = PredictionInput::validate(&json!([1, 2, 3, 4])).unwrap_err();
        assert_eq!(kinds(&err), vec![ViolationKind::ModelAttributesType]);

        let err = PredictionInput::validate(&json!({"features": [1, 2, 3, 4]})).unwrap_err();
        assert_eq!(kinds(&err), vec![ViolationKind::Missing]);

        let err = PredictionInput::validate(&json!({"values": "1,2,3,4"})).unwrap_err();
        assert_eq!(kinds(&err), vec![ViolationKind::ListType]);
    }

    #[test]
    fn test_absent_input_is_omitted() {
        let violation = Violation {
            kind: ViolationKind::JsonInvalid,
            loc: vec![LocSegment::Field("body")],
            msg: "bad".to_string(),
            input: None,
        };
        let body = serde_json::to_value(&violation).unwrap();
        assert!(body.get("input").is_none());
        assert_eq!(body["type"], "json_invalid");
    }
}
