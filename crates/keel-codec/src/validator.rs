//! JSON Schema validation for values crossing the journal boundary.
//!
//! `SchemaValidator` checks a JSON value against the `json_schema` document of
//! an `OutputSchema` using the `jsonschema` crate. All violations are collected
//! so callers (and correction prompts sent back to the model) see the full
//! failure set in one pass.

use serde_json::Value;
use tracing::{debug, warn};

use keel_contracts::schema::{OutputSchema, SchemaFailure, SchemaReport};

/// Structural validator for declared types.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate `value` against `schema`.
    ///
    /// A `Null` schema document means "no structural constraint" and always
    /// passes. A schema document that does not compile is reported as a single
    /// failure at the root rather than an error, so a misconfigured type shows
    /// up the same way any other mismatch does.
    pub fn validate(&self, value: &Value, schema: &OutputSchema) -> SchemaReport {
        if schema.json_schema.is_null() {
            return SchemaReport::pass();
        }

        let validator = match jsonschema::validator_for(&schema.json_schema) {
            Ok(validator) => validator,
            Err(e) => {
                let message = format!("invalid JSON Schema document: {e}");
                warn!(type_name = %schema.type_name, %message, "schema compilation failure");
                return SchemaReport {
                    passed: false,
                    failures: vec![SchemaFailure {
                        path: String::new(),
                        message,
                    }],
                };
            }
        };

        let failures: Vec<SchemaFailure> = validator
            .iter_errors(value)
            .map(|error| SchemaFailure {
                path: error.instance_path.to_string(),
                message: error.to_string(),
            })
            .collect();

        let passed = failures.is_empty();
        debug!(
            type_name = %schema.type_name,
            passed,
            failure_count = failures.len(),
            "schema validation complete"
        );

        SchemaReport { passed, failures }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use keel_contracts::schema::OutputSchema;

    use super::SchemaValidator;

    fn lat_lng_schema() -> OutputSchema {
        OutputSchema::new(
            "lat_lng",
            json!({
                "type": "object",
                "required": ["lat", "lng"],
                "properties": {
                    "lat": { "type": "number" },
                    "lng": { "type": "number" }
                }
            }),
        )
    }

    #[test]
    fn conforming_value_passes() {
        let report = SchemaValidator::new().validate(&json!({ "lat": 1.5, "lng": -3.0 }), &lat_lng_schema());
        assert!(report.passed);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn null_schema_accepts_anything() {
        let report = SchemaValidator::new().validate(&json!([1, "two", null]), &OutputSchema::any_json());
        assert!(report.passed);
    }

    #[test]
    fn missing_required_field_is_reported() {
        let report = SchemaValidator::new().validate(&json!({ "lat": 1.5 }), &lat_lng_schema());
        assert!(!report.passed);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("lng"));
    }

    #[test]
    fn all_failures_are_collected() {
        let report =
            SchemaValidator::new().validate(&json!({ "lat": "north", "lng": "east" }), &lat_lng_schema());
        assert!(!report.passed);
        assert_eq!(report.failures.len(), 2, "both wrong-typed fields must be reported");
        let paths: Vec<&str> = report.failures.iter().map(|f| f.path.as_str()).collect();
        assert!(paths.contains(&"/lat"));
        assert!(paths.contains(&"/lng"));
        assert!(report.summary().contains("/lat"));
    }

    #[test]
    fn malformed_schema_becomes_a_failure() {
        let schema = OutputSchema::new("broken", json!({ "type": 42 }));
        let report = SchemaValidator::new().validate(&json!({}), &schema);
        assert!(!report.passed);
        assert!(report.failures[0].message.contains("invalid JSON Schema"));
    }
}
