//! Declared types for journaled values.
//!
//! A type that crosses the journal boundary implements `Typed`: it names
//! itself and describes its shape as a JSON Schema document. Scalars,
//! sequences, optional values, untyped JSON, and the runtime's own model
//! response are covered here; handler records implement the trait next to
//! their definitions.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use keel_contracts::{model::ModelResponse, schema::OutputSchema};

pub trait Typed: Serialize + DeserializeOwned {
    /// Stable name written into every encoded value of this type.
    fn type_name() -> String;

    /// JSON Schema the serialized form must satisfy.
    fn json_schema() -> Value;

    /// True for the free-text answer type. Agents whose output type is plain
    /// text do not ask the model for structured output.
    fn is_plain_text() -> bool {
        false
    }

    fn declared() -> OutputSchema {
        OutputSchema::new(Self::type_name(), Self::json_schema())
    }
}

impl Typed for String {
    fn type_name() -> String {
        "string".to_string()
    }

    fn json_schema() -> Value {
        json!({ "type": "string" })
    }

    fn is_plain_text() -> bool {
        true
    }
}

impl Typed for bool {
    fn type_name() -> String {
        "bool".to_string()
    }

    fn json_schema() -> Value {
        json!({ "type": "boolean" })
    }
}

impl Typed for i64 {
    fn type_name() -> String {
        "i64".to_string()
    }

    fn json_schema() -> Value {
        json!({ "type": "integer" })
    }
}

impl Typed for u32 {
    fn type_name() -> String {
        "u32".to_string()
    }

    fn json_schema() -> Value {
        json!({ "type": "integer", "minimum": 0, "maximum": u32::MAX })
    }
}

impl Typed for f64 {
    fn type_name() -> String {
        "f64".to_string()
    }

    fn json_schema() -> Value {
        json!({ "type": "number" })
    }
}

impl Typed for Value {
    fn type_name() -> String {
        "json".to_string()
    }

    fn json_schema() -> Value {
        Value::Null
    }
}

impl<T: Typed> Typed for Vec<T> {
    fn type_name() -> String {
        format!("list<{}>", T::type_name())
    }

    fn json_schema() -> Value {
        let items = T::json_schema();
        if items.is_null() {
            json!({ "type": "array" })
        } else {
            json!({ "type": "array", "items": items })
        }
    }
}

impl<T: Typed> Typed for Option<T> {
    fn type_name() -> String {
        format!("option<{}>", T::type_name())
    }

    fn json_schema() -> Value {
        let inner = T::json_schema();
        if inner.is_null() {
            Value::Null
        } else {
            json!({ "anyOf": [inner, { "type": "null" }] })
        }
    }
}

impl Typed for ModelResponse {
    fn type_name() -> String {
        "model_response".to_string()
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "required": ["kind"],
            "properties": {
                "kind": { "enum": ["text", "structured", "tool_calls"] },
                "content": { "type": "string" },
                "calls": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["call_id", "tool_name", "arguments"],
                        "properties": {
                            "call_id": { "type": "string" },
                            "tool_name": { "type": "string" }
                        }
                    }
                }
            }
        })
    }
}
