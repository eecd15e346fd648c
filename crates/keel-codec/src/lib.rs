//! # keel-codec
//!
//! Converts structured values to and from the journal's storage
//! representation while keeping their declared type.
//!
//! - [`typed::Typed`]: the declared-type trait (name + JSON Schema).
//! - [`codec::TypedCodec`]: envelope encoding with type checks on both ends.
//! - [`validator::SchemaValidator`]: structural validation via `jsonschema`.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use keel_codec::TypedCodec;
//!
//! let codec = TypedCodec::new();
//! let bytes = codec.encode(&vec![1_i64, 2, 3])?;
//! let back: Vec<i64> = codec.decode(&bytes)?;
//! ```

pub mod codec;
pub mod typed;
pub mod validator;

pub use codec::TypedCodec;
pub use typed::Typed;
pub use validator::SchemaValidator;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};

    use keel_contracts::{
        error::KeelError,
        message::ToolCall,
        model::ModelResponse,
        schema::OutputSchema,
    };

    use super::{Typed, TypedCodec};

    // ── Fixtures ──────────────────────────────────────────────────────────────

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct SearchQuery {
        query: String,
        description: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tier {
        tier_name: String,
        priority_level: i64,
        queries: Vec<SearchQuery>,
        note: Option<String>,
    }

    impl Typed for Tier {
        fn type_name() -> String {
            "tier".to_string()
        }

        fn json_schema() -> Value {
            json!({
                "type": "object",
                "required": ["tier_name", "priority_level", "queries"],
                "properties": {
                    "tier_name": { "type": "string" },
                    "priority_level": { "type": "integer" },
                    "queries": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["query", "description"]
                        }
                    }
                }
            })
        }
    }

    fn tier() -> Tier {
        Tier {
            tier_name: "Decision makers".to_string(),
            priority_level: 1,
            queries: vec![SearchQuery {
                query: "CEO restaurant Canada".to_string(),
                description: "Owners of restaurant groups".to_string(),
            }],
            note: None,
        }
    }

    // ── Round trips for the declared types the runtime uses ──────────────────

    #[test]
    fn scalars_round_trip() {
        let codec = TypedCodec::new();
        assert_eq!(codec.decode::<String>(&codec.encode(&"Done".to_string()).unwrap()).unwrap(), "Done");
        assert!(codec.decode::<bool>(&codec.encode(&true).unwrap()).unwrap());
        assert_eq!(codec.decode::<i64>(&codec.encode(&-42_i64).unwrap()).unwrap(), -42);
        assert_eq!(codec.decode::<u32>(&codec.encode(&7_u32).unwrap()).unwrap(), 7);
        assert_eq!(codec.decode::<f64>(&codec.encode(&20.5_f64).unwrap()).unwrap(), 20.5);
    }

    #[test]
    fn sequences_and_nested_records_round_trip() {
        let codec = TypedCodec::new();

        let list = vec!["a".to_string(), "b".to_string()];
        assert_eq!(codec.decode::<Vec<String>>(&codec.encode(&list).unwrap()).unwrap(), list);

        let tiers = vec![tier(), Tier { note: Some("batch of 10".to_string()), ..tier() }];
        let bytes = codec.encode(&tiers).unwrap();
        assert_eq!(codec.decode::<Vec<Tier>>(&bytes).unwrap(), tiers);
    }

    #[test]
    fn model_response_round_trips() {
        let codec = TypedCodec::new();
        let response = ModelResponse::ToolCalls {
            calls: vec![ToolCall {
                call_id: "call-1".to_string(),
                tool_name: "search".to_string(),
                arguments: json!({ "query": "X" }),
            }],
        };
        let bytes = codec.encode(&response).unwrap();
        assert_eq!(codec.decode::<ModelResponse>(&bytes).unwrap(), response);
    }

    #[test]
    fn untyped_json_round_trips() {
        let codec = TypedCodec::new();
        let value = json!({ "temperature": "20 °C", "description": "Sunny" });
        let bytes = codec.encode(&value).unwrap();
        assert_eq!(codec.decode::<Value>(&bytes).unwrap(), value);
    }

    // ── Type checks at the boundary ───────────────────────────────────────────

    #[test]
    fn decode_as_different_type_is_a_schema_mismatch() {
        let codec = TypedCodec::new();
        let bytes = codec.encode(&42_i64).unwrap();

        match codec.decode::<String>(&bytes) {
            Err(KeelError::SchemaMismatch { expected, found }) => {
                assert_eq!(expected, "string");
                assert_eq!(found, "i64");
            }
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }
    }

    #[test]
    fn decoding_a_record_as_a_list_of_it_is_rejected() {
        let codec = TypedCodec::new();
        let bytes = codec.encode(&tier()).unwrap();
        assert!(matches!(
            codec.decode::<Vec<Tier>>(&bytes),
            Err(KeelError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn tampered_payload_fails_schema_check_on_decode() {
        let codec = TypedCodec::new();
        let bytes = br#"{"type":"tier","value":{"tier_name":"x"}}"#;
        assert!(matches!(
            codec.decode::<Tier>(bytes),
            Err(KeelError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn malformed_envelope_is_an_invalid_payload() {
        let codec = TypedCodec::new();
        assert!(matches!(
            codec.decode::<String>(b"not json"),
            Err(KeelError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn encoding_value_missing_required_fields_is_an_invalid_payload() {
        let codec = TypedCodec::new();
        let declared = OutputSchema::new(
            "lat_lng",
            json!({ "type": "object", "required": ["lat", "lng"] }),
        );

        match codec.encode_value(&json!({ "lat": 10.0 }), &declared) {
            Err(KeelError::InvalidPayload { reason }) => {
                assert!(reason.contains("lat_lng"));
                assert!(reason.contains("lng"));
            }
            other => panic!("expected InvalidPayload, got {:?}", other),
        }
    }

    #[test]
    fn dynamic_values_round_trip_under_their_declared_type() {
        let codec = TypedCodec::new();
        let declared = OutputSchema::new("lat_lng", json!({ "type": "object", "required": ["lat", "lng"] }));
        let value = json!({ "lat": 10.0, "lng": 20.0 });

        let bytes = codec.encode_value(&value, &declared).unwrap();
        assert_eq!(codec.decode_value(&bytes, &declared).unwrap(), value);
        assert!(matches!(
            codec.decode_value(&bytes, &OutputSchema::any_json()),
            Err(KeelError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn from_value_validates_before_deserializing() {
        let codec = TypedCodec::new();
        assert!(matches!(
            codec.from_value::<Tier>(json!({ "tier_name": "x", "queries": [] })),
            Err(KeelError::SchemaMismatch { .. })
        ));
        let ok = codec.from_value::<Tier>(codec.to_value(&tier()).unwrap()).unwrap();
        assert_eq!(ok, tier());
    }
}
