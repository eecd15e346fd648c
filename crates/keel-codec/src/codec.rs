//! The typed journal codec.
//!
//! Values are stored as a JSON envelope carrying the declared type name next
//! to the payload:
//!
//! ```json
//! { "type": "lat_lng", "value": { "lat": 35.68, "lng": 139.69 } }
//! ```
//!
//! Encoding refuses values that do not satisfy their declared schema
//! (`InvalidPayload`). Decoding refuses envelopes written under a different
//! type name, payloads that violate the schema, and payloads serde cannot turn
//! back into the requested type (`SchemaMismatch`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use keel_contracts::{
    error::{KeelError, KeelResult},
    schema::OutputSchema,
};

use crate::{typed::Typed, validator::SchemaValidator};

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    type_name: String,
    value: Value,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TypedCodec {
    validator: SchemaValidator,
}

impl TypedCodec {
    pub fn new() -> Self {
        Self {
            validator: SchemaValidator::new(),
        }
    }

    pub fn validator(&self) -> &SchemaValidator {
        &self.validator
    }

    /// Encode `value` as its declared type `T`.
    pub fn encode<T: Typed>(&self, value: &T) -> KeelResult<Vec<u8>> {
        let json = self.to_value(value)?;
        self.wrap(json, &T::declared())
    }

    /// Decode bytes previously produced by `encode::<T>`.
    pub fn decode<T: Typed>(&self, bytes: &[u8]) -> KeelResult<T> {
        let declared = T::declared();
        let json = self.decode_value(bytes, &declared)?;
        self.from_value_checked::<T>(json, &declared)
    }

    /// Encode an untyped JSON value under a declared type known only at
    /// runtime (tool results, for example).
    pub fn encode_value(&self, value: &Value, declared: &OutputSchema) -> KeelResult<Vec<u8>> {
        self.check_encodable(value, declared)?;
        self.wrap(value.clone(), declared)
    }

    /// Decode bytes into a JSON value, checking the declared type.
    pub fn decode_value(&self, bytes: &[u8], declared: &OutputSchema) -> KeelResult<Value> {
        let envelope: Envelope =
            serde_json::from_slice(bytes).map_err(|e| KeelError::InvalidPayload {
                reason: format!("malformed journal envelope: {e}"),
            })?;

        if envelope.type_name != declared.type_name {
            warn!(
                expected = %declared.type_name,
                found = %envelope.type_name,
                "journal value decoded as a different type"
            );
            return Err(KeelError::SchemaMismatch {
                expected: declared.type_name.clone(),
                found: envelope.type_name,
            });
        }

        let report = self.validator.validate(&envelope.value, declared);
        if !report.passed {
            return Err(KeelError::SchemaMismatch {
                expected: declared.type_name.clone(),
                found: format!("{} violating its schema ({})", envelope.type_name, report.summary()),
            });
        }

        Ok(envelope.value)
    }

    /// Serialize `value` to JSON and check it against `T`'s schema, without
    /// wrapping it in an envelope.
    pub fn to_value<T: Typed>(&self, value: &T) -> KeelResult<Value> {
        let json = serde_json::to_value(value).map_err(|e| KeelError::InvalidPayload {
            reason: format!("cannot serialize '{}': {e}", T::type_name()),
        })?;
        self.check_encodable(&json, &T::declared())?;
        Ok(json)
    }

    /// Check `value` against `T`'s schema and deserialize it.
    pub fn from_value<T: Typed>(&self, value: Value) -> KeelResult<T> {
        let declared = T::declared();
        let report = self.validator.validate(&value, &declared);
        if !report.passed {
            return Err(KeelError::SchemaMismatch {
                expected: declared.type_name,
                found: format!("value violating its schema ({})", report.summary()),
            });
        }
        self.from_value_checked::<T>(value, &declared)
    }

    fn from_value_checked<T: Typed>(&self, value: Value, declared: &OutputSchema) -> KeelResult<T> {
        serde_json::from_value(value).map_err(|e| KeelError::SchemaMismatch {
            expected: declared.type_name.clone(),
            found: format!("value not deserializable ({e})"),
        })
    }

    fn check_encodable(&self, value: &Value, declared: &OutputSchema) -> KeelResult<()> {
        let report = self.validator.validate(value, declared);
        if report.passed {
            Ok(())
        } else {
            Err(KeelError::InvalidPayload {
                reason: format!(
                    "value does not satisfy declared type '{}': {}",
                    declared.type_name,
                    report.summary()
                ),
            })
        }
    }

    fn wrap(&self, value: Value, declared: &OutputSchema) -> KeelResult<Vec<u8>> {
        let envelope = Envelope {
            type_name: declared.type_name.clone(),
            value,
        };
        serde_json::to_vec(&envelope).map_err(|e| KeelError::InvalidPayload {
            reason: format!("cannot serialize journal envelope: {e}"),
        })
    }
}
