//! Output schema and schema-validation report types.
//!
//! An `OutputSchema` pairs a stable type name with a JSON Schema document. The
//! type name travels with every encoded value so a decoder can tell which type
//! a journal entry was written as.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The declared type of a value crossing the journal boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    /// Stable type name, e.g. `"linkedin_lead_queries"` or `"list<string>"`.
    pub type_name: String,
    /// JSON Schema document the value must satisfy. `Null` means unconstrained.
    pub json_schema: Value,
}

impl OutputSchema {
    pub fn new(type_name: impl Into<String>, json_schema: Value) -> Self {
        Self {
            type_name: type_name.into(),
            json_schema,
        }
    }

    /// Untyped JSON: any value, declared as `json`.
    pub fn any_json() -> Self {
        Self::new("json", Value::Null)
    }
}

/// The result of validating one value against an `OutputSchema`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaReport {
    /// True only if no failures were found.
    pub passed: bool,
    /// Every failure found; empty on pass.
    pub failures: Vec<SchemaFailure>,
}

impl SchemaReport {
    pub fn pass() -> Self {
        Self {
            passed: true,
            failures: Vec::new(),
        }
    }

    /// One-line summary of all failures, `"; "`-joined.
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("{}: {}", f.path, f.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaFailure {
    /// JSON pointer to the offending part of the instance (`""` for the root).
    pub path: String,
    pub message: String,
}
