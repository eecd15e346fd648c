//! Tool contract types.
//!
//! Tools form a closed capability set: the model may only call tools that were
//! registered with the agent, and each tool reports failures through
//! `ToolError` so the adapter can tell retriable from terminal ones.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the model is told about a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the tool's arguments object.
    pub parameters: Value,
}

/// A failure raised inside a tool body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolError {
    pub message: String,
    /// When false the failure ends the run without further attempts.
    pub retriable: bool,
}

impl ToolError {
    /// A failure worth retrying (network hiccup, rate limit, ...).
    pub fn retriable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retriable: true,
        }
    }

    /// A failure that will not go away on retry.
    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retriable: false,
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = if self.retriable { "retriable" } else { "terminal" };
        write!(f, "{} ({})", self.message, class)
    }
}

impl std::error::Error for ToolError {}
