//! Model provider request and response types.
//!
//! The wire protocol to a real provider is out of scope; these types are the
//! provider-neutral shape the adapter journals.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    message::{Message, ToolCall},
    schema::OutputSchema,
    tool::ToolDefinition,
};

/// Everything a provider needs to produce the next model decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Provider-qualified model identifier, e.g. `"openai:gpt-4.1-mini"`.
    pub model: String,
    /// System instructions for the agent.
    pub instructions: String,
    /// The conversation so far, oldest first.
    pub history: Vec<Message>,
    /// Tools the model may call.
    pub tools: Vec<ToolDefinition>,
    /// Declared structured output, `None` for plain text.
    pub output_schema: Option<OutputSchema>,
}

/// The model's decision for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelResponse {
    /// A final free-text answer.
    Text { content: String },
    /// A final structured answer.
    Structured { value: Value },
    /// A request to run one or more tools before answering.
    ToolCalls { calls: Vec<ToolCall> },
}

impl ModelResponse {
    pub fn is_final(&self) -> bool {
        !matches!(self, ModelResponse::ToolCalls { .. })
    }

    /// The history message this response contributes.
    pub fn to_message(&self) -> Message {
        match self {
            ModelResponse::Text { content } => Message::Assistant {
                content: content.clone(),
            },
            ModelResponse::Structured { value } => Message::Structured {
                value: value.clone(),
            },
            ModelResponse::ToolCalls { calls } => Message::ToolCalls {
                calls: calls.clone(),
            },
        }
    }
}

/// Provider failure categories.
///
/// The adapter maps these onto its own retry taxonomy: the first three are
/// transient, the rest terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    RateLimited,
    Timeout,
    Unavailable,
    InvalidRequest,
    Authentication,
    ContentFiltered,
}

impl ProviderErrorKind {
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ProviderErrorKind::RateLimited | ProviderErrorKind::Timeout | ProviderErrorKind::Unavailable
        )
    }
}

/// An error reported by a model provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ProviderError {}
