//! Message history types.
//!
//! The history is the only state an agent loop carries between model rounds.
//! It is append-only within a run and is rebuilt on replay purely from the
//! recorded outputs of model and tool steps.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned id correlating the call with its return.
    pub call_id: String,
    /// Name of the registered tool to invoke.
    pub tool_name: String,
    /// JSON arguments, validated by the tool itself.
    pub arguments: Value,
}

/// The result of one tool invocation, fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolReturn {
    pub call_id: String,
    pub tool_name: String,
    pub content: Value,
}

/// One turn in the conversation between the loop, the model, and tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// Input from the handler (the initial prompt or a follow-up).
    User { content: String },
    /// Free text produced by the model.
    Assistant { content: String },
    /// A structured final answer produced by the model.
    Structured { value: Value },
    /// The model asked for one or more tools to be run.
    ToolCalls { calls: Vec<ToolCall> },
    /// A tool finished and its result is handed back to the model.
    ToolReturn(ToolReturn),
    /// Correction notice sent to the model after an invalid final answer.
    RetryPrompt { content: String },
}

/// Ordered, append-only sequence of messages for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageHistory {
    messages: Vec<Message>,
}

impl MessageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

impl From<Vec<Message>> for MessageHistory {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl<'a> IntoIterator for &'a MessageHistory {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
