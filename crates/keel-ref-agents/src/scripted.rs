//! Deterministic stand-ins for a language model.
//!
//! The reference handlers never reach a real provider. Each one is paired
//! with an `FnModel` whose closure reads the request (prompt, tool returns,
//! correction notices) and decides the next move the way a well-behaved
//! model would. `Flaky` wraps any provider and makes its first requests fail
//! with a transient provider error.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Mutex,
};

use serde_json::Value;

use keel_contracts::{
    message::{Message, ToolCall, ToolReturn},
    model::{ModelRequest, ModelResponse, ProviderError, ProviderErrorKind},
};
use keel_core::ModelProvider;

/// A model whose decisions are computed by a closure.
pub struct FnModel<F> {
    respond: F,
    calls: AtomicU32,
}

impl<F> FnModel<F>
where
    F: Fn(&ModelRequest) -> Result<ModelResponse, ProviderError> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            calls: AtomicU32::new(0),
        }
    }

    /// How many requests reached this model.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> ModelProvider for FnModel<F>
where
    F: Fn(&ModelRequest) -> Result<ModelResponse, ProviderError> + Send + Sync,
{
    fn request(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(request)
    }
}

/// Fails the first `failures` requests with `kind`, then delegates.
pub struct Flaky<P> {
    inner: P,
    kind: ProviderErrorKind,
    remaining: Mutex<u32>,
}

impl<P: ModelProvider> Flaky<P> {
    pub fn new(inner: P, kind: ProviderErrorKind, failures: u32) -> Self {
        Self {
            inner,
            kind,
            remaining: Mutex::new(failures),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: ModelProvider> ModelProvider for Flaky<P> {
    fn request(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        if let Ok(mut remaining) = self.remaining.lock() {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ProviderError::new(self.kind, "simulated provider hiccup"));
            }
        }
        self.inner.request(request)
    }
}

// ── Request inspection helpers ────────────────────────────────────────────────

/// The first user message of the conversation.
pub fn user_prompt(request: &ModelRequest) -> &str {
    request
        .history
        .iter()
        .find_map(|m| match m {
            Message::User { content } => Some(content.as_str()),
            _ => None,
        })
        .unwrap_or("")
}

/// How many tool rounds the model has already requested.
pub fn tool_rounds(request: &ModelRequest) -> usize {
    request
        .history
        .iter()
        .filter(|m| matches!(m, Message::ToolCalls { .. }))
        .count()
}

/// Every tool return named `tool_name`, in history order.
pub fn returns_of<'r>(request: &'r ModelRequest, tool_name: &str) -> Vec<&'r ToolReturn> {
    request
        .history
        .iter()
        .filter_map(|m| match m {
            Message::ToolReturn(ret) if ret.tool_name == tool_name => Some(ret),
            _ => None,
        })
        .collect()
}

/// True when the previous answer was rejected and the model is being asked
/// to correct it.
pub fn is_correction(request: &ModelRequest) -> bool {
    matches!(request.history.last(), Some(Message::RetryPrompt { .. }))
}

/// A tool call with an id derived from its round and position.
pub fn call(round: usize, index: usize, tool_name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        call_id: format!("call_{round}_{index}"),
        tool_name: tool_name.to_string(),
        arguments,
    }
}

pub fn text(content: impl Into<String>) -> ModelResponse {
    ModelResponse::Text {
        content: content.into(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use keel_contracts::{
        message::{Message, ToolReturn},
        model::{ModelRequest, ModelResponse, ProviderErrorKind},
    };
    use keel_core::ModelProvider;

    use super::{is_correction, returns_of, text, tool_rounds, user_prompt, Flaky, FnModel};

    fn request(history: Vec<Message>) -> ModelRequest {
        ModelRequest {
            model: "test".to_string(),
            instructions: String::new(),
            history,
            tools: vec![],
            output_schema: None,
        }
    }

    #[test]
    fn helpers_read_the_conversation() {
        let req = request(vec![
            Message::User { content: "weather in Oslo?".to_string() },
            Message::ToolCalls { calls: vec![] },
            Message::ToolReturn(ToolReturn {
                call_id: "c".to_string(),
                tool_name: "get_lat_lng".to_string(),
                content: json!({ "lat": 1.0, "lng": 2.0 }),
            }),
            Message::RetryPrompt { content: "fix it".to_string() },
        ]);

        assert_eq!(user_prompt(&req), "weather in Oslo?");
        assert_eq!(tool_rounds(&req), 1);
        assert_eq!(returns_of(&req, "get_lat_lng").len(), 1);
        assert!(returns_of(&req, "get_weather").is_empty());
        assert!(is_correction(&req));
    }

    #[test]
    fn flaky_fails_first_then_delegates() {
        let flaky = Flaky::new(FnModel::new(|_| Ok(text("hi"))), ProviderErrorKind::RateLimited, 2);
        let req = request(vec![]);

        assert_eq!(flaky.request(&req).unwrap_err().kind, ProviderErrorKind::RateLimited);
        assert!(flaky.request(&req).is_err());
        assert_eq!(flaky.request(&req).unwrap(), ModelResponse::Text { content: "hi".to_string() });
        assert_eq!(flaky.inner().calls(), 1);
    }
}
