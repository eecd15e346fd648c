//! Model invocation wrapper.
//!
//! Each model round becomes one durable step named `model:<ordinal>`. Inside
//! the step the provider may be called several times: transient provider
//! errors are retried with backoff, and a final answer that does not satisfy
//! the declared output type is sent back to the model with a correction notice
//! on the next attempt. Only the accepted response is recorded.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use keel_codec::TypedCodec;
use keel_contracts::{
    error::{KeelError, KeelResult},
    message::{Message, MessageHistory},
    model::{ModelRequest, ModelResponse, ProviderError},
    retry::RetryPolicy,
    run::StepName,
    schema::OutputSchema,
    tool::ToolDefinition,
};

use crate::traits::{DurableContext, ModelProvider};

/// Everything about the model side of an agent that stays fixed for a run.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub model: String,
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
    /// Declared structured output, `None` for plain text.
    pub output: Option<OutputSchema>,
    pub retry: RetryPolicy,
}

pub struct ModelInvoker {
    provider: Arc<dyn ModelProvider>,
    settings: ModelSettings,
    codec: TypedCodec,
}

impl ModelInvoker {
    pub fn new(provider: Arc<dyn ModelProvider>, settings: ModelSettings) -> Self {
        Self {
            provider,
            settings,
            codec: TypedCodec::new(),
        }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Ask the model for its next decision as durable step `model:<ordinal>`.
    ///
    /// # Errors
    ///
    /// - `CallerError` immediately, without issuing a step, when `history` is
    ///   empty.
    /// - `RetriesExhausted` when every attempt failed transiently or produced
    ///   an invalid final answer.
    /// - `Terminal` for provider errors the provider classifies as permanent.
    pub fn invoke(
        &self,
        ctx: &dyn DurableContext,
        ordinal: u64,
        history: &MessageHistory,
    ) -> KeelResult<ModelResponse> {
        if history.is_empty() {
            return Err(KeelError::CallerError {
                reason: "either a prompt or a message history must be provided".to_string(),
            });
        }

        let name = StepName::model(ordinal);
        let input = json!({
            "model": self.settings.model,
            "history_len": history.len(),
        });

        let mut correction: Option<String> = None;
        let bytes = ctx.run_step(name.clone(), input, &self.settings.retry, &mut |attempt: u32| {
            let request = self.build_request(history, correction.as_deref());

            debug!(
                run_id = %ctx.run_id(),
                step = %name,
                attempt,
                corrected = correction.is_some(),
                "requesting model decision"
            );

            let response = self.provider.request(&request).map_err(provider_error)?;

            match self.accept(response) {
                Ok(accepted) => self.codec.encode(&accepted),
                Err(reason) => {
                    warn!(
                        run_id = %ctx.run_id(),
                        step = %name,
                        attempt,
                        %reason,
                        "model answer rejected, re-prompting"
                    );
                    correction = Some(format!(
                        "Your previous answer was rejected: {reason}. Fix the errors and try again."
                    ));
                    Err(KeelError::OutputValidation { reason })
                }
            }
        })?;

        self.codec.decode::<ModelResponse>(&bytes)
    }

    fn build_request(&self, history: &MessageHistory, correction: Option<&str>) -> ModelRequest {
        let mut messages = history.as_slice().to_vec();
        if let Some(notice) = correction {
            messages.push(Message::RetryPrompt {
                content: notice.to_string(),
            });
        }
        ModelRequest {
            model: self.settings.model.clone(),
            instructions: self.settings.instructions.clone(),
            history: messages,
            tools: self.settings.tools.clone(),
            output_schema: self.settings.output.clone(),
        }
    }

    /// Check a response against the declared output and normalize its shape.
    ///
    /// Text that parses as a valid structured value is accepted as structured
    /// output; a structured string is accepted as text.
    fn accept(&self, response: ModelResponse) -> Result<ModelResponse, String> {
        match (response, &self.settings.output) {
            (ModelResponse::ToolCalls { calls }, _) => {
                if calls.is_empty() {
                    Err("a tool-call response must request at least one tool".to_string())
                } else {
                    Ok(ModelResponse::ToolCalls { calls })
                }
            }

            (ModelResponse::Text { content }, None) => Ok(ModelResponse::Text { content }),

            (ModelResponse::Structured { value }, None) => match value {
                Value::String(content) => Ok(ModelResponse::Text { content }),
                _ => Err("expected a plain text answer, got a structured value".to_string()),
            },

            (ModelResponse::Text { content }, Some(schema)) => {
                let value: Value = serde_json::from_str(&content).map_err(|_| {
                    format!(
                        "expected structured output of type '{}', got plain text",
                        schema.type_name
                    )
                })?;
                self.check_structured(value, schema)
            }

            (ModelResponse::Structured { value }, Some(schema)) => {
                self.check_structured(value, schema)
            }
        }
    }

    fn check_structured(&self, value: Value, schema: &OutputSchema) -> Result<ModelResponse, String> {
        let report = self.codec.validator().validate(&value, schema);
        if report.passed {
            Ok(ModelResponse::Structured { value })
        } else {
            Err(format!(
                "output does not match '{}': {}",
                schema.type_name,
                report.summary()
            ))
        }
    }
}

fn provider_error(error: ProviderError) -> KeelError {
    if error.kind.is_transient() {
        KeelError::Transient {
            reason: format!("model provider: {error}"),
        }
    } else {
        KeelError::Terminal {
            reason: format!("model provider: {error}"),
        }
    }
}
