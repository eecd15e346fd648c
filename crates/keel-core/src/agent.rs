//! Agent descriptors and the handler-facing entry points.

use std::{marker::PhantomData, sync::Arc};

use tracing::info;

use keel_codec::Typed;
use keel_contracts::{
    error::{KeelError, KeelResult},
    message::{Message, MessageHistory},
    retry::RetryPolicy,
    schema::OutputSchema,
};

use crate::{
    driver::LoopDriver,
    model::{ModelInvoker, ModelSettings},
    tool::{ToolInvoker, Toolset},
    traits::{DurableContext, ModelProvider, Tool},
};

pub const DEFAULT_MAX_ROUNDS: u32 = 16;

/// Static description of an agent: which model, what it is told, which tools
/// it may call, and what type its final answer has.
///
/// `O` is the output type; `String` asks for a free-text answer, any other
/// `Typed` record asks the model for structured output of that shape.
pub struct AgentDescriptor<D, O = String> {
    pub name: String,
    pub model: String,
    pub instructions: String,
    pub tools: Toolset<D>,
    pub retry: RetryPolicy,
    pub max_rounds: u32,
    _output: PhantomData<fn() -> O>,
}

impl<D, O: Typed> AgentDescriptor<D, O> {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            instructions: String::new(),
            tools: Toolset::new(),
            retry: RetryPolicy::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            _output: PhantomData,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_tool(mut self, tool: impl Tool<D> + 'static) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// The structured output requested from the model, `None` for text.
    pub fn output_schema(&self) -> Option<OutputSchema> {
        if O::is_plain_text() {
            None
        } else {
            Some(O::declared())
        }
    }

    fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            model: self.model.clone(),
            instructions: self.instructions.clone(),
            tools: self.tools.definitions(),
            output: self.output_schema(),
            retry: self.retry.clone(),
        }
    }
}

/// The final result of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput<O> {
    pub output: O,
    pub history: MessageHistory,
    pub model_steps: u64,
    pub tool_steps: u64,
}

/// A descriptor bound to a model provider, ready to run.
pub struct Agent<D, O = String> {
    descriptor: AgentDescriptor<D, O>,
    provider: Arc<dyn ModelProvider>,
}

impl<D, O: Typed> Agent<D, O> {
    pub fn new(descriptor: AgentDescriptor<D, O>, provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            descriptor,
            provider,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &AgentDescriptor<D, O> {
        &self.descriptor
    }

    /// Drive the agent from a single user prompt to its final answer.
    pub fn run(
        &self,
        ctx: &dyn DurableContext,
        prompt: &str,
        deps: &D,
    ) -> KeelResult<RunOutput<O>> {
        self.run_with_history(ctx, Some(prompt.to_string()), MessageHistory::new(), deps)
    }

    /// Drive the agent from an existing conversation, optionally followed by
    /// a new user prompt.
    ///
    /// # Errors
    ///
    /// - `CallerError` when there is neither a prompt nor any history. No
    ///   step is issued.
    /// - `Suspended` when the engine interrupted the run; replaying the same
    ///   call resumes it.
    /// - `RunFailed` for every other failure, carrying the cause.
    pub fn run_with_history(
        &self,
        ctx: &dyn DurableContext,
        prompt: Option<String>,
        mut history: MessageHistory,
        deps: &D,
    ) -> KeelResult<RunOutput<O>> {
        if let Some(content) = prompt.filter(|p| !p.is_empty()) {
            history.push(Message::User { content });
        }
        if history.is_empty() {
            return Err(KeelError::CallerError {
                reason: "either a prompt or a message history must be provided".to_string(),
            });
        }

        info!(
            run_id = %ctx.run_id(),
            agent = %self.descriptor.name,
            model = %self.descriptor.model,
            tools = self.descriptor.tools.len(),
            "starting agent run"
        );

        let driver = LoopDriver::new(
            ctx,
            ModelInvoker::new(Arc::clone(&self.provider), self.descriptor.model_settings()),
            ToolInvoker::new(&self.descriptor.tools, &self.descriptor.retry),
            deps,
            self.descriptor.max_rounds,
            history,
        );
        driver.run()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};

    use keel_codec::Typed;
    use keel_contracts::{
        error::KeelError,
        message::{Message, MessageHistory},
        model::ModelResponse,
    };

    use crate::testing::{CountingTool, MockContext, ScriptedProvider};

    use super::{Agent, AgentDescriptor, DEFAULT_MAX_ROUNDS};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Forecast {
        city: String,
        celsius: i64,
    }

    impl Typed for Forecast {
        fn type_name() -> String {
            "forecast".to_string()
        }

        fn json_schema() -> Value {
            json!({
                "type": "object",
                "required": ["city", "celsius"],
                "properties": {
                    "city": { "type": "string" },
                    "celsius": { "type": "integer" }
                }
            })
        }
    }

    #[test]
    fn descriptor_defaults() {
        let descriptor: AgentDescriptor<(), String> = AgentDescriptor::new("plain", "test:model");
        assert_eq!(descriptor.max_rounds, DEFAULT_MAX_ROUNDS);
        assert_eq!(descriptor.retry.max_attempts, 3);
        assert!(descriptor.output_schema().is_none());
        assert!(descriptor.tools.is_empty());
    }

    #[test]
    fn structured_descriptor_declares_its_output_type() {
        let descriptor: AgentDescriptor<(), Forecast> =
            AgentDescriptor::new("forecaster", "test:model").with_tool(CountingTool::new("lookup"));
        let schema = descriptor.output_schema().unwrap();
        assert_eq!(schema.type_name, "forecast");
        assert_eq!(descriptor.model_settings().tools.len(), 1);
    }

    #[test]
    fn empty_prompt_without_history_is_a_caller_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let agent = Agent::new(AgentDescriptor::<(), String>::new("a", "m"), provider.clone());
        let ctx = MockContext::new();

        let result = agent.run(&ctx, "", &());

        assert!(matches!(result, Err(KeelError::CallerError { .. })));
        assert_eq!(provider.calls(), 0);
        assert!(ctx.records().is_empty());
    }

    #[test]
    fn history_alone_is_enough_to_start() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ModelResponse::Text {
            content: "still sunny".to_string(),
        })]));
        let agent = Agent::new(AgentDescriptor::<(), String>::new("a", "m"), provider.clone());
        let history = MessageHistory::from(vec![
            Message::User { content: "weather?".to_string() },
            Message::Assistant { content: "sunny".to_string() },
        ]);

        let out = agent
            .run_with_history(&MockContext::new(), None, history, &())
            .unwrap();

        assert_eq!(out.output, "still sunny");
        assert_eq!(out.history.len(), 3);
        assert_eq!(provider.requests()[0].history.len(), 2);
    }

    #[test]
    fn structured_agent_returns_the_typed_record() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(ModelResponse::Structured { value: json!({ "city": "Oslo" }) }),
            Ok(ModelResponse::Structured { value: json!({ "city": "Oslo", "celsius": 4 }) }),
        ]));
        let agent: Agent<(), Forecast> =
            Agent::new(AgentDescriptor::new("forecaster", "m"), provider.clone());
        let ctx = MockContext::new();

        let out = agent.run(&ctx, "Forecast for Oslo", &()).unwrap();

        assert_eq!(out.output, Forecast { city: "Oslo".to_string(), celsius: 4 });
        assert_eq!(provider.calls(), 2);
        assert_eq!(ctx.records()[0].attempts, 2);
        assert_eq!(
            provider.requests()[0].output_schema.as_ref().map(|s| s.type_name.clone()),
            Some("forecast".to_string())
        );
    }
}
