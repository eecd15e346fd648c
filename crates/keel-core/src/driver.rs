//! The agent loop as an explicit state machine.
//!
//! ```text
//! AwaitingModel ──final answer──▶ Done
//!      │   ▲
//!  tool│   │all returns appended
//! calls▼   │
//! ToolsRequested ──any failure──▶ Failed
//! ```
//!
//! The only suspension points are the durable steps issued by the model and
//! tool wrappers. Because history is rebuilt from recorded step outputs, a
//! replayed run walks exactly the same states and issues exactly the same
//! step names as the first run did.

use std::marker::PhantomData;

use serde_json::Value;
use tracing::{debug, info, warn};

use keel_codec::{Typed, TypedCodec};
use keel_contracts::{
    error::{KeelError, KeelResult},
    message::{Message, MessageHistory, ToolCall},
    model::ModelResponse,
};

use crate::{
    agent::RunOutput,
    model::ModelInvoker,
    tool::ToolInvoker,
    traits::DurableContext,
};

/// Where the loop currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState<O> {
    AwaitingModel,
    ToolsRequested(Vec<ToolCall>),
    Done(O),
    Failed(KeelError),
}

pub(crate) struct LoopDriver<'a, D, O> {
    ctx: &'a dyn DurableContext,
    model: ModelInvoker,
    tools: ToolInvoker<'a, D>,
    deps: &'a D,
    max_rounds: u32,
    codec: TypedCodec,
    history: MessageHistory,
    // Global per-call counters; they never reset between rounds.
    model_ordinal: u64,
    tool_ordinal: u64,
    _output: PhantomData<fn() -> O>,
}

impl<'a, D, O: Typed> LoopDriver<'a, D, O> {
    pub fn new(
        ctx: &'a dyn DurableContext,
        model: ModelInvoker,
        tools: ToolInvoker<'a, D>,
        deps: &'a D,
        max_rounds: u32,
        history: MessageHistory,
    ) -> Self {
        Self {
            ctx,
            model,
            tools,
            deps,
            max_rounds,
            codec: TypedCodec::new(),
            history,
            model_ordinal: 0,
            tool_ordinal: 0,
            _output: PhantomData,
        }
    }

    pub fn run(mut self) -> KeelResult<RunOutput<O>> {
        let mut state = LoopState::AwaitingModel;
        loop {
            state = match state {
                LoopState::AwaitingModel => self.await_model(),
                LoopState::ToolsRequested(calls) => self.dispatch(calls),
                LoopState::Done(output) => {
                    info!(
                        run_id = %self.ctx.run_id(),
                        model_steps = self.model_ordinal,
                        tool_steps = self.tool_ordinal,
                        "agent run completed"
                    );
                    return Ok(RunOutput {
                        output,
                        history: self.history,
                        model_steps: self.model_ordinal,
                        tool_steps: self.tool_ordinal,
                    });
                }
                LoopState::Failed(cause) => return Err(self.fail(cause)),
            };
        }
    }

    fn await_model(&mut self) -> LoopState<O> {
        if self.model_ordinal >= u64::from(self.max_rounds) {
            return LoopState::Failed(KeelError::MaxRoundsExceeded {
                max_rounds: self.max_rounds,
            });
        }

        let ordinal = self.model_ordinal;
        self.model_ordinal += 1;

        let response = match self.model.invoke(self.ctx, ordinal, &self.history) {
            Ok(response) => response,
            Err(e) => return LoopState::Failed(e),
        };
        self.history.push(response.to_message());

        match response {
            ModelResponse::Text { content } => self.finish(Value::String(content)),
            ModelResponse::Structured { value } => self.finish(value),
            ModelResponse::ToolCalls { calls } => {
                debug!(
                    run_id = %self.ctx.run_id(),
                    round = ordinal,
                    calls = calls.len(),
                    "model requested tools"
                );
                LoopState::ToolsRequested(calls)
            }
        }
    }

    /// Run every requested call in request order, appending each return.
    fn dispatch(&mut self, calls: Vec<ToolCall>) -> LoopState<O> {
        for call in &calls {
            let ordinal = self.tool_ordinal;
            self.tool_ordinal += 1;
            match self.tools.invoke(self.ctx, ordinal, call, self.deps) {
                Ok(ret) => self.history.push(Message::ToolReturn(ret)),
                Err(e) => return LoopState::Failed(e),
            }
        }
        LoopState::AwaitingModel
    }

    fn finish(&self, value: Value) -> LoopState<O> {
        match self.codec.from_value::<O>(value) {
            Ok(output) => LoopState::Done(output),
            Err(e) => LoopState::Failed(e),
        }
    }

    fn fail(&self, cause: KeelError) -> KeelError {
        match cause {
            KeelError::Suspended { .. } => {
                info!(run_id = %self.ctx.run_id(), %cause, "agent run suspended");
                cause
            }
            cause => {
                warn!(run_id = %self.ctx.run_id(), %cause, "agent run failed");
                KeelError::RunFailed {
                    run_id: self.ctx.run_id().to_string(),
                    cause: Box::new(cause),
                }
            }
        }
    }
}
