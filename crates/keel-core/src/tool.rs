//! Tool registry and tool invocation wrapper.
//!
//! Each requested tool call becomes one durable step named
//! `tool:<ordinal>:<tool-name>`. The tool body runs inside the step, so once
//! the step is recorded the body is never run again for this run, no matter
//! how often the run is replayed.

use std::{collections::BTreeMap, marker::PhantomData};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use keel_codec::{Typed, TypedCodec};
use keel_contracts::{
    error::{KeelError, KeelResult},
    message::{ToolCall, ToolReturn},
    retry::RetryPolicy,
    run::StepName,
    schema::OutputSchema,
    tool::{ToolDefinition, ToolError},
};

use crate::traits::{DurableContext, Tool};

/// The closed set of tools an agent may call, keyed by name.
pub struct Toolset<D> {
    tools: BTreeMap<String, Box<dyn Tool<D>>>,
}

impl<D> Toolset<D> {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register `tool` under its own name. Registering the same name twice
    /// replaces the previous tool.
    pub fn register(&mut self, tool: impl Tool<D> + 'static) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Box::new(tool)).is_some() {
            warn!(tool = %name, "tool registered twice; keeping the later one");
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool<D>> {
        self.tools.get(name).map(|tool| tool.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions shown to the model, sorted by tool name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }
}

impl<D> Default for Toolset<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs tool calls as durable steps.
pub struct ToolInvoker<'a, D> {
    toolset: &'a Toolset<D>,
    retry: &'a RetryPolicy,
    codec: TypedCodec,
}

impl<'a, D> ToolInvoker<'a, D> {
    pub fn new(toolset: &'a Toolset<D>, retry: &'a RetryPolicy) -> Self {
        Self {
            toolset,
            retry,
            codec: TypedCodec::new(),
        }
    }

    /// Execute `call` as durable step `tool:<ordinal>:<name>`.
    ///
    /// # Errors
    ///
    /// - `UnknownTool` before any step is issued when the name is not
    ///   registered.
    /// - `Terminal` when the tool reports a non-retriable failure.
    /// - `RetriesExhausted` when retriable failures reach the ceiling.
    pub fn invoke(
        &self,
        ctx: &dyn DurableContext,
        ordinal: u64,
        call: &ToolCall,
        deps: &D,
    ) -> KeelResult<ToolReturn> {
        let tool = self
            .toolset
            .get(&call.tool_name)
            .ok_or_else(|| KeelError::UnknownTool {
                tool_name: call.tool_name.clone(),
            })?;

        let name = StepName::tool(ordinal, &call.tool_name);
        let declared = tool.result_type();

        let bytes = ctx.run_step(
            name.clone(),
            call.arguments.clone(),
            self.retry,
            &mut |attempt: u32| {
                debug!(
                    run_id = %ctx.run_id(),
                    step = %name,
                    attempt,
                    "invoking tool"
                );
                match tool.invoke(deps, &call.arguments) {
                    Ok(value) => self.codec.encode_value(&value, &declared),
                    Err(error) => Err(tool_error(&call.tool_name, error)),
                }
            },
        )?;

        let content = self.codec.decode_value(&bytes, &declared)?;
        Ok(ToolReturn {
            call_id: call.call_id.clone(),
            tool_name: call.tool_name.clone(),
            content,
        })
    }
}

fn tool_error(tool_name: &str, error: ToolError) -> KeelError {
    let reason = format!("tool '{tool_name}': {}", error.message);
    if error.retriable {
        KeelError::Transient { reason }
    } else {
        KeelError::Terminal { reason }
    }
}

/// A `Tool` built from a typed closure.
///
/// Arguments are deserialized into `A`; arguments that do not fit are a
/// terminal tool error. The result's declared type is `R`.
pub struct FnTool<D, A, R, F> {
    name: String,
    description: String,
    parameters: Value,
    func: F,
    _marker: PhantomData<fn(&D, A) -> R>,
}

impl<D, A, R, F> FnTool<D, A, R, F>
where
    A: DeserializeOwned,
    R: Typed,
    F: Fn(&D, A) -> Result<R, ToolError> + Send + Sync,
{
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        func: F,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            func,
            _marker: PhantomData,
        }
    }
}

impl<D, A, R, F> Tool<D> for FnTool<D, A, R, F>
where
    A: DeserializeOwned,
    R: Typed,
    F: Fn(&D, A) -> Result<R, ToolError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    fn result_type(&self) -> OutputSchema {
        R::declared()
    }

    fn invoke(&self, deps: &D, arguments: &Value) -> Result<Value, ToolError> {
        let args: A = serde_json::from_value(arguments.clone()).map_err(|e| {
            ToolError::terminal(format!("invalid arguments for '{}': {e}", self.name))
        })?;
        let result = (self.func)(deps, args)?;
        serde_json::to_value(&result).map_err(|e| {
            ToolError::terminal(format!("cannot serialize result of '{}': {e}", self.name))
        })
    }
}
