//! Trait definitions at the runtime's three seams.
//!
//! - `DurableContext`: the durable execution engine (journal + replay).
//! - `ModelProvider`: the language model, untrusted and non-deterministic.
//! - `Tool`: a side-effecting capability the model may invoke.
//!
//! The agent loop only ever reaches the provider and the tools through
//! `DurableContext::run_step`, so everything they do is journaled.

use std::time::Duration;

use serde_json::{json, Value};

use keel_contracts::{
    error::KeelResult,
    model::{ModelRequest, ModelResponse, ProviderError},
    retry::RetryPolicy,
    run::{RunId, StepName},
    schema::OutputSchema,
    tool::{ToolDefinition, ToolError},
};

/// The action executed by a durable step.
///
/// Receives the 1-based attempt number and returns the codec-encoded result.
/// Errors whose class is transient are retried by the engine under the step's
/// `RetryPolicy`; every other error ends the step.
pub type StepAction<'a> = dyn FnMut(u32) -> KeelResult<Vec<u8>> + 'a;

/// The run-once-and-remember primitive provided by a durable execution engine.
pub trait DurableContext: Send + Sync {
    /// The engine-assigned identifier of the current run.
    fn run_id(&self) -> &RunId;

    /// Execute `action` at most once per `name` for the lifetime of the run.
    ///
    /// On first execution the action is attempted up to
    /// `policy.max_attempts` times and its final outcome is recorded. On
    /// replay the recorded outcome is returned without calling `action`.
    /// Implementations must reject a replay that issues a different name than
    /// the one recorded at the same position.
    fn run_step(
        &self,
        name: StepName,
        input: Value,
        policy: &RetryPolicy,
        action: &mut StepAction<'_>,
    ) -> KeelResult<Vec<u8>>;

    /// Durable timer: waits once, and is skipped on replay.
    fn sleep(&self, duration: Duration) -> KeelResult<()>;

    /// A unique identifier that is stable across replays of the run.
    fn unique_id(&self) -> KeelResult<String>;
}

/// A language model that decides the next action of an agent.
pub trait ModelProvider: Send + Sync {
    /// Produce the next decision for `request`.
    ///
    /// Errors carry the provider's own classification; the model wrapper maps
    /// transient kinds to retries and the rest to terminal failures.
    fn request(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError>;
}

/// A capability the model may invoke by name.
///
/// `D` is the run's dependency bag (API clients, keys, fixed dates, ...),
/// borrowed for the duration of each call.
pub trait Tool<D>: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the arguments object.
    fn parameters(&self) -> Value {
        json!({ "type": "object" })
    }

    /// Declared type of the value returned by `invoke`.
    fn result_type(&self) -> OutputSchema {
        OutputSchema::any_json()
    }

    /// Run the tool body. This is where side effects happen.
    fn invoke(&self, deps: &D, arguments: &Value) -> Result<Value, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}
