//! Handler 3: Prompt Chaining
//!
//! Three model calls in sequence, each one a durable step of its own that
//! consumes the previous step's output:
//!
//!   1. "Extract metrics"   pull `metric: value` lines out of a report
//!   2. "Sort metrics"      order them by value, largest first
//!   3. "Format as table"   render them as a markdown table
//!
//! No agent loop is involved; the handler calls the model directly inside
//! `run_typed`. The provider is unavailable on the very first request, so the
//! first step is recorded after two attempts.

use std::sync::Arc;

use tracing::info;

use keel_config::RuntimeConfig;
use keel_contracts::{
    error::{KeelError, KeelResult},
    message::Message,
    model::{ModelRequest, ModelResponse, ProviderError, ProviderErrorKind},
    retry::RetryPolicy,
};
use keel_core::{run_typed, DurableContext, ModelProvider};

use crate::{
    mock_data::{extract_metric_lines, markdown_table, sort_metric_lines, EXAMPLE_REPORT},
    scenarios::{demo_journal, print_journal, runtime_config},
    scripted::{text, user_prompt, Flaky, FnModel},
};

const EXTRACT_PROMPT: &str = "Extract only the numerical values and their associated metrics from the text. \
     Format each as 'metric name: metric' on a new line. Input: ";
const SORT_PROMPT: &str = "Sort all lines in descending order by numerical value. Input: ";
const TABLE_PROMPT: &str =
    "Format the sorted data as a markdown table with columns 'Metric Name' and 'Value'. Input: ";

// ── Scripted model ────────────────────────────────────────────────────────────

/// Follows whichever of the three chain instructions it is given.
pub fn analyst_model(
) -> FnModel<impl Fn(&ModelRequest) -> Result<ModelResponse, ProviderError> + Send + Sync> {
    FnModel::new(|request: &ModelRequest| {
        let prompt = user_prompt(request);
        if let Some(input) = prompt.strip_prefix(EXTRACT_PROMPT) {
            Ok(text(extract_metric_lines(input)))
        } else if let Some(input) = prompt.strip_prefix(SORT_PROMPT) {
            Ok(text(sort_metric_lines(input)))
        } else if let Some(input) = prompt.strip_prefix(TABLE_PROMPT) {
            Ok(text(markdown_table(input)))
        } else {
            Err(ProviderError::new(
                ProviderErrorKind::InvalidRequest,
                "instruction not understood",
            ))
        }
    })
}

// ── Handler ───────────────────────────────────────────────────────────────────

/// A three-step prompt chain over one model.
pub struct PromptChain {
    provider: Arc<dyn ModelProvider>,
    model: String,
    instructions: String,
    retry: RetryPolicy,
}

impl PromptChain {
    /// Take model, instructions and retry policy from the `chaining` agent.
    pub fn from_config(config: &RuntimeConfig, provider: Arc<dyn ModelProvider>) -> KeelResult<Self> {
        let agent = config.agent("chaining")?;
        Ok(Self {
            provider,
            model: agent.model.clone(),
            instructions: agent.instructions.clone(),
            retry: config.effective_retry(agent),
        })
    }

    /// One model call with a single user prompt, returning its text.
    ///
    /// Provider errors the provider calls transient, and empty answers, are
    /// `Transient`; everything else is `Terminal`.
    pub fn llm_call(&self, prompt: &str) -> KeelResult<String> {
        if prompt.is_empty() {
            return Err(KeelError::CallerError {
                reason: "either a prompt or a message history must be provided".to_string(),
            });
        }

        let request = ModelRequest {
            model: self.model.clone(),
            instructions: self.instructions.clone(),
            history: vec![Message::User { content: prompt.to_string() }],
            tools: vec![],
            output_schema: None,
        };

        match self.provider.request(&request) {
            Ok(ModelResponse::Text { content }) if !content.trim().is_empty() => Ok(content),
            Ok(ModelResponse::Text { .. }) => Err(KeelError::Transient {
                reason: "no content in model response".to_string(),
            }),
            Ok(other) => Err(KeelError::Terminal {
                reason: format!("expected a text answer, got {:?}", other),
            }),
            Err(e) if e.kind.is_transient() => Err(KeelError::Transient {
                reason: format!("model provider: {e}"),
            }),
            Err(e) => Err(KeelError::Terminal {
                reason: format!("model provider: {e}"),
            }),
        }
    }

    /// Run the chain on `report` inside the run owned by `ctx`.
    pub fn run(&self, ctx: &dyn DurableContext, report: &str) -> KeelResult<String> {
        let metrics: String = run_typed(ctx, "Extract metrics", &self.retry, |_| {
            self.llm_call(&with_input(EXTRACT_PROMPT, report))
        })?;
        info!(run_id = %ctx.run_id(), lines = metrics.lines().count(), "metrics extracted");

        let sorted: String = run_typed(ctx, "Sort metrics", &self.retry, |_| {
            self.llm_call(&with_input(SORT_PROMPT, &metrics))
        })?;

        let table: String = run_typed(ctx, "Format as table", &self.retry, |_| {
            self.llm_call(&with_input(TABLE_PROMPT, &sorted))
        })?;
        info!(run_id = %ctx.run_id(), "prompt chain completed");
        Ok(table)
    }
}

/// The full prompt, or an empty one when there is no input to work on.
fn with_input(instruction: &str, input: &str) -> String {
    if input.trim().is_empty() {
        String::new()
    } else {
        format!("{instruction}{input}")
    }
}

/// Run Handler 3: Prompt Chaining.
pub fn run_scenario() -> KeelResult<()> {
    println!("=== Handler 3: Prompt Chaining ===");
    println!();

    let config = runtime_config()?;
    let provider = Arc::new(Flaky::new(analyst_model(), ProviderErrorKind::Unavailable, 1));
    let chain = PromptChain::from_config(&config, provider.clone())?;
    let journal = demo_journal("chaining-run");

    println!("  Report:");
    for line in EXAMPLE_REPORT.lines() {
        println!("  > {line}");
    }
    println!();

    let table = chain.run(&journal, EXAMPLE_REPORT)?;
    for line in table.lines() {
        println!("  {line}");
    }
    println!();
    println!("  Model requests: {} (one retried)", provider.inner().calls() + 1);
    print_journal(&journal);
    println!();
    println!("  Handler 3 complete.");
    println!();

    journal.finalize()
}
