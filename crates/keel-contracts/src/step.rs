//! Journal records for durable steps.
//!
//! `StepRecord` is what the durable execution engine stores for every step
//! that reaches a final outcome, successful or not. On replay the engine hands
//! the recorded outcome back instead of running the step again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::KeelError, run::StepName};

/// The final outcome of one durable step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The action succeeded; `payload` is the codec-encoded result.
    Completed { payload: Vec<u8> },
    /// The action failed terminally; replay surfaces the same error.
    Failed { error: KeelError },
}

/// An immutable record of one durable step.
///
/// Records are appended in the order steps are issued and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Deterministic step name (`model:0`, `tool:3:search`, ...).
    pub name: StepName,
    /// What the step was asked to do: tool arguments, a model-request summary,
    /// or `Null` for engine steps.
    pub input: Value,
    /// How many times the action ran before this outcome was reached.
    pub attempts: u32,
    pub outcome: StepOutcome,
    /// Wall-clock time the record was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl StepRecord {
    pub fn completed(name: StepName, input: Value, attempts: u32, payload: Vec<u8>) -> Self {
        Self {
            name,
            input,
            attempts,
            outcome: StepOutcome::Completed { payload },
            timestamp: Utc::now(),
        }
    }

    pub fn failed(name: StepName, input: Value, attempts: u32, error: KeelError) -> Self {
        Self {
            name,
            input,
            attempts,
            outcome: StepOutcome::Failed { error },
            timestamp: Utc::now(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, StepOutcome::Completed { .. })
    }
}
