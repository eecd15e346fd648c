//! Error taxonomy for the keel runtime.
//!
//! All fallible operations return `KeelResult<T>`. Errors are serializable so
//! that a terminal step failure can be journaled and surfaced unchanged on
//! replay.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the runtime treats an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input from the caller or the model. Never retried.
    Caller,
    /// Worth another attempt, up to the retry ceiling.
    Transient,
    /// Ends the step (and the run) without further attempts.
    Terminal,
    /// A stored or produced value does not match its declared type.
    DataIntegrity,
    /// The journal itself can no longer be trusted for this run.
    Fatal,
    /// The engine interrupted the run; resume by replaying the journal.
    Interrupted,
}

/// The unified error type for the keel runtime.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum KeelError {
    /// The caller violated a precondition (e.g. neither prompt nor history).
    #[error("caller error: {reason}")]
    CallerError { reason: String },

    /// The model asked for a tool that is not registered with the agent.
    #[error("unknown tool '{tool_name}' requested by the model")]
    UnknownTool { tool_name: String },

    /// A temporary failure (timeout, rate limit, flaky I/O).
    #[error("transient failure: {reason}")]
    Transient { reason: String },

    /// The model's final answer did not satisfy the declared output type.
    #[error("output validation failed: {reason}")]
    OutputValidation { reason: String },

    /// A failure explicitly marked as not worth retrying.
    #[error("terminal failure: {reason}")]
    Terminal { reason: String },

    /// A step kept failing until its attempt ceiling was reached.
    #[error("step '{step}' exhausted {attempts} attempt(s): {last_error}")]
    RetriesExhausted {
        step: String,
        attempts: u32,
        last_error: String,
    },

    /// A value was decoded as a different type than it was written as.
    #[error("schema mismatch: expected '{expected}', found '{found}'")]
    SchemaMismatch { expected: String, found: String },

    /// A value could not be encoded or its stored bytes are malformed.
    #[error("invalid payload: {reason}")]
    InvalidPayload { reason: String },

    /// Replay issued a different step than the one recorded at this position.
    #[error("journal divergence at position {position}: recorded '{recorded}', replay issued '{issued}'")]
    JournalDivergence {
        position: u64,
        recorded: String,
        issued: String,
    },

    /// The journal could not persist a step record.
    #[error("journal write failed: {reason}")]
    JournalWriteFailed { reason: String },

    /// The loop used up its round budget without a final answer.
    #[error("agent loop exceeded {max_rounds} model round(s) without a final answer")]
    MaxRoundsExceeded { max_rounds: u32 },

    /// The run was aborted or passed its deadline.
    #[error("run '{run_id}' cancelled: {reason}")]
    Cancelled { run_id: String, reason: String },

    /// The engine stopped the run before `step`; the journal can resume it.
    #[error("run suspended before step '{step}'")]
    Suspended { step: String },

    /// The loop reached its `Failed` state.
    #[error("run '{run_id}' failed: {cause}")]
    RunFailed { run_id: String, cause: Box<KeelError> },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl KeelError {
    pub fn class(&self) -> ErrorClass {
        match self {
            KeelError::CallerError { .. } | KeelError::UnknownTool { .. } => ErrorClass::Caller,
            KeelError::Transient { .. } | KeelError::OutputValidation { .. } => ErrorClass::Transient,
            KeelError::Terminal { .. }
            | KeelError::RetriesExhausted { .. }
            | KeelError::MaxRoundsExceeded { .. }
            | KeelError::Cancelled { .. }
            | KeelError::RunFailed { .. }
            | KeelError::ConfigError { .. } => ErrorClass::Terminal,
            KeelError::SchemaMismatch { .. } | KeelError::InvalidPayload { .. } => {
                ErrorClass::DataIntegrity
            }
            KeelError::JournalDivergence { .. } | KeelError::JournalWriteFailed { .. } => {
                ErrorClass::Fatal
            }
            KeelError::Suspended { .. } => ErrorClass::Interrupted,
        }
    }

    /// True when another attempt of the same step may succeed.
    pub fn is_retriable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// The innermost cause, looking through `RunFailed` wrappers.
    pub fn root_cause(&self) -> &KeelError {
        match self {
            KeelError::RunFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

/// Convenience alias used throughout the keel crates.
pub type KeelResult<T> = Result<T, KeelError>;
