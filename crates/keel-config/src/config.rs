//! Configuration schema.
//!
//! A `RuntimeConfig` is deserialized from TOML. It carries a default retry
//! policy and one `[[agents]]` table per configured agent:
//!
//! ```toml
//! [defaults]
//! max_attempts = 3
//! initial_interval_ms = 200
//!
//! [[agents]]
//! name = "weather"
//! model = "openai:gpt-4o-mini"
//! instructions = "Be concise, reply with one sentence."
//! max_rounds = 8
//!
//! [agents.retry]
//! max_attempts = 5
//! ```

use serde::{Deserialize, Serialize};

use keel_contracts::retry::RetryPolicy;
use keel_core::DEFAULT_MAX_ROUNDS;

fn default_max_rounds() -> u32 {
    DEFAULT_MAX_ROUNDS
}

/// One configured agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Lookup key used by handlers.
    pub name: String,

    /// Provider-qualified model identifier, e.g. `"openai:gpt-4o-mini"`.
    pub model: String,

    /// System instructions given to the model on every round.
    #[serde(default)]
    pub instructions: String,

    /// Maximum number of model rounds before the run fails.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Overrides `RuntimeConfig::defaults` for this agent's steps.
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
}

/// The top-level structure of an agents file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Retry policy for agents that do not set their own.
    #[serde(default)]
    pub defaults: RetryPolicy,

    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}
