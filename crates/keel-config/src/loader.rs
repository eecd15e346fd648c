//! Loading, validating and applying a `RuntimeConfig`.

use std::path::Path;

use tracing::debug;

use keel_codec::Typed;
use keel_contracts::{
    error::{KeelError, KeelResult},
    retry::RetryPolicy,
};
use keel_core::AgentDescriptor;

use crate::config::{AgentConfig, RuntimeConfig};

impl RuntimeConfig {
    /// Parse `s` as TOML and validate it.
    ///
    /// Returns `KeelError::ConfigError` if the TOML is malformed, does not
    /// match the schema, or holds values the runtime cannot honour.
    pub fn from_toml_str(s: &str) -> KeelResult<Self> {
        let config: RuntimeConfig = toml::from_str(s).map_err(|e| KeelError::ConfigError {
            reason: format!("failed to parse agents TOML: {}", e),
        })?;
        config.validate()?;
        debug!(agents = config.agents.len(), "agent configuration loaded");
        Ok(config)
    }

    /// Read the file at `path` and parse it as an agents file.
    pub fn from_file(path: &Path) -> KeelResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| KeelError::ConfigError {
            reason: format!("failed to read agents file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Look up an agent by name.
    pub fn agent(&self, name: &str) -> KeelResult<&AgentConfig> {
        self.agents
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| KeelError::ConfigError {
                reason: format!("no agent named '{name}' is configured"),
            })
    }

    /// The retry policy `agent` runs under.
    pub fn effective_retry(&self, agent: &AgentConfig) -> RetryPolicy {
        agent.retry.clone().unwrap_or_else(|| self.defaults.clone())
    }

    /// Build the descriptor of the agent called `name`. Tools are registered
    /// by the caller.
    pub fn descriptor<D, O: Typed>(&self, name: &str) -> KeelResult<AgentDescriptor<D, O>> {
        let agent = self.agent(name)?;
        Ok(AgentDescriptor::new(&agent.name, &agent.model)
            .with_instructions(&agent.instructions)
            .with_retry(self.effective_retry(agent))
            .with_max_rounds(agent.max_rounds))
    }

    fn validate(&self) -> KeelResult<()> {
        check_retry("defaults", &self.defaults)?;

        for (i, agent) in self.agents.iter().enumerate() {
            if agent.name.trim().is_empty() {
                return Err(invalid(format!("agent #{i} has an empty name")));
            }
            if agent.model.trim().is_empty() {
                return Err(invalid(format!("agent '{}' has an empty model", agent.name)));
            }
            if agent.max_rounds == 0 {
                return Err(invalid(format!(
                    "agent '{}' must allow at least one round",
                    agent.name
                )));
            }
            if let Some(retry) = &agent.retry {
                check_retry(&agent.name, retry)?;
            }
            if self.agents[..i].iter().any(|a| a.name == agent.name) {
                return Err(invalid(format!("agent '{}' is configured twice", agent.name)));
            }
        }
        Ok(())
    }
}

fn check_retry(owner: &str, retry: &RetryPolicy) -> KeelResult<()> {
    if retry.max_attempts == 0 {
        return Err(invalid(format!("{owner}: max_attempts must be at least 1")));
    }
    if retry.backoff_factor.is_nan() || retry.backoff_factor < 1.0 {
        return Err(invalid(format!(
            "{owner}: backoff_factor must be at least 1.0, got {}",
            retry.backoff_factor
        )));
    }
    Ok(())
}

fn invalid(reason: String) -> KeelError {
    KeelError::ConfigError { reason }
}
