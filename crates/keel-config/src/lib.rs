//! # keel-config
//!
//! TOML configuration for keel agents.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use keel_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_toml_str(include_str!("../configs/agents.toml"))?;
//! let descriptor: AgentDescriptor<Deps, String> = config.descriptor("weather")?;
//! ```
//!
//! An agent's own `[agents.retry]` table replaces `[defaults]` as a whole;
//! omitted fields take the built-in defaults, not the file's.

pub mod config;
pub mod loader;

pub use config::{AgentConfig, RuntimeConfig};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;

    use keel_contracts::error::KeelError;
    use keel_core::{AgentDescriptor, DEFAULT_MAX_ROUNDS};

    use crate::RuntimeConfig;

    const SAMPLE: &str = r#"
[defaults]
max_attempts = 4
initial_interval_ms = 50

[[agents]]
name = "weather"
model = "openai:gpt-4o-mini"
instructions = "Be concise, reply with one sentence."
max_rounds = 8

[[agents]]
name = "search"
model = "openai:gpt-4o"

[agents.retry]
max_attempts = 2
"#;

    #[test]
    fn parses_agents_and_defaults() {
        let config = RuntimeConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.defaults.max_attempts, 4);
        assert_eq!(config.defaults.initial_interval_ms, 50);
        assert_eq!(config.defaults.backoff_factor, 2.0);

        let search = config.agent("search").unwrap();
        assert_eq!(search.max_rounds, DEFAULT_MAX_ROUNDS);
        assert_eq!(search.instructions, "");
    }

    #[test]
    fn agent_retry_overrides_defaults() {
        let config = RuntimeConfig::from_toml_str(SAMPLE).unwrap();

        let weather = config.agent("weather").unwrap();
        let search = config.agent("search").unwrap();

        assert_eq!(config.effective_retry(weather).max_attempts, 4);
        assert_eq!(config.effective_retry(search).max_attempts, 2);
        assert_eq!(config.effective_retry(search).initial_interval_ms, 200);
    }

    #[test]
    fn builds_a_descriptor() {
        let config = RuntimeConfig::from_toml_str(SAMPLE).unwrap();
        let descriptor: AgentDescriptor<(), String> = config.descriptor("weather").unwrap();

        assert_eq!(descriptor.name, "weather");
        assert_eq!(descriptor.model, "openai:gpt-4o-mini");
        assert_eq!(descriptor.max_rounds, 8);
        assert_eq!(descriptor.retry.max_attempts, 4);
        assert!(descriptor.instructions.starts_with("Be concise"));
    }

    #[test]
    fn unknown_agent_is_a_config_error() {
        let config = RuntimeConfig::from_toml_str(SAMPLE).unwrap();
        match config.agent("nope") {
            Err(KeelError::ConfigError { reason }) => assert!(reason.contains("'nope'")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn empty_document_is_valid() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert!(config.agents.is_empty());
        assert_eq!(config.defaults.max_attempts, 3);
    }

    #[test]
    fn rejects_invalid_values() {
        let cases = [
            "[defaults]\nmax_attempts = 0\n",
            "[defaults]\nbackoff_factor = 0.5\n",
            "[[agents]]\nname = \"a\"\nmodel = \"m\"\nmax_rounds = 0\n",
            "[[agents]]\nname = \"\"\nmodel = \"m\"\n",
            "[[agents]]\nname = \"a\"\nmodel = \"m\"\n[[agents]]\nname = \"a\"\nmodel = \"m\"\n",
            "[[agents]]\nname = \"a\"\nmodel = \"m\"\n[agents.retry]\nmax_attempts = 0\n",
        ];
        for toml in cases {
            assert!(
                matches!(RuntimeConfig::from_toml_str(toml), Err(KeelError::ConfigError { .. })),
                "expected ConfigError for:\n{toml}"
            );
        }
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            RuntimeConfig::from_toml_str("[[agents]\nname ="),
            Err(KeelError::ConfigError { .. })
        ));
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("keel-agents-{}.toml", std::process::id()));
        std::fs::File::create(&path)
            .unwrap()
            .write_all(SAMPLE.as_bytes())
            .unwrap();

        let config = RuntimeConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.agents.len(), 2);
        assert!(matches!(
            RuntimeConfig::from_file(&path),
            Err(KeelError::ConfigError { .. })
        ));
    }
}
