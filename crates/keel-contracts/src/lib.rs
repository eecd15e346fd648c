//! # keel-contracts
//!
//! Shared types, step records, and the error taxonomy for the keel durable
//! agent runtime.
//!
//! Every crate in the workspace imports from here. No business logic lives in
//! this crate: only data definitions and error types.

pub mod error;
pub mod message;
pub mod model;
pub mod retry;
pub mod run;
pub mod schema;
pub mod step;
pub mod tool;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use error::{ErrorClass, KeelError};
    use message::{Message, MessageHistory, ToolCall};
    use model::{ModelResponse, ProviderErrorKind};
    use retry::RetryPolicy;
    use run::{RunId, StepKind, StepName};
    use step::{StepOutcome, StepRecord};

    // ── StepName ─────────────────────────────────────────────────────────────

    #[test]
    fn step_names_follow_role_and_ordinal() {
        assert_eq!(StepName::model(0).as_str(), "model:0");
        assert_eq!(StepName::tool(0, "search").as_str(), "tool:0:search");
        assert_eq!(StepName::tool(12, "get_weather").to_string(), "tool:12:get_weather");
        assert_eq!(StepName::sleep(2).as_str(), "sleep:2");
        assert_eq!(StepName::unique_id(1).as_str(), "uuid:1");
        assert_eq!(StepName::custom("Extract metrics").as_str(), "Extract metrics");
    }

    #[test]
    fn step_name_kind_is_preserved() {
        assert_eq!(StepName::model(3).kind(), StepKind::Model);
        assert_eq!(StepName::tool(3, "x").kind(), StepKind::Tool);
        assert_eq!(StepName::custom("notify").kind(), StepKind::Custom);
    }

    #[test]
    fn scoped_step_name_keeps_its_kind() {
        let scoped = StepName::tool(1, "search").within("freeform");
        assert_eq!(scoped.as_str(), "freeform/tool:1:search");
        assert_eq!(scoped.kind(), StepKind::Tool);
    }

    #[test]
    fn run_id_new_produces_unique_values() {
        let ids: std::collections::HashSet<String> =
            (0..100).map(|_| RunId::new().0).collect();
        assert_eq!(ids.len(), 100);
    }

    // ── RetryPolicy ──────────────────────────────────────────────────────────

    #[test]
    fn retry_delay_grows_geometrically_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_interval_ms: 100,
            backoff_factor: 2.0,
            max_interval_ms: 350,
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(350));
        assert_eq!(policy.delay_after(9), Duration::from_millis(350));
    }

    #[test]
    fn immediate_policy_never_waits() {
        let policy = RetryPolicy::immediate(4);
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay_after(3), Duration::ZERO);
    }

    // ── Messages ─────────────────────────────────────────────────────────────

    #[test]
    fn history_is_append_only_and_ordered() {
        let mut history = MessageHistory::new();
        assert!(history.is_empty());
        history.push(Message::User { content: "hi".to_string() });
        history.push(Message::Assistant { content: "hello".to_string() });

        assert_eq!(history.len(), 2);
        assert!(matches!(history.as_slice()[0], Message::User { .. }));
        assert!(matches!(history.last(), Some(Message::Assistant { .. })));
    }

    #[test]
    fn model_response_tool_calls_are_not_final() {
        let calls = ModelResponse::ToolCalls {
            calls: vec![ToolCall {
                call_id: "c1".to_string(),
                tool_name: "search".to_string(),
                arguments: json!({ "query": "X" }),
            }],
        };
        assert!(!calls.is_final());
        assert!(matches!(calls.to_message(), Message::ToolCalls { .. }));
        assert!(ModelResponse::Text { content: "Done".to_string() }.is_final());
    }

    #[test]
    fn model_response_serde_round_trips() {
        let original = ModelResponse::Structured { value: json!({ "a": [1, 2] }) };
        let text = serde_json::to_string(&original).unwrap();
        assert!(text.contains("\"kind\":\"structured\""));
        let decoded: ModelResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn provider_error_kinds_split_transient_from_terminal() {
        assert!(ProviderErrorKind::RateLimited.is_transient());
        assert!(ProviderErrorKind::Timeout.is_transient());
        assert!(ProviderErrorKind::Unavailable.is_transient());
        assert!(!ProviderErrorKind::InvalidRequest.is_transient());
        assert!(!ProviderErrorKind::Authentication.is_transient());
        assert!(!ProviderErrorKind::ContentFiltered.is_transient());
    }

    // ── StepRecord ───────────────────────────────────────────────────────────

    #[test]
    fn failed_step_record_round_trips_with_its_error() {
        let record = StepRecord::failed(
            StepName::tool(0, "notify"),
            json!({ "to": "alice" }),
            1,
            KeelError::Terminal { reason: "bad address".to_string() },
        );
        let text = serde_json::to_string(&record).unwrap();
        let decoded: StepRecord = serde_json::from_str(&text).unwrap();

        assert!(!decoded.is_completed());
        match decoded.outcome {
            StepOutcome::Failed { error } => {
                assert_eq!(error, KeelError::Terminal { reason: "bad address".to_string() })
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    // ── KeelError ────────────────────────────────────────────────────────────

    #[test]
    fn error_classes() {
        assert_eq!(
            KeelError::CallerError { reason: "x".into() }.class(),
            ErrorClass::Caller
        );
        assert_eq!(
            KeelError::UnknownTool { tool_name: "x".into() }.class(),
            ErrorClass::Caller
        );
        assert!(KeelError::Transient { reason: "x".into() }.is_retriable());
        assert!(KeelError::OutputValidation { reason: "x".into() }.is_retriable());
        assert!(!KeelError::Terminal { reason: "x".into() }.is_retriable());
        assert_eq!(
            KeelError::SchemaMismatch { expected: "a".into(), found: "b".into() }.class(),
            ErrorClass::DataIntegrity
        );
        assert_eq!(
            KeelError::JournalDivergence { position: 0, recorded: "a".into(), issued: "b".into() }
                .class(),
            ErrorClass::Fatal
        );
        assert_eq!(
            KeelError::Suspended { step: "model:1".into() }.class(),
            ErrorClass::Interrupted
        );
    }

    #[test]
    fn error_run_failed_display_and_root_cause() {
        let err = KeelError::RunFailed {
            run_id: "run-1".to_string(),
            cause: Box::new(KeelError::UnknownTool { tool_name: "launch".to_string() }),
        };
        let msg = err.to_string();
        assert!(msg.contains("run-1"));
        assert!(msg.contains("launch"));
        assert_eq!(
            err.root_cause(),
            &KeelError::UnknownTool { tool_name: "launch".to_string() }
        );
    }

    #[test]
    fn error_retries_exhausted_display() {
        let err = KeelError::RetriesExhausted {
            step: "tool:0:search".to_string(),
            attempts: 3,
            last_error: "timeout".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("tool:0:search"));
        assert!(msg.contains("3 attempt"));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn error_divergence_display() {
        let err = KeelError::JournalDivergence {
            position: 4,
            recorded: "tool:1:search".to_string(),
            issued: "model:2".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("position 4"));
        assert!(msg.contains("tool:1:search"));
        assert!(msg.contains("model:2"));
    }

    #[test]
    fn error_config_display() {
        let err = KeelError::ConfigError { reason: "missing agents table".to_string() };
        let msg = err.to_string();
        assert!(msg.contains("configuration error"));
        assert!(msg.contains("missing agents table"));
    }
}
