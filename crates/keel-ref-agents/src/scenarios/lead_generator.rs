//! Handler 4: Lead Generator
//!
//! Two agents share one run:
//!
//!   1. `freeform_leads` writes LinkedIn search queries for a business as
//!      free text, grouped by priority tier.
//!   2. `structured_leads` converts that text into a `LinkedInLeadQueries`
//!      record.
//!
//! Each agent runs under its own step scope (`freeform/`, `structured/`) so
//! both can start at `model:0`. The structured agent's first answer leaves
//! out `usage_instructions`; the model wrapper rejects it, sends a correction
//! notice, and records only the corrected answer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use keel_codec::Typed;
use keel_config::RuntimeConfig;
use keel_contracts::{
    error::KeelResult,
    model::{ModelRequest, ModelResponse, ProviderError},
};
use keel_core::{Agent, DurableContext, ModelProvider, Scoped};

use crate::{
    mock_data::{freeform_lead_plan, structured_lead_plan, EXAMPLE_BUSINESS},
    scenarios::{demo_journal, print_journal, runtime_config},
    scripted::{is_correction, text, FnModel},
};

// ── Records ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Keywords only: no quotes or special characters.
    pub query: String,
    pub description: String,
}

impl Typed for SearchQuery {
    fn type_name() -> String {
        "search_query".to_string()
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "required": ["query", "description"],
            "properties": {
                "query": { "type": "string", "minLength": 1 },
                "description": { "type": "string" }
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityTier {
    pub tier_name: String,
    pub tier_description: String,
    /// 1 is the highest priority.
    pub priority_level: u32,
    pub queries: Vec<SearchQuery>,
}

impl Typed for PriorityTier {
    fn type_name() -> String {
        "priority_tier".to_string()
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "required": ["tier_name", "tier_description", "priority_level", "queries"],
            "properties": {
                "tier_name": { "type": "string" },
                "tier_description": { "type": "string" },
                "priority_level": { "type": "integer", "minimum": 1 },
                "queries": Vec::<SearchQuery>::json_schema()
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedInLeadQueries {
    pub company_context: String,
    pub total_tiers: u32,
    pub priority_tiers: Vec<PriorityTier>,
    pub usage_instructions: Vec<String>,
}

impl Typed for LinkedInLeadQueries {
    fn type_name() -> String {
        "linkedin_lead_queries".to_string()
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "required": ["company_context", "total_tiers", "priority_tiers", "usage_instructions"],
            "properties": {
                "company_context": { "type": "string" },
                "total_tiers": { "type": "integer", "minimum": 0 },
                "priority_tiers": Vec::<PriorityTier>::json_schema(),
                "usage_instructions": Vec::<String>::json_schema()
            }
        })
    }
}

impl LinkedInLeadQueries {
    pub fn query_count(&self) -> usize {
        self.priority_tiers.iter().map(|t| t.queries.len()).sum()
    }
}

// ── Scripted models ───────────────────────────────────────────────────────────

pub fn freeform_model(
) -> FnModel<impl Fn(&ModelRequest) -> Result<ModelResponse, ProviderError> + Send + Sync> {
    FnModel::new(|_: &ModelRequest| Ok(text(freeform_lead_plan())))
}

/// Answers without `usage_instructions` until it is asked for a correction.
pub fn structured_model(
) -> FnModel<impl Fn(&ModelRequest) -> Result<ModelResponse, ProviderError> + Send + Sync> {
    FnModel::new(|request: &ModelRequest| {
        Ok(ModelResponse::Structured {
            value: structured_lead_plan(is_correction(request)),
        })
    })
}

// ── Handler ───────────────────────────────────────────────────────────────────

pub struct LeadGenerator {
    freeform: Agent<(), String>,
    structured: Agent<(), LinkedInLeadQueries>,
}

impl LeadGenerator {
    pub fn from_config(
        config: &RuntimeConfig,
        freeform_provider: Arc<dyn ModelProvider>,
        structured_provider: Arc<dyn ModelProvider>,
    ) -> KeelResult<Self> {
        Ok(Self {
            freeform: Agent::new(config.descriptor("freeform_leads")?, freeform_provider),
            structured: Agent::new(config.descriptor("structured_leads")?, structured_provider),
        })
    }

    /// Turn a business description into prioritized LinkedIn search queries.
    pub fn run(&self, ctx: &dyn DurableContext, business: &str) -> KeelResult<LinkedInLeadQueries> {
        let freeform = self
            .freeform
            .run(&Scoped::new(ctx, "freeform"), business, &())?
            .output;
        info!(run_id = %ctx.run_id(), chars = freeform.len(), "free-form queries written");

        let prompt = format!(
            "Structure these LinkedIn search queries for automated lead generation: {freeform}"
        );
        let structured = self
            .structured
            .run(&Scoped::new(ctx, "structured"), &prompt, &())?
            .output;
        info!(
            run_id = %ctx.run_id(),
            tiers = structured.priority_tiers.len(),
            queries = structured.query_count(),
            "lead queries structured"
        );
        Ok(structured)
    }
}

/// Run Handler 4: Lead Generator.
pub fn run_scenario() -> KeelResult<()> {
    println!("=== Handler 4: Lead Generator ===");
    println!();

    let config = runtime_config()?;
    let structured_model = Arc::new(structured_model());
    let generator = LeadGenerator::from_config(
        &config,
        Arc::new(freeform_model()),
        structured_model.clone(),
    )?;
    let journal = demo_journal("lead-generator-run");

    let leads = generator.run(&journal, EXAMPLE_BUSINESS)?;

    println!("  Company: {}", leads.company_context);
    for tier in &leads.priority_tiers {
        println!("  Tier {} - {}", tier.priority_level, tier.tier_name);
        for query in &tier.queries {
            println!("    - {:<45} {}", query.query, query.description);
        }
    }
    for instruction in &leads.usage_instructions {
        println!("  * {instruction}");
    }
    println!();
    println!(
        "  Structured model requests: {} (first answer rejected and corrected)",
        structured_model.calls()
    );
    print_journal(&journal);
    println!();
    println!("  Handler 4 complete.");
    println!();

    journal.finalize()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use keel_contracts::error::KeelError;
    use keel_journal::InMemoryJournal;

    use crate::{
        mock_data::{structured_lead_plan, EXAMPLE_BUSINESS},
        scenarios::{demo_journal, runtime_config, skip_sleep},
        scripted::FnModel,
    };

    use super::*;

    fn generator(structured: Arc<dyn ModelProvider>) -> LeadGenerator {
        LeadGenerator::from_config(&runtime_config().unwrap(), Arc::new(freeform_model()), structured)
            .unwrap()
    }

    #[test]
    fn both_agents_run_in_their_own_scope() {
        let structured = Arc::new(structured_model());
        let journal = demo_journal("leads-test");

        let leads = generator(structured.clone()).run(&journal, EXAMPLE_BUSINESS).unwrap();

        assert_eq!(leads.total_tiers, 3);
        assert_eq!(leads.query_count(), 7);
        assert_eq!(leads.usage_instructions.len(), 2);
        assert_eq!(journal.step_names(), vec!["freeform/model:0", "structured/model:0"]);

        // The incomplete first answer cost an attempt but was never recorded.
        assert_eq!(structured.calls(), 2);
        assert_eq!(journal.entries()[1].record.attempts, 2);
    }

    #[test]
    fn structured_prompt_carries_the_freeform_answer() {
        let seen = Arc::new(std::sync::Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        let structured = Arc::new(FnModel::new(move |request: &ModelRequest| {
            *sink.lock().unwrap() = crate::scripted::user_prompt(request).to_string();
            Ok(ModelResponse::Structured { value: structured_lead_plan(true) })
        }));

        generator(structured).run(&demo_journal("leads-prompt"), EXAMPLE_BUSINESS).unwrap();

        let prompt = seen.lock().unwrap().clone();
        assert!(prompt.starts_with("Structure these LinkedIn search queries"));
        assert!(prompt.contains("propriétaire restaurant Québec"));
    }

    #[test]
    fn answers_that_never_validate_exhaust_the_agent_retry_budget() {
        let stubborn = Arc::new(FnModel::new(|_: &ModelRequest| {
            Ok(ModelResponse::Structured { value: structured_lead_plan(false) })
        }));
        let journal = demo_journal("leads-stubborn");

        match generator(stubborn.clone()).run(&journal, EXAMPLE_BUSINESS) {
            Err(KeelError::RunFailed { cause, .. }) => {
                assert!(matches!(*cause, KeelError::RetriesExhausted { attempts: 4, .. }))
            }
            other => panic!("expected RunFailed, got {:?}", other),
        }
        assert_eq!(stubborn.calls(), 4);
    }

    #[test]
    fn replay_returns_the_recorded_record() {
        let journal = demo_journal("leads-replay");
        let first = generator(Arc::new(structured_model()))
            .run(&journal, EXAMPLE_BUSINESS)
            .unwrap();

        let untouched = Arc::new(structured_model());
        let replay = InMemoryJournal::resume(journal.export_snapshot().unwrap())
            .unwrap()
            .with_sleeper(skip_sleep);
        let second = generator(untouched.clone()).run(&replay, EXAMPLE_BUSINESS).unwrap();

        assert_eq!(first, second);
        assert_eq!(untouched.calls(), 0);
    }
}
