//! Handler 2: Web Search Agent
//!
//! The model looks up today's date, searches the web with a date-qualified
//! query, and answers with links. The search API rate-limits the first
//! request, so the `search` step is recorded after two attempts; replaying
//! the run never repeats either attempt.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use keel_codec::Typed;
use keel_config::RuntimeConfig;
use keel_contracts::{
    error::KeelResult,
    model::{ModelRequest, ModelResponse, ProviderError},
    tool::ToolError,
};
use keel_core::{Agent, DurableContext, FnTool, ModelProvider, Tool};

use crate::{
    mock_data::web_search,
    scenarios::{demo_journal, print_journal, runtime_config},
    scripted::{call, returns_of, text, tool_rounds, user_prompt, FnModel},
};

pub const EXAMPLE_PROMPT: &str =
    "Give me the box scores for all Major League baseball games yesterday and give me links to each game.";

// ── Dependencies and records ──────────────────────────────────────────────────

pub struct SearchDeps {
    /// `YYYY-MM-DD`, fixed when the request arrives.
    pub todays_date: String,
    pub max_results: usize,
    /// How many more search requests the API will reject with a rate limit.
    pub rate_limited: AtomicU32,
}

impl SearchDeps {
    pub fn for_today() -> Self {
        Self::on(&Local::now().format("%Y-%m-%d").to_string())
    }

    pub fn on(todays_date: &str) -> Self {
        Self {
            todays_date: todays_date.to_string(),
            max_results: 10,
            rate_limited: AtomicU32::new(0),
        }
    }

    pub fn rate_limited(self, requests: u32) -> Self {
        self.rate_limited.store(requests, Ordering::SeqCst);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub content: String,
    pub score: f64,
    #[serde(default)]
    pub raw_content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub response_time: f64,
    pub request_id: String,
}

impl Typed for SearchResponse {
    fn type_name() -> String {
        "search_response".to_string()
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "required": ["query", "results", "response_time", "request_id"],
            "properties": {
                "query": { "type": "string" },
                "results": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["url", "title", "content", "score"],
                        "properties": {
                            "url": { "type": "string" },
                            "title": { "type": "string" },
                            "content": { "type": "string" },
                            "score": { "type": "number" },
                            "raw_content": { "type": ["string", "null"] }
                        }
                    }
                },
                "response_time": { "type": "number" },
                "request_id": { "type": "string" }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct NoArgs {}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    query: String,
}

// ── Tools ─────────────────────────────────────────────────────────────────────

pub fn get_todays_date() -> impl Tool<SearchDeps> {
    FnTool::new(
        "get_todays_date",
        "Returns today's date.",
        json!({ "type": "object", "properties": {} }),
        |deps: &SearchDeps, _: NoArgs| -> Result<String, ToolError> { Ok(deps.todays_date.clone()) },
    )
}

pub fn search() -> impl Tool<SearchDeps> {
    FnTool::new(
        "search",
        "Web search API.",
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": { "type": "string", "description": "Search query terms" }
            }
        }),
        |deps: &SearchDeps, args: QueryArgs| -> Result<SearchResponse, ToolError> {
            let throttled = deps
                .rate_limited
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if throttled {
                warn!(query = %args.query, "search API rate limited the request");
                return Err(ToolError::retriable("429 Too Many Requests"));
            }

            let raw = web_search(&args.query, &deps.todays_date, deps.max_results);
            serde_json::from_value(raw)
                .map_err(|e| ToolError::terminal(format!("unexpected search API response: {e}")))
        },
    )
}

// ── Scripted model ────────────────────────────────────────────────────────────

pub fn search_model(
) -> FnModel<impl Fn(&ModelRequest) -> Result<ModelResponse, ProviderError> + Send + Sync> {
    FnModel::new(|request: &ModelRequest| match tool_rounds(request) {
        0 => Ok(ModelResponse::ToolCalls {
            calls: vec![call(0, 0, "get_todays_date", json!({}))],
        }),
        1 => {
            let date = returns_of(request, "get_todays_date")
                .first()
                .and_then(|ret| ret.content.as_str())
                .unwrap_or("today")
                .to_string();
            let prompt = user_prompt(request);
            let topic = if prompt.to_lowercase().contains("baseball") {
                "MLB box scores"
            } else {
                prompt
            };
            let query = format!("{topic} {date}");
            Ok(ModelResponse::ToolCalls {
                calls: vec![call(1, 0, "search", json!({ "query": query }))],
            })
        }
        _ => {
            let links: Vec<String> = returns_of(request, "search")
                .iter()
                .filter_map(|ret| ret.content["results"].as_array())
                .flatten()
                .map(|r| {
                    format!(
                        "- [{}]({})",
                        r["title"].as_str().unwrap_or("untitled"),
                        r["url"].as_str().unwrap_or("")
                    )
                })
                .collect();
            if links.is_empty() {
                Ok(text("I could not find any box scores."))
            } else {
                Ok(text(format!("Here are yesterday's box scores:\n{}", links.join("\n"))))
            }
        }
    })
}

// ── Handler ───────────────────────────────────────────────────────────────────

pub fn search_agent(
    config: &RuntimeConfig,
    provider: Arc<dyn ModelProvider>,
) -> KeelResult<Agent<SearchDeps, String>> {
    let descriptor = config
        .descriptor::<SearchDeps, String>("search")?
        .with_tool(get_todays_date())
        .with_tool(search());
    Ok(Agent::new(descriptor, provider))
}

pub fn handle(
    ctx: &dyn DurableContext,
    agent: &Agent<SearchDeps, String>,
    deps: &SearchDeps,
    prompt: &str,
) -> KeelResult<String> {
    Ok(agent.run(ctx, prompt, deps)?.output)
}

/// Run Handler 2: Web Search Agent.
pub fn run_scenario() -> KeelResult<()> {
    println!("=== Handler 2: Web Search Agent ===");
    println!();

    let config = runtime_config()?;
    let deps = SearchDeps::for_today().rate_limited(1);
    let agent = search_agent(&config, Arc::new(search_model()))?;
    let journal = demo_journal("search-run");

    println!("  Prompt:  {EXAMPLE_PROMPT}");
    println!("  Today:   {}", deps.todays_date);
    println!("  Search API: first request rate limited");
    println!();

    let answer = handle(&journal, &agent, &deps, EXAMPLE_PROMPT)?;
    for line in answer.lines() {
        println!("  | {line}");
    }
    println!();
    print_journal(&journal);
    println!();
    println!("  Handler 2 complete.");
    println!();

    journal.finalize()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use keel_contracts::error::KeelError;

    use crate::scenarios::{demo_journal, runtime_config};

    use super::*;

    fn agent() -> Agent<SearchDeps, String> {
        search_agent(&runtime_config().unwrap(), Arc::new(search_model())).unwrap()
    }

    #[test]
    fn date_then_search_then_answer_with_links() {
        let journal = demo_journal("search-test");
        let deps = SearchDeps::on("2026-10-15");

        let answer = handle(&journal, &agent(), &deps, EXAMPLE_PROMPT).unwrap();

        assert!(answer.contains("(https://www.mlb.com/scores?date=2026-10-15)"), "answer: {answer}");
        assert_eq!(
            journal.step_names(),
            vec!["model:0", "tool:0:get_todays_date", "model:1", "tool:1:search", "model:2"]
        );
    }

    #[test]
    fn rate_limited_search_is_retried_inside_one_step() {
        let journal = demo_journal("search-ratelimit");
        let deps = SearchDeps::on("2026-10-15").rate_limited(2);

        handle(&journal, &agent(), &deps, EXAMPLE_PROMPT).unwrap();

        let search_entry = journal
            .entries()
            .into_iter()
            .find(|e| e.record.name.to_string() == "tool:1:search")
            .unwrap();
        assert_eq!(search_entry.record.attempts, 3);
        assert_eq!(deps.rate_limited.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rate_limit_beyond_the_ceiling_fails_the_run() {
        let journal = demo_journal("search-exhausted");
        let deps = SearchDeps::on("2026-10-15").rate_limited(5);

        match handle(&journal, &agent(), &deps, EXAMPLE_PROMPT) {
            Err(KeelError::RunFailed { cause, .. }) => {
                assert!(matches!(*cause, KeelError::RetriesExhausted { attempts: 3, .. }))
            }
            other => panic!("expected RunFailed, got {:?}", other),
        }
        // The failure itself is journaled so a replay surfaces it unchanged.
        assert_eq!(journal.step_names().last().map(String::as_str), Some("tool:1:search"));
    }

    #[test]
    fn search_response_matches_its_declared_type() {
        let response = search()
            .invoke(&SearchDeps::on("2026-10-15"), &json!({ "query": "MLB box scores" }))
            .unwrap();
        let parsed: SearchResponse = serde_json::from_value(response).unwrap();
        assert_eq!(parsed.query, "MLB box scores");
        assert_eq!(parsed.results.len(), 2);
    }
}
