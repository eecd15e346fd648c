//! Handler 6: Crash and Replay
//!
//! A one-tool agent is opened through a `JournalStore`, and the engine is
//! told to crash as soon as two steps are recorded. The run suspends right
//! after `tool:0:search` completed. The stored snapshot is shipped as JSON to
//! a second store (a fresh process, as far as the run can tell) and the run
//! is opened again there: `model:0` and `tool:0:search` are replayed from the
//! journal and only `model:1` reaches the model.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use serde::Deserialize;
use serde_json::json;

use keel_contracts::{
    error::{KeelError, KeelResult},
    model::{ModelRequest, ModelResponse, ProviderError},
    retry::RetryPolicy,
    run::RunId,
    tool::ToolError,
};
use keel_core::{Agent, AgentDescriptor, FnTool, ModelProvider};
use keel_journal::{JournalSnapshot, JournalStore};

use crate::{
    scenarios::{print_journal, skip_sleep},
    scripted::{call, text, tool_rounds, FnModel},
};

const PROMPT: &str = "Find X";

#[derive(Debug, Deserialize)]
struct QueryArgs {
    query: String,
}

pub fn search_then_answer(
) -> FnModel<impl Fn(&ModelRequest) -> Result<ModelResponse, ProviderError> + Send + Sync> {
    FnModel::new(|request: &ModelRequest| {
        if tool_rounds(request) == 0 {
            Ok(ModelResponse::ToolCalls {
                calls: vec![call(0, 0, "search", json!({ "query": "X" }))],
            })
        } else {
            Ok(text("Done"))
        }
    })
}

/// An agent whose `search` tool counts its invocations in `searches`.
pub fn counting_agent(
    provider: Arc<dyn ModelProvider>,
    searches: Arc<AtomicU32>,
) -> Agent<(), String> {
    let search = FnTool::new(
        "search",
        "Search for a term.",
        json!({ "type": "object", "required": ["query"] }),
        move |_: &(), args: QueryArgs| -> Result<String, ToolError> {
            searches.fetch_add(1, Ordering::SeqCst);
            Ok(format!("R({})", args.query))
        },
    );
    Agent::new(
        AgentDescriptor::new("searcher", "test:model")
            .with_tool(search)
            .with_retry(RetryPolicy::immediate(3)),
        provider,
    )
}

/// Run the agent in `store` with a crash injected after `crash_after`
/// recorded steps. Returns the step the run was suspended before, if any.
pub fn run_until_crash(
    store: &JournalStore,
    run_id: &RunId,
    agent: &Agent<(), String>,
    crash_after: usize,
) -> KeelResult<Option<String>> {
    let run = store.open_with(run_id, |journal| {
        journal.with_sleeper(skip_sleep).crash_after(crash_after)
    })?;
    match agent.run(run.journal(), PROMPT, &()) {
        Err(KeelError::Suspended { step }) => Ok(Some(step)),
        Err(e) => Err(e),
        Ok(_) => Ok(None),
    }
}

/// Move a run's snapshot from one store to another through its JSON form.
pub fn ship(from: &JournalStore, to: &JournalStore, run_id: &RunId) -> KeelResult<usize> {
    let snapshot = from.snapshot(run_id).ok_or_else(|| KeelError::CallerError {
        reason: format!("no snapshot stored for run '{run_id}'"),
    })?;
    let json = snapshot.to_json()?;
    to.import(JournalSnapshot::from_json(&json)?)?;
    Ok(json.len())
}

/// Run Handler 6: Crash and Replay.
pub fn run_scenario() -> KeelResult<()> {
    println!("=== Handler 6: Crash and Replay ===");
    println!();

    let run_id = RunId::from("crash-replay-run");
    let searches = Arc::new(AtomicU32::new(0));
    let model = Arc::new(search_then_answer());
    let agent = counting_agent(model.clone(), Arc::clone(&searches));

    // ── First process: crash after two recorded steps ─────────────────────────

    let first = JournalStore::new();
    match run_until_crash(&first, &run_id, &agent, 2)? {
        Some(step) => println!("  Process 1: suspended before '{step}'"),
        None => println!("  Process 1: finished before the crash point"),
    }
    println!(
        "  Process 1: model requests={} searches={}",
        model.calls(),
        searches.load(Ordering::SeqCst)
    );

    // ── Second process: import the snapshot and resume ───────────────────────

    let second = JournalStore::new();
    let bytes = ship(&first, &second, &run_id)?;
    println!("  Snapshot shipped: {bytes} bytes of JSON");

    let run = second.open(&run_id)?;
    let out = agent.run(run.journal(), PROMPT, &())?;
    println!("  Process 2: output={:?}", out.output);
    println!(
        "  Process 2: model requests={} searches={} (search ran once in total)",
        model.calls(),
        searches.load(Ordering::SeqCst)
    );
    println!();
    print_journal(run.journal());
    run.finalize()?;
    println!();
    println!("  Handler 6 complete.");
    println!();

    Ok(())
}
