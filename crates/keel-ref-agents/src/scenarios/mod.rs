//! Reference handlers.
//!
//! Each handler wires real keel components (config loader, agents, journal,
//! durable helpers) to a scripted model and mock services, and prints what
//! the journal recorded. None of them talks to a network.

pub mod chaining;
pub mod crash_replay;
pub mod lead_generator;
pub mod message;
pub mod search;
pub mod weather;

use tracing::debug;

use keel_config::RuntimeConfig;
use keel_contracts::{error::KeelResult, run::RunId};
use keel_journal::InMemoryJournal;

// ── Agents file ───────────────────────────────────────────────────────────────

/// Embedded agents file shared by every handler.
const AGENTS_TOML: &str = include_str!("../../configs/agents.toml");

pub fn runtime_config() -> KeelResult<RuntimeConfig> {
    RuntimeConfig::from_toml_str(AGENTS_TOML)
}

// ── Journal helpers ───────────────────────────────────────────────────────────

/// A fresh journal whose backoff delays and durable timers are logged
/// instead of slept, so the demo finishes instantly.
pub fn demo_journal(run_id: &str) -> InMemoryJournal {
    InMemoryJournal::new(RunId::from(run_id)).with_sleeper(skip_sleep)
}

pub(crate) fn skip_sleep(duration: std::time::Duration) {
    debug!(millis = duration.as_millis() as u64, "sleep skipped");
}

/// Print the recorded steps and whether the hash chain verifies.
pub fn print_journal(journal: &InMemoryJournal) {
    println!("  Journal ({} step(s)):", journal.len());
    for entry in journal.entries() {
        println!(
            "    #{:<2} {:<28} attempts={} {}",
            entry.sequence,
            entry.record.name.to_string(),
            entry.record.attempts,
            if entry.record.is_completed() { "completed" } else { "failed" },
        );
    }
    println!(
        "  Journal chain integrity: {}",
        if journal.verify_integrity() { "VERIFIED" } else { "FAILED" }
    );
}
