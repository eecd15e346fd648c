//! keel reference handlers: demo CLI
//!
//! Runs one or all of the reference handlers. Each handler uses real keel
//! components (agents, journal, config loader) wired to scripted models and
//! mock services.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- weather
//!   cargo run -p demo -- crash-replay
//!   cargo run -p demo -- check-config crates/keel-ref-agents/configs/agents.toml

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use keel_config::RuntimeConfig;
use keel_contracts::error::KeelResult;
use keel_ref_agents::scenarios::{chaining, crash_replay, lead_generator, message, search, weather};

// ── CLI definition ────────────────────────────────────────────────────────────

/// keel: durable agent loops on a replayable journal.
///
/// Each subcommand runs one or all of the reference handlers and prints the
/// steps the journal recorded for it.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "keel reference handlers demo",
    long_about = "Runs keel reference handlers showing journaled model and tool steps,\n\
                  retries inside a step, and crash recovery by replay."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every handler in sequence.
    RunAll,
    /// Handler 1: Weather Agent (two tools, replay of a completed run).
    Weather,
    /// Handler 2: Web Search Agent (rate-limited tool retried in its step).
    Search,
    /// Handler 3: Prompt Chaining (three typed steps).
    Chaining,
    /// Handler 4: Lead Generator (two scoped agents, structured output).
    LeadGenerator,
    /// Handler 5: Message Service (durable id, timers, retried deliveries).
    Message,
    /// Handler 6: Crash and Replay (suspend, ship snapshot, resume).
    CrashReplay,
    /// Load and validate an agents file, then list its agents.
    CheckConfig {
        /// Path to the agents TOML file.
        path: PathBuf,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug to see every step, attempt and skipped sleep.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(),
        Command::Weather => weather::run_scenario(),
        Command::Search => search::run_scenario(),
        Command::Chaining => chaining::run_scenario(),
        Command::LeadGenerator => lead_generator::run_scenario(),
        Command::Message => message::run_scenario(),
        Command::CrashReplay => crash_replay::run_scenario(),
        Command::CheckConfig { path } => check_config(&path),
    };

    match result {
        Ok(()) => {
            println!("All selected handlers completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Handler dispatch ──────────────────────────────────────────────────────────

fn run_all() -> KeelResult<()> {
    weather::run_scenario()?;
    search::run_scenario()?;
    chaining::run_scenario()?;
    lead_generator::run_scenario()?;
    message::run_scenario()?;
    crash_replay::run_scenario()?;
    Ok(())
}

fn check_config(path: &Path) -> KeelResult<()> {
    let config = RuntimeConfig::from_file(path)?;
    println!("  {} agent(s) in {}", config.agents.len(), path.display());
    for agent in &config.agents {
        let retry = config.effective_retry(agent);
        println!(
            "    {:<18} {:<22} max_rounds={:<3} max_attempts={}",
            agent.name, agent.model, agent.max_rounds, retry.max_attempts
        );
    }
    println!();
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("keel: Durable Agent Runtime");
    println!("Reference Handlers Demo");
    println!("===========================");
    println!();
    println!("Every agent action is one journaled step:");
    println!("  [1] model:<n>          one model round, retried and corrected inside the step");
    println!("  [2] tool:<n>:<name>    one tool call, its side effect runs at most once");
    println!("  [3] replay             recorded steps are served from the journal, in order");
    println!("  [4] journal            append-only, SHA-256 hash chain per run");
    println!();
}
