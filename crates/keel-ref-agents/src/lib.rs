//! # keel-ref-agents
//!
//! Reference handlers for the keel durable agent runtime.
//!
//! Demonstrates six handlers against scripted models and mock services:
//!
//! 1. **Weather Agent**: two tools, several calls per round, replay of a
//!    completed run without touching the model.
//! 2. **Web Search Agent**: a rate-limited tool retried inside its step.
//! 3. **Prompt Chaining**: three `run_typed` steps calling the model directly.
//! 4. **Lead Generator**: two scoped agents in one run, the second returning
//!    a nested structured record after one correction.
//! 5. **Message Service**: durable ids and timers around retried deliveries.
//! 6. **Crash and Replay**: a run suspended mid-flight, moved to another
//!    journal store as JSON, and resumed without repeating its tool call.
//!
//! All data is hardcoded and fictional. No external API calls are made.

pub mod mock_data;
pub mod scenarios;
pub mod scripted;
