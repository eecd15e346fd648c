//! # keel-core
//!
//! The durable agent loop. An agent alternates between asking a model for
//! its next decision and running the tools it requests; this crate routes
//! each of those actions through a [`traits::DurableContext`] step so that a
//! crashed run can be replayed without calling the model or the tools again.
//!
//! This crate provides:
//! - The three seam traits (`DurableContext`, `ModelProvider`, `Tool`)
//! - `ModelInvoker` and `ToolInvoker`, which turn one model round or one tool
//!   call into one named durable step
//! - `Agent`, whose loop driver moves between those steps until a typed
//!   answer is produced
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keel_core::{Agent, AgentDescriptor, FnTool};
//!
//! let agent: Agent<Deps, String> = Agent::new(
//!     AgentDescriptor::new("weather", "openai:gpt-4o-mini").with_tool(get_weather),
//!     provider,
//! );
//! let out = agent.run(&journal, "What is the weather like in London?", &deps)?;
//! ```

pub mod agent;
pub mod driver;
pub mod durable;
pub mod model;
pub mod tool;
pub mod traits;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentDescriptor, RunOutput, DEFAULT_MAX_ROUNDS};
pub use driver::LoopState;
pub use durable::{run_typed, Scoped};
pub use model::{ModelInvoker, ModelSettings};
pub use tool::{FnTool, ToolInvoker, Toolset};
pub use traits::{DurableContext, ModelProvider, StepAction, Tool};
