//! Run and step identity.
//!
//! A run is one logical execution of an agent loop. Every durable step inside
//! a run is addressed by a `StepName` that is a pure function of the step's
//! role and ordinal, so a replay of the same run issues the same names in the
//! same order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one logical run, assigned by the durable execution engine.
///
/// The adapter never invents run ids on its own; it reads them from the
/// `DurableContext` it was handed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// Create a new, unique run id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The role a journaled step plays inside a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// One model inference call.
    Model,
    /// One tool invocation.
    Tool,
    /// A durable timer.
    Sleep,
    /// A durable unique-id draw.
    UniqueId,
    /// A handler-defined step issued through `run_typed`.
    Custom,
}

/// Deterministic name of a durable step.
///
/// Model steps are `model:<ordinal>`, tool steps `tool:<ordinal>:<tool-name>`.
/// Ordinals for model and tool steps are counted independently; tool ordinals
/// are assigned per call, not per round.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepName {
    kind: StepKind,
    name: String,
}

impl StepName {
    pub fn model(ordinal: u64) -> Self {
        Self {
            kind: StepKind::Model,
            name: format!("model:{ordinal}"),
        }
    }

    pub fn tool(ordinal: u64, tool_name: &str) -> Self {
        Self {
            kind: StepKind::Tool,
            name: format!("tool:{ordinal}:{tool_name}"),
        }
    }

    pub fn sleep(ordinal: u64) -> Self {
        Self {
            kind: StepKind::Sleep,
            name: format!("sleep:{ordinal}"),
        }
    }

    pub fn unique_id(ordinal: u64) -> Self {
        Self {
            kind: StepKind::UniqueId,
            name: format!("uuid:{ordinal}"),
        }
    }

    /// A handler-chosen step name, e.g. `"Extract metrics"`.
    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            kind: StepKind::Custom,
            name: name.into(),
        }
    }

    /// The same step issued by an agent nested under `scope`, e.g.
    /// `freeform/model:0`. The kind is kept.
    pub fn within(&self, scope: &str) -> Self {
        Self {
            kind: self.kind,
            name: format!("{scope}/{}", self.name),
        }
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
