//! Test doubles shared by the unit tests in this crate.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::Value;

use keel_contracts::{
    error::{KeelError, KeelResult},
    model::{ModelRequest, ModelResponse, ProviderError, ProviderErrorKind},
    retry::RetryPolicy,
    run::{RunId, StepName},
    tool::ToolError,
};

use crate::traits::{DurableContext, ModelProvider, StepAction, Tool};

#[derive(Debug, Clone)]
pub(crate) struct MockRecord {
    pub name: String,
    pub attempts: u32,
    pub outcome: Result<Vec<u8>, KeelError>,
}

/// A minimal replaying journal: records outcomes in order, serves them back
/// by position, retries without sleeping.
pub(crate) struct MockContext {
    run_id: RunId,
    records: Mutex<Vec<MockRecord>>,
    cursor: Mutex<usize>,
    crash_at: Option<usize>,
}

impl MockContext {
    pub fn new() -> Self {
        Self {
            run_id: RunId::from("run-test"),
            records: Mutex::new(Vec::new()),
            cursor: Mutex::new(0),
            crash_at: None,
        }
    }

    /// Suspend the run when it tries to record entry number `n` (0-based).
    pub fn crashing_at(n: usize) -> Self {
        Self {
            crash_at: Some(n),
            ..Self::new()
        }
    }

    /// A fresh context over a copy of everything recorded so far.
    pub fn replay(&self) -> Self {
        Self {
            run_id: self.run_id.clone(),
            records: Mutex::new(self.records()),
            cursor: Mutex::new(0),
            crash_at: None,
        }
    }

    pub fn records(&self) -> Vec<MockRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.name).collect()
    }
}

impl DurableContext for MockContext {
    fn run_id(&self) -> &RunId {
        &self.run_id
    }

    fn run_step(
        &self,
        name: StepName,
        _input: Value,
        policy: &RetryPolicy,
        action: &mut StepAction<'_>,
    ) -> KeelResult<Vec<u8>> {
        let position = {
            let mut cursor = self.cursor.lock().unwrap();
            let position = *cursor;
            *cursor += 1;
            position
        };

        if let Some(recorded) = self.records.lock().unwrap().get(position) {
            if recorded.name != name.as_str() {
                return Err(KeelError::JournalDivergence {
                    position: position as u64,
                    recorded: recorded.name.clone(),
                    issued: name.to_string(),
                });
            }
            return recorded.outcome.clone();
        }

        if self.crash_at == Some(position) {
            return Err(KeelError::Suspended { step: name.to_string() });
        }

        let mut attempt = 1;
        let outcome = loop {
            match action(attempt) {
                Ok(bytes) => break Ok(bytes),
                Err(e) if e.is_retriable() && attempt < policy.max_attempts => attempt += 1,
                Err(e) if e.is_retriable() => {
                    break Err(KeelError::RetriesExhausted {
                        step: name.to_string(),
                        attempts: attempt,
                        last_error: e.to_string(),
                    })
                }
                Err(e) => break Err(e),
            }
        };

        self.records.lock().unwrap().push(MockRecord {
            name: name.to_string(),
            attempts: attempt,
            outcome: outcome.clone(),
        });
        outcome
    }

    fn sleep(&self, _duration: Duration) -> KeelResult<()> {
        Ok(())
    }

    fn unique_id(&self) -> KeelResult<String> {
        Ok(format!("{}-{}", self.run_id, self.records().len()))
    }
}

/// A provider that replays a fixed script and logs every request it sees.
pub(crate) struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ModelResponse, ProviderError>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ModelResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ModelProvider for ScriptedProvider {
    fn request(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(ProviderError::new(
                ProviderErrorKind::InvalidRequest,
                "script exhausted",
            ))
        })
    }
}

/// A tool that echoes its arguments, failing transiently a fixed number of
/// times first, and counts its invocations.
pub(crate) struct CountingTool {
    pub name: String,
    pub invocations: Arc<Mutex<u32>>,
    pub transient_failures: u32,
    pub terminal: bool,
}

impl CountingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            invocations: Arc::new(Mutex::new(0)),
            transient_failures: 0,
            terminal: false,
        }
    }

    pub fn count(&self) -> Arc<Mutex<u32>> {
        Arc::clone(&self.invocations)
    }
}

impl<D> Tool<D> for CountingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "echoes its arguments"
    }

    fn invoke(&self, _deps: &D, arguments: &Value) -> Result<Value, ToolError> {
        let mut count = self.invocations.lock().unwrap();
        *count += 1;
        if self.terminal {
            return Err(ToolError::terminal("permanently broken"));
        }
        if *count <= self.transient_failures {
            return Err(ToolError::retriable(format!("flaky failure #{}", *count)));
        }
        Ok(serde_json::json!({ "echo": arguments, "tool": self.name }))
    }
}
