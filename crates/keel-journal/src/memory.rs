//! In-memory implementation of `DurableContext`.
//!
//! `InMemoryJournal` records every durable step of one run in an append-only
//! hash chain. The first time a step name is issued its action runs under the
//! step's retry policy and the final outcome is appended. When the journal was
//! resumed from a snapshot, steps are served back by position instead, and a
//! name that differs from the recorded one at the same position is rejected.
//!
//! Beyond the plain step primitive the journal can:
//! - simulate a crash after a given number of recorded entries
//!   (`crash_after`), which suspends the run;
//! - be cancelled through a `CancelHandle` or by a deadline;
//! - use an injected sleeper for backoff and durable timers, so tests never
//!   block.
//!
//! Steps do not nest: a step issued while another step's action is running
//! is rejected with `CallerError`, and the rejection is not recorded.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread,
    time::{Duration, Instant},
};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use keel_codec::TypedCodec;
use keel_contracts::{
    error::{KeelError, KeelResult},
    retry::RetryPolicy,
    run::{RunId, StepName},
    step::{StepOutcome, StepRecord},
};
use keel_core::traits::{DurableContext, StepAction};

use crate::{
    chain::{hash_entry, verify_chain},
    entry::{JournalEntry, JournalSnapshot},
};

/// Blocks the current run for a backoff interval or a durable timer.
pub type Sleeper = Box<dyn Fn(Duration) + Send + Sync>;

/// Shared flag that cancels a run from outside.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct JournalState {
    pub(crate) entries: Vec<JournalEntry>,
    pub(crate) last_hash: String,
    /// Next position the run will issue. Moves only when a step is replayed
    /// or appended.
    pub(crate) cursor: usize,
    /// The step whose action is running right now.
    pub(crate) in_flight: Option<StepName>,
    pub(crate) sleep_ordinal: u64,
    pub(crate) uuid_ordinal: u64,
}

// ── Public journal ────────────────────────────────────────────────────────────

pub struct InMemoryJournal {
    run_id: RunId,
    pub(crate) state: Mutex<JournalState>,
    sleeper: Sleeper,
    crash_after: Option<usize>,
    cancel: CancelHandle,
    deadline: Option<Instant>,
    codec: TypedCodec,
}

impl InMemoryJournal {
    /// Create an empty journal for a new run.
    pub fn new(run_id: RunId) -> Self {
        Self::with_entries(run_id, Vec::new())
    }

    /// Rebuild a journal from a snapshot so the run can be replayed.
    ///
    /// # Errors
    ///
    /// `InvalidPayload` when the snapshot's hash chain does not verify or an
    /// entry belongs to another run.
    pub fn resume(snapshot: JournalSnapshot) -> KeelResult<Self> {
        if !verify_chain(&snapshot.entries) {
            return Err(KeelError::InvalidPayload {
                reason: format!(
                    "journal snapshot of run '{}' failed hash-chain verification",
                    snapshot.run_id
                ),
            });
        }
        if let Some(foreign) = snapshot.entries.iter().find(|e| e.run_id != snapshot.run_id) {
            return Err(KeelError::InvalidPayload {
                reason: format!(
                    "journal snapshot of run '{}' contains an entry of run '{}'",
                    snapshot.run_id, foreign.run_id
                ),
            });
        }

        info!(
            run_id = %snapshot.run_id,
            entry_count = snapshot.entries.len(),
            "journal resumed from snapshot"
        );
        Ok(Self::with_entries(
            RunId(snapshot.run_id),
            snapshot.entries,
        ))
    }

    fn with_entries(run_id: RunId, entries: Vec<JournalEntry>) -> Self {
        let last_hash = entries
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_else(|| JournalEntry::GENESIS_HASH.to_string());
        Self {
            run_id,
            state: Mutex::new(JournalState {
                entries,
                last_hash,
                cursor: 0,
                in_flight: None,
                sleep_ordinal: 0,
                uuid_ordinal: 0,
            }),
            sleeper: Box::new(thread::sleep),
            crash_after: None,
            cancel: CancelHandle::default(),
            deadline: None,
            codec: TypedCodec::new(),
        }
    }

    /// Replace the function used to wait between attempts and for durable
    /// timers.
    pub fn with_sleeper(mut self, sleeper: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Suspend the run instead of executing any new step once the journal
    /// holds `entries` entries.
    pub fn crash_after(mut self, entries: usize) -> Self {
        self.crash_after = Some(entries);
        self
    }

    /// Cancel every step not yet recorded once `timeout` has elapsed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.lock().map(|s| s.entries.clone()).unwrap_or_default()
    }

    /// Recorded step names in journal order.
    pub fn step_names(&self) -> Vec<String> {
        self.entries()
            .iter()
            .map(|e| e.record.name.to_string())
            .collect()
    }

    /// Export the current chain.
    pub fn export_snapshot(&self) -> KeelResult<JournalSnapshot> {
        let state = self.lock()?;
        let terminal_hash = state
            .entries
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_default();

        Ok(JournalSnapshot {
            run_id: self.run_id.to_string(),
            entries: state.entries.clone(),
            exported_at: Utc::now(),
            terminal_hash,
        })
    }

    /// Verify that the in-memory chain has not been tampered with.
    pub fn verify_integrity(&self) -> bool {
        self.lock().map(|s| verify_chain(&s.entries)).unwrap_or(false)
    }

    /// Log the end of the run. The in-memory journal has nothing to flush.
    pub fn finalize(&self) -> KeelResult<()> {
        let state = self.lock()?;
        info!(
            run_id = %self.run_id,
            entry_count = state.entries.len(),
            replayed = state.cursor.min(state.entries.len()),
            terminal_hash = %state.last_hash,
            "journal finalized"
        );
        Ok(())
    }

    fn lock(&self) -> KeelResult<MutexGuard<'_, JournalState>> {
        self.state.lock().map_err(|e| KeelError::JournalWriteFailed {
            reason: format!("journal state lock poisoned: {e}"),
        })
    }

    fn append(&self, record: StepRecord) -> KeelResult<()> {
        let mut state = self.lock()?;
        let sequence = state.entries.len() as u64;
        let prev_hash = state.last_hash.clone();
        let this_hash = hash_entry(&self.run_id.0, sequence, &record, &prev_hash)?;

        state.entries.push(JournalEntry {
            sequence,
            run_id: self.run_id.to_string(),
            record,
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.last_hash = this_hash;
        state.cursor = state.entries.len();
        Ok(())
    }

    fn clear_in_flight(&self) -> KeelResult<()> {
        self.lock()?.in_flight = None;
        Ok(())
    }

    fn ensure_live(&self, name: &StepName) -> KeelResult<()> {
        let reason = if self.cancel.is_cancelled() {
            "cancellation requested"
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            "deadline exceeded"
        } else {
            return Ok(());
        };
        warn!(run_id = %self.run_id, step = %name, reason, "run cancelled");
        Err(KeelError::Cancelled {
            run_id: self.run_id.to_string(),
            reason: reason.to_string(),
        })
    }

    /// Claims the next position for `name`.
    ///
    /// Returns the recorded outcome when the position is already in the
    /// journal, or `None` when the step has to run. In the latter case `name`
    /// is marked in flight until the caller clears it.
    fn begin(&self, name: &StepName) -> KeelResult<Option<KeelResult<Vec<u8>>>> {
        let mut state = self.lock()?;
        if let Some(outer) = &state.in_flight {
            warn!(run_id = %self.run_id, step = %name, outer = %outer, "nested step rejected");
            return Err(KeelError::CallerError {
                reason: format!("step '{name}' was issued while step '{outer}' is running"),
            });
        }

        let position = state.cursor;
        if position >= state.entries.len() {
            if self.crash_after.is_some_and(|limit| state.entries.len() >= limit) {
                info!(run_id = %self.run_id, step = %name, "simulated crash, run suspended");
                return Err(KeelError::Suspended {
                    step: name.to_string(),
                });
            }
            state.in_flight = Some(name.clone());
            return Ok(None);
        }

        let entry = &state.entries[position];

        if entry.record.name != *name {
            return Err(KeelError::JournalDivergence {
                position: position as u64,
                recorded: entry.record.name.to_string(),
                issued: name.to_string(),
            });
        }

        debug!(run_id = %self.run_id, step = %name, position, "replaying recorded step");
        let outcome = match &entry.record.outcome {
            StepOutcome::Completed { payload } => Ok(payload.clone()),
            StepOutcome::Failed { error } => Err(error.clone()),
        };
        state.cursor += 1;
        Ok(Some(outcome))
    }

    /// Runs a step that is not in the journal yet and appends its outcome.
    ///
    /// `Cancelled` and `Suspended` leave nothing behind, so the step is
    /// issued at the same position when the run is resumed.
    fn execute(
        &self,
        name: StepName,
        input: Value,
        policy: &RetryPolicy,
        action: &mut StepAction<'_>,
    ) -> KeelResult<Vec<u8>> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            self.ensure_live(&name)?;

            let error = match action(attempt) {
                Ok(payload) => {
                    debug!(run_id = %self.run_id, step = %name, attempt, "step completed");
                    self.append(StepRecord::completed(name, input, attempt, payload.clone()))?;
                    return Ok(payload);
                }
                Err(e) => e,
            };

            if matches!(error, KeelError::Cancelled { .. } | KeelError::Suspended { .. }) {
                return Err(error);
            }

            if !error.is_retriable() {
                warn!(run_id = %self.run_id, step = %name, attempt, %error, "step failed");
                self.append(StepRecord::failed(name, input, attempt, error.clone()))?;
                return Err(error);
            }

            if attempt >= max_attempts {
                let exhausted = KeelError::RetriesExhausted {
                    step: name.to_string(),
                    attempts: attempt,
                    last_error: error.to_string(),
                };
                warn!(run_id = %self.run_id, step = %name, %exhausted, "retries exhausted");
                self.append(StepRecord::failed(name, input, attempt, exhausted.clone()))?;
                return Err(exhausted);
            }

            let delay = policy.delay_after(attempt);
            debug!(
                run_id = %self.run_id,
                step = %name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                %error,
                "retrying step"
            );
            self.ensure_live(&name)?;
            (self.sleeper)(delay);
            attempt += 1;
        }
    }

    /// Bumps a timer or id counter only when its step made it into the
    /// journal, so an interrupted step keeps its ordinal.
    fn advance_if_claimed(
        &self,
        before: usize,
        counter: impl FnOnce(&mut JournalState) -> &mut u64,
    ) -> KeelResult<()> {
        let mut state = self.lock()?;
        if state.cursor > before {
            *counter(&mut *state) += 1;
        }
        Ok(())
    }

    /// Time left before the run deadline, capped at `wanted`.
    fn bounded_wait(&self, wanted: Duration) -> Duration {
        match self.deadline {
            Some(deadline) => wanted.min(deadline.saturating_duration_since(Instant::now())),
            None => wanted,
        }
    }
}

// ── DurableContext impl ───────────────────────────────────────────────────────

impl DurableContext for InMemoryJournal {
    fn run_id(&self) -> &RunId {
        &self.run_id
    }

    fn run_step(
        &self,
        name: StepName,
        input: Value,
        policy: &RetryPolicy,
        action: &mut StepAction<'_>,
    ) -> KeelResult<Vec<u8>> {
        if let Some(recorded) = self.begin(&name)? {
            return recorded;
        }

        let result = self.execute(name, input, policy, action);
        self.clear_in_flight()?;
        result
    }

    fn sleep(&self, duration: Duration) -> KeelResult<()> {
        let (before, ordinal) = {
            let state = self.lock()?;
            (state.cursor, state.sleep_ordinal)
        };
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        let name = StepName::sleep(ordinal);

        let result = self.run_step(
            name.clone(),
            json!({ "millis": millis }),
            &RetryPolicy::immediate(1),
            &mut |_attempt: u32| {
                (self.sleeper)(self.bounded_wait(duration));
                self.ensure_live(&name)?;
                self.codec.encode(&millis)
            },
        );
        self.advance_if_claimed(before, |s| &mut s.sleep_ordinal)?;
        result.map(|_| ())
    }

    fn unique_id(&self) -> KeelResult<String> {
        let (before, ordinal) = {
            let state = self.lock()?;
            (state.cursor, state.uuid_ordinal)
        };

        let result = self.run_step(
            StepName::unique_id(ordinal),
            Value::Null,
            &RetryPolicy::immediate(1),
            &mut |_attempt: u32| self.codec.encode(&Uuid::new_v4().to_string()),
        );
        self.advance_if_claimed(before, |s| &mut s.uuid_ordinal)?;
        self.codec.decode::<String>(&result?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
