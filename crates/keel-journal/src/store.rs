//! Snapshots of many runs, with one open lease per run.
//!
//! `JournalStore::open` hands out an `OpenRun` holding the run's journal.
//! While it is alive nobody else can open the same run. Dropping it writes
//! the journal back as the run's snapshot, so a run that was suspended
//! mid-flight picks up where it stopped the next time it is opened.

use std::{
    collections::{HashMap, HashSet},
    ops::Deref,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::{debug, warn};

use keel_contracts::{
    error::{KeelError, KeelResult},
    run::RunId,
};

use crate::{entry::JournalSnapshot, memory::InMemoryJournal};

#[derive(Default)]
struct StoreState {
    snapshots: HashMap<RunId, JournalSnapshot>,
    open: HashSet<RunId>,
}

#[derive(Clone, Default)]
pub struct JournalStore {
    state: Arc<Mutex<StoreState>>,
}

impl JournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `run_id`, resuming from its stored snapshot if there is one.
    pub fn open(&self, run_id: &RunId) -> KeelResult<OpenRun> {
        self.open_with(run_id, |journal| journal)
    }

    /// Like `open`, letting the caller configure the journal (sleeper, crash
    /// injection, timeout) before the run starts.
    ///
    /// # Errors
    ///
    /// - `CallerError` when the run is already open.
    /// - `InvalidPayload` when the stored snapshot fails verification.
    pub fn open_with(
        &self,
        run_id: &RunId,
        configure: impl FnOnce(InMemoryJournal) -> InMemoryJournal,
    ) -> KeelResult<OpenRun> {
        let mut state = lock(&self.state)?;
        if state.open.contains(run_id) {
            return Err(KeelError::CallerError {
                reason: format!("run '{run_id}' is already open"),
            });
        }

        let journal = match state.snapshots.get(run_id) {
            Some(snapshot) => InMemoryJournal::resume(snapshot.clone())?,
            None => InMemoryJournal::new(run_id.clone()),
        };
        state.open.insert(run_id.clone());
        debug!(run_id = %run_id, recorded = journal.len(), "run opened");

        Ok(OpenRun {
            run_id: run_id.clone(),
            journal: configure(journal),
            store: Arc::clone(&self.state),
        })
    }

    pub fn snapshot(&self, run_id: &RunId) -> Option<JournalSnapshot> {
        lock(&self.state)
            .ok()
            .and_then(|s| s.snapshots.get(run_id).cloned())
    }

    /// Store `snapshot` under its run id, replacing any previous one.
    pub fn import(&self, snapshot: JournalSnapshot) -> KeelResult<()> {
        let mut state = lock(&self.state)?;
        state
            .snapshots
            .insert(RunId(snapshot.run_id.clone()), snapshot);
        Ok(())
    }

    pub fn is_open(&self, run_id: &RunId) -> bool {
        lock(&self.state)
            .map(|s| s.open.contains(run_id))
            .unwrap_or(false)
    }
}

fn lock(state: &Mutex<StoreState>) -> KeelResult<MutexGuard<'_, StoreState>> {
    state.lock().map_err(|e| KeelError::JournalWriteFailed {
        reason: format!("journal store lock poisoned: {e}"),
    })
}

/// Exclusive access to one run's journal. Persists the journal on drop.
pub struct OpenRun {
    run_id: RunId,
    journal: InMemoryJournal,
    store: Arc<Mutex<StoreState>>,
}

impl OpenRun {
    pub fn journal(&self) -> &InMemoryJournal {
        &self.journal
    }
}

impl Deref for OpenRun {
    type Target = InMemoryJournal;

    fn deref(&self) -> &InMemoryJournal {
        &self.journal
    }
}

impl Drop for OpenRun {
    fn drop(&mut self) {
        let snapshot = match self.journal.export_snapshot() {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(run_id = %self.run_id, error = %e, "run journal could not be exported");
                None
            }
        };

        match lock(&self.store) {
            Ok(mut state) => {
                if let Some(snapshot) = snapshot {
                    state.snapshots.insert(self.run_id.clone(), snapshot);
                }
                state.open.remove(&self.run_id);
            }
            Err(e) => warn!(run_id = %self.run_id, error = %e, "run lease could not be released"),
        }
    }
}
