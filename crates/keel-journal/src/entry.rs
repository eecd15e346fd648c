//! Journal entry and snapshot types.
//!
//! `JournalEntry` wraps one `StepRecord` with its sequence number and the
//! hashes that make tampering detectable. `JournalSnapshot` is the portable
//! form of a run's journal: what survives a crash and seeds the replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keel_contracts::{
    error::{KeelError, KeelResult},
    step::StepRecord,
};

/// A single entry in the hash chain of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the chain, starting at 0. Replay serves entries by
    /// position.
    pub sequence: u64,

    pub run_id: String,

    pub record: StepRecord,

    /// Hash of the previous entry, or `GENESIS_HASH` for the first one.
    pub prev_hash: String,

    /// Hash over (run_id, sequence, prev_hash, record).
    pub this_hash: String,
}

impl JournalEntry {
    /// The `prev_hash` of the first entry in every chain.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// Exported state of one run's journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalSnapshot {
    pub run_id: String,

    /// All entries in chain order.
    pub entries: Vec<JournalEntry>,

    /// Wall-clock time (UTC) of the export.
    pub exported_at: DateTime<Utc>,

    /// `this_hash` of the last entry; empty for an empty journal.
    pub terminal_hash: String,
}

impl JournalSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded step names in journal order.
    pub fn step_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.record.name.to_string())
            .collect()
    }

    /// A copy holding only the first `len` entries, as if the process had
    /// died right after recording them.
    pub fn truncated(&self, len: usize) -> Self {
        let entries: Vec<JournalEntry> = self.entries.iter().take(len).cloned().collect();
        let terminal_hash = entries
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_default();
        Self {
            run_id: self.run_id.clone(),
            entries,
            exported_at: self.exported_at,
            terminal_hash,
        }
    }

    pub fn to_json(&self) -> KeelResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| KeelError::JournalWriteFailed {
            reason: format!("cannot serialize snapshot: {e}"),
        })
    }

    pub fn from_json(json: &str) -> KeelResult<Self> {
        serde_json::from_str(json).map_err(|e| KeelError::InvalidPayload {
            reason: format!("malformed journal snapshot: {e}"),
        })
    }
}
