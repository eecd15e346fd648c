//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. run_id as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. compact JSON of the step record

use sha2::{Digest, Sha256};

use keel_contracts::{
    error::{KeelError, KeelResult},
    step::StepRecord,
};

use crate::entry::JournalEntry;

/// Compute the SHA-256 hash of one journal entry as lowercase hex.
///
/// The hash commits to the entry's position (`sequence`), its run, its link
/// to the previous entry, and the full step record including the recorded
/// payload bytes.
pub fn hash_entry(
    run_id: &str,
    sequence: u64,
    record: &StepRecord,
    prev_hash: &str,
) -> KeelResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| KeelError::JournalWriteFailed {
        reason: format!("step record is not serializable: {e}"),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(run_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Verify prev-hash linkage, hash correctness and sequence numbering of a
/// chain. An empty chain is valid.
pub fn verify_chain(entries: &[JournalEntry]) -> bool {
    let mut expected_prev = JournalEntry::GENESIS_HASH.to_string();

    for (position, entry) in entries.iter().enumerate() {
        if entry.sequence != position as u64 || entry.prev_hash != expected_prev {
            return false;
        }

        match hash_entry(&entry.run_id, entry.sequence, &entry.record, &entry.prev_hash) {
            Ok(recomputed) if recomputed == entry.this_hash => {}
            _ => return false,
        }

        expected_prev = entry.this_hash.clone();
    }

    true
}
