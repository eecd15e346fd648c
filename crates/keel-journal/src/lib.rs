//! # keel-journal
//!
//! In-memory, append-only, SHA-256 hash-chained step journal. It implements
//! `keel_core::DurableContext` and stands in for a durable execution engine
//! in tests and demos.
//!
//! ## Overview
//!
//! Every step outcome is wrapped in a `JournalEntry` that links to the
//! previous entry through its hash. A journal can be exported as a
//! `JournalSnapshot`, which is what survives a crash; resuming from the
//! snapshot replays recorded steps instead of running them again.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keel_journal::InMemoryJournal;
//!
//! let journal = InMemoryJournal::new(RunId::new()).crash_after(2);
//! let _ = agent.run(&journal, "Find X", &deps); // Err(Suspended)
//!
//! let resumed = InMemoryJournal::resume(journal.export_snapshot()?)?;
//! let out = agent.run(&resumed, "Find X", &deps)?;
//! ```

pub mod chain;
pub mod entry;
pub mod memory;
pub mod store;

pub use chain::{hash_entry, verify_chain};
pub use entry::{JournalEntry, JournalSnapshot};
pub use memory::{CancelHandle, InMemoryJournal, Sleeper};
pub use store::{JournalStore, OpenRun};

// ── Tests ─────────────────────────────────────────────────────────────────────
