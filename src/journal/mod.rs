//! Append-only transaction journal.
//!
//! Every balance-affecting event produces exactly one journal row, written
//! inside the same database transaction as the ledger mutation it documents.
//! Confirmed rows are immutable; corrections are new rows.

pub mod errors;
pub mod models;
pub mod store;

pub use errors::{JournalError, JournalResult};
pub use models::{EntryId, JournalEntry, JournalKind, JournalStatus, NewJournalEntry};
pub use store::{
    JournalStore, append_tx, confirm_with_balance_tx, confirm_with_ref_tx, mark_status_tx,
};
