// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-storage: durable state for the issue-resolution run orchestrator --
//! the issue state store, the run archive, and the operation lock + journal.

pub mod atomic;
pub mod issue_store;
pub mod journal;
pub mod lock;
pub mod run_archive;

pub use atomic::{write_json_atomic, AtomicWriteError};
pub use issue_store::{IssueStore, IssueStoreError};
pub use journal::{RunJournal, RunJournalEntry, RunJournalError, RunJournalStage};
pub use lock::{AcquireOutcome, OperationLock, OperationLockError};
pub use run_archive::{write_viewer_run_status, IterationArchive, RunArchive, RunArchiveError};
