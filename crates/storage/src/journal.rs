// SPDX-License-Identifier: MIT

//! Run Journal: a single-entry, atomically-written breadcrumb of where the
//! current run's iteration loop last reached, rooted at
//! `<stateDir>/.journal`. Mirrors `OperationLock`'s atomic-write + read
//! pattern but isn't a mutex: it exists so a process that crashes mid-phase
//! leaves behind its last known stage instead of silence, for whoever
//! inspects the state dir afterward.

use crate::atomic::{write_json_atomic, AtomicWriteError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, thiserror::Error)]
pub enum RunJournalError {
    #[error("failed to read journal file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to remove journal file {path}: {source}")]
    Remove { path: String, source: std::io::Error },
    #[error(transparent)]
    Write(#[from] AtomicWriteError),
}

/// Where in one iteration of the run loop the journal entry was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunJournalStage {
    IterationStarted,
    Adjudicated,
    Finalized,
}

/// The journal's one entry. Each write overwrites the last; there is no
/// history, only the most recent breadcrumb.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunJournalEntry {
    pub operation_id: String,
    pub run_id: String,
    pub iteration: u32,
    pub phase: String,
    pub stage: RunJournalStage,
    pub recorded_at_ms: u64,
}

/// Single-entry crash-recovery journal rooted at `<stateDir>/.journal`.
pub struct RunJournal {
    state_dir: PathBuf,
}

impl RunJournal {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self { state_dir: state_dir.into() }
    }

    fn journal_path(&self) -> PathBuf {
        self.state_dir.join(".journal")
    }

    pub fn record(
        &self,
        operation_id: &str,
        run_id: &str,
        iteration: u32,
        phase: &str,
        stage: RunJournalStage,
    ) -> Result<(), RunJournalError> {
        let entry = RunJournalEntry {
            operation_id: operation_id.to_string(),
            run_id: run_id.to_string(),
            iteration,
            phase: phase.to_string(),
            stage,
            recorded_at_ms: now_ms(),
        };
        write_json_atomic(&self.journal_path(), &entry)?;
        Ok(())
    }

    pub fn read(&self) -> Result<Option<RunJournalEntry>, RunJournalError> {
        let path = self.journal_path();
        match std::fs::read_to_string(&path) {
            Ok(body) => Ok(serde_json::from_str(&body).ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(RunJournalError::Read { path: path.display().to_string(), source }),
        }
    }

    pub fn clear(&self) -> Result<(), RunJournalError> {
        let path = self.journal_path();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(RunJournalError::Remove { path: path.display().to_string(), source }),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
