// SPDX-License-Identifier: MIT

//! Operation Lock: a per-issue file-level mutex with staleness detection,
//! guarding cross-process mutations to a single issue's state directory
//! (the core's iteration loop and any external provider endpoint that
//! touches the same `issue.json`/`tasks.json`).

use crate::atomic::{write_json_atomic, AtomicWriteError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, thiserror::Error)]
pub enum OperationLockError {
    #[error("failed to read lock file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to remove lock file {path}: {source}")]
    Remove { path: String, source: std::io::Error },
    #[error(transparent)]
    Write(#[from] AtomicWriteError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockContents {
    operation_id: String,
    issue_ref: String,
    pid: u32,
    acquired_at_ms: u64,
}

/// Result of an [`acquire`](OperationLock::acquire) attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired,
    /// The prior holder's lock was stale (dead process or past TTL) and was
    /// cleaned up. The caller should retry once.
    StaleCleaned,
    /// A live holder still owns the lock.
    Busy { holder_operation_id: String },
}

/// File-level mutex rooted at `<stateDir>/.lock`.
pub struct OperationLock {
    state_dir: PathBuf,
}

impl OperationLock {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self { state_dir: state_dir.into() }
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir.join(".lock")
    }

    pub fn acquire(
        &self,
        operation_id: &str,
        issue_ref: &str,
        ttl: Duration,
    ) -> Result<AcquireOutcome, OperationLockError> {
        let path = self.lock_path();

        if let Some(existing) = self.read(&path)? {
            if self.is_live(&existing, ttl) {
                return Ok(AcquireOutcome::Busy { holder_operation_id: existing.operation_id });
            }
            tracing::warn!(
                stale_operation_id = %existing.operation_id,
                "cleaning stale operation lock"
            );
            self.remove(&path)?;
            write_json_atomic(&path, &self.new_contents(operation_id, issue_ref))?;
            return Ok(AcquireOutcome::StaleCleaned);
        }

        write_json_atomic(&path, &self.new_contents(operation_id, issue_ref))?;
        Ok(AcquireOutcome::Acquired)
    }

    pub fn release(&self) -> Result<(), OperationLockError> {
        let path = self.lock_path();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(OperationLockError::Remove { path: path.display().to_string(), source }),
        }
    }

    fn new_contents(&self, operation_id: &str, issue_ref: &str) -> LockContents {
        LockContents {
            operation_id: operation_id.to_string(),
            issue_ref: issue_ref.to_string(),
            pid: std::process::id(),
            acquired_at_ms: now_ms(),
        }
    }

    fn read(&self, path: &Path) -> Result<Option<LockContents>, OperationLockError> {
        match std::fs::read_to_string(path) {
            Ok(body) => Ok(serde_json::from_str(&body).ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(OperationLockError::Read { path: path.display().to_string(), source }),
        }
    }

    fn remove(&self, path: &Path) -> Result<(), OperationLockError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(OperationLockError::Remove { path: path.display().to_string(), source }),
        }
    }

    fn is_live(&self, contents: &LockContents, ttl: Duration) -> bool {
        if now_ms().saturating_sub(contents.acquired_at_ms) > ttl.as_millis() as u64 {
            return false;
        }
        process_alive(contents.pid)
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    // No portable liveness check without an extra dependency; TTL expiry
    // alone still bounds staleness on these platforms.
    true
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
