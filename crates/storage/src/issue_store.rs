// SPDX-License-Identifier: MIT

//! Issue State Store: atomic read/write of `issue.json`/`tasks.json`,
//! `progress.txt` appends, and an "updated-at" freshness check backed by a
//! small mtime-keyed cache.

use crate::atomic::{append_text, write_json_atomic, AtomicWriteError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use warden_core::{IssueJson, TasksJson};

#[derive(Debug, thiserror::Error)]
pub enum IssueStoreError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse { path: String, source: serde_json::Error },
    #[error(transparent)]
    Write(#[from] AtomicWriteError),
    #[error("failed to append to {path}: {source}")]
    Append { path: String, source: std::io::Error },
}

#[derive(Clone)]
struct CacheEntry<T> {
    mtime: SystemTime,
    value: T,
}

/// Per-(state dir) JSON cache, invalidated on any mtime change: a small
/// in-memory cache keyed by (stateDir, mtime) serves repeat reads.
#[derive(Default)]
pub struct IssueStore {
    issue_cache: Mutex<HashMap<PathBuf, CacheEntry<IssueJson>>>,
    tasks_cache: Mutex<HashMap<PathBuf, CacheEntry<TasksJson>>>,
}

impl IssueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_issue_json(&self, state_dir: &Path) -> Result<Option<IssueJson>, IssueStoreError> {
        let path = state_dir.join("issue.json");
        self.read_cached(&path, &self.issue_cache)
    }

    pub fn write_issue_json(
        &self,
        state_dir: &Path,
        issue: &IssueJson,
    ) -> Result<(), IssueStoreError> {
        let path = state_dir.join("issue.json");
        write_json_atomic(&path, issue)?;
        self.issue_cache.lock().remove(&path);
        Ok(())
    }

    /// The mtime of `issue.json` in milliseconds since the epoch, for cheap
    /// freshness checks without a full parse.
    pub fn read_issue_json_updated_at_ms(
        &self,
        state_dir: &Path,
    ) -> Result<Option<u64>, IssueStoreError> {
        let path = state_dir.join("issue.json");
        match std::fs::metadata(&path) {
            Ok(meta) => {
                let mtime = meta.modified().map_err(|source| IssueStoreError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Ok(Some(to_epoch_ms(mtime)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => {
                Err(IssueStoreError::Read { path: path.display().to_string(), source })
            }
        }
    }

    pub fn read_tasks_json(&self, state_dir: &Path) -> Result<TasksJson, IssueStoreError> {
        let path = state_dir.join("tasks.json");
        Ok(self.read_cached(&path, &self.tasks_cache)?.unwrap_or_default())
    }

    pub fn write_tasks_json(
        &self,
        state_dir: &Path,
        tasks: &TasksJson,
    ) -> Result<(), IssueStoreError> {
        let path = state_dir.join("tasks.json");
        write_json_atomic(&path, tasks)?;
        self.tasks_cache.lock().remove(&path);
        Ok(())
    }

    pub fn append_progress(&self, state_dir: &Path, text: &str) -> Result<(), IssueStoreError> {
        let path = state_dir.join("progress.txt");
        let line = if text.ends_with('\n') { text.to_string() } else { format!("{text}\n") };
        append_text(&path, &line)
            .map_err(|source| IssueStoreError::Append { path: path.display().to_string(), source })
    }

    fn read_cached<T>(
        &self,
        path: &Path,
        cache: &Mutex<HashMap<PathBuf, CacheEntry<T>>>,
    ) -> Result<Option<T>, IssueStoreError>
    where
        T: serde::de::DeserializeOwned + Clone,
    {
        let mtime = match std::fs::metadata(path) {
            Ok(meta) => meta.modified().map_err(|source| IssueStoreError::Read {
                path: path.display().to_string(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(IssueStoreError::Read { path: path.display().to_string(), source })
            }
        };

        {
            let guard = cache.lock();
            if let Some(entry) = guard.get(path) {
                if entry.mtime == mtime {
                    return Ok(Some(entry.value.clone()));
                }
            }
        }

        let body = std::fs::read_to_string(path)
            .map_err(|source| IssueStoreError::Read { path: path.display().to_string(), source })?;
        let value: T = serde_json::from_str(&body)
            .map_err(|source| IssueStoreError::Parse { path: path.display().to_string(), source })?;

        cache.lock().insert(path.to_path_buf(), CacheEntry { mtime, value: value.clone() });
        Ok(Some(value))
    }
}

fn to_epoch_ms(time: SystemTime) -> u64 {
    time.duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

#[cfg(test)]
#[path = "issue_store_tests.rs"]
mod tests;
