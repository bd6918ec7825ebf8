// SPDX-License-Identifier: MIT

//! Run Archive: owns `STATE/.runs/<runId>/`: the persistent `run.json`, one
//! `iterations/NNN/` snapshot per iteration, the per-run `viewer-run.log`,
//! and the `final-*` artifacts written at finalize.

use crate::atomic::{append_text, write_json_atomic, AtomicWriteError};
use std::path::{Path, PathBuf};
use warden_core::RunRecord;

#[derive(Debug, thiserror::Error)]
pub enum RunArchiveError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir { path: String, source: std::io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: String, source: std::io::Error },
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse { path: String, source: serde_json::Error },
    #[error(transparent)]
    Atomic(#[from] AtomicWriteError),
}

/// The six per-iteration state-file snapshots plus git debug dumps.
#[derive(Debug, Clone, Default)]
pub struct IterationArchive {
    pub last_run_log: String,
    pub sdk_output_json: String,
    pub issue_json: String,
    pub tasks_json: String,
    pub progress_txt: String,
    pub phase_report_json: String,
    pub git_status: String,
    pub git_diff_stat: String,
}

/// Handle onto a single run's archive directory.
pub struct RunArchive {
    run_dir: PathBuf,
}

impl RunArchive {
    pub fn new(run_dir: PathBuf) -> Self {
        Self { run_dir }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn viewer_log_path(&self) -> PathBuf {
        self.run_dir.join("viewer-run.log")
    }

    /// Create the run directory and truncate `viewer-run.log`, as part of
    /// run orchestrator initialization.
    pub fn init(&self) -> Result<(), RunArchiveError> {
        std::fs::create_dir_all(self.run_dir.join("iterations")).map_err(|source| {
            RunArchiveError::CreateDir { path: self.run_dir.display().to_string(), source }
        })?;
        std::fs::create_dir_all(self.run_dir.join("workers")).map_err(|source| {
            RunArchiveError::CreateDir { path: self.run_dir.display().to_string(), source }
        })?;
        std::fs::write(self.viewer_log_path(), b"").map_err(|source| RunArchiveError::Write {
            path: self.viewer_log_path().display().to_string(),
            source,
        })?;
        Ok(())
    }

    pub fn write_run_record(&self, record: &RunRecord) -> Result<(), RunArchiveError> {
        Ok(write_json_atomic(&self.run_dir.join("run.json"), record)?)
    }

    pub fn read_run_record(&self) -> Result<Option<RunRecord>, RunArchiveError> {
        let path = self.run_dir.join("run.json");
        match std::fs::read_to_string(&path) {
            Ok(body) => serde_json::from_str(&body)
                .map(Some)
                .map_err(|source| RunArchiveError::Parse { path: path.display().to_string(), source }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(RunArchiveError::Read { path: path.display().to_string(), source }),
        }
    }

    pub fn append_viewer_log(&self, line: &str) -> Result<(), RunArchiveError> {
        let path = self.viewer_log_path();
        let line = if line.ends_with('\n') { line.to_string() } else { format!("{line}\n") };
        append_text(&path, &line)
            .map_err(|source| RunArchiveError::Write { path: path.display().to_string(), source })
    }

    /// Snapshot iteration `n` (1-based) into `iterations/NNN/`.
    pub fn snapshot_iteration(
        &self,
        n: u32,
        phase: &str,
        archive: &IterationArchive,
    ) -> Result<(), RunArchiveError> {
        let dir = self.run_dir.join("iterations").join(format!("{n:03}"));
        std::fs::create_dir_all(&dir)
            .map_err(|source| RunArchiveError::CreateDir { path: dir.display().to_string(), source })?;

        let files: [(&str, &str); 8] = [
            ("last-run.log", &archive.last_run_log),
            ("sdk-output.json", &archive.sdk_output_json),
            ("issue.json", &archive.issue_json),
            ("tasks.json", &archive.tasks_json),
            ("progress.txt", &archive.progress_txt),
            ("phase-report.json", &archive.phase_report_json),
            ("git-status.txt", &archive.git_status),
            ("git-diff-stat.txt", &archive.git_diff_stat),
        ];
        for (name, contents) in files {
            let path = dir.join(name);
            std::fs::write(&path, contents)
                .map_err(|source| RunArchiveError::Write { path: path.display().to_string(), source })?;
        }

        write_json_atomic(
            &dir.join("iteration.json"),
            &serde_json::json!({ "index": n, "phase": phase }),
        )?;
        Ok(())
    }

    /// Worker sandbox directory for a parallel task.
    pub fn worker_dir(&self, task_id: &str) -> PathBuf {
        self.run_dir.join("workers").join(task_id)
    }

    /// Copy the issue state dir's current `viewer-run.log`, `issue.json`,
    /// `tasks.json`, `progress.txt` into the run dir as `final-*` artifacts.
    pub fn write_final_artifacts(
        &self,
        issue_json: &str,
        tasks_json: &str,
        progress_txt: &str,
    ) -> Result<(), RunArchiveError> {
        let files: [(&str, &str); 3] = [
            ("final-issue.json", issue_json),
            ("final-tasks.json", tasks_json),
            ("final-progress.txt", progress_txt),
        ];
        for (name, contents) in files {
            let path = self.run_dir.join(name);
            std::fs::write(&path, contents)
                .map_err(|source| RunArchiveError::Write { path: path.display().to_string(), source })?;
        }
        Ok(())
    }
}

/// Persist `viewer-run-status.json` into both the issue state dir and the
/// run dir; finalize requires both copies to exist.
pub fn write_viewer_run_status(
    state_dir: &Path,
    run_dir: &Path,
    status: &serde_json::Value,
) -> Result<(), RunArchiveError> {
    write_json_atomic(&state_dir.join("viewer-run-status.json"), status)?;
    write_json_atomic(&run_dir.join("viewer-run-status.json"), status)?;
    Ok(())
}

#[cfg(test)]
#[path = "run_archive_tests.rs"]
mod tests;
