// SPDX-License-Identifier: MIT

//! Shared `--issue`/`--data-dir` plumbing and run-archive lookup used by all
//! three subcommands.

use std::path::{Path, PathBuf};

use clap::Args;
use warden_core::IssueRef;

#[derive(Args, Debug)]
pub struct IssueLocator {
    /// Issue reference, e.g. `owner/repo#42`.
    #[arg(long)]
    pub issue: String,

    /// Root directory holding every issue's state directory.
    #[arg(long, env = "WARDEN_DATA_DIR")]
    pub data_dir: PathBuf,
}

impl IssueLocator {
    pub fn resolve(&self) -> anyhow::Result<(IssueRef, PathBuf)> {
        let issue_ref: IssueRef = self.issue.parse()?;
        let state_dir = issue_ref.state_dir(&self.data_dir);
        Ok((issue_ref, state_dir))
    }
}

/// The most recently started run directory under `state_dir/.runs/`, if any.
/// Run ids are `timestamp-pid.rand`, so lexicographic order on the
/// directory name is also chronological order.
pub fn latest_run_dir(state_dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    let runs_dir = state_dir.join(".runs");
    if !runs_dir.exists() {
        return Ok(None);
    }
    let mut names: Vec<String> = std::fs::read_dir(&runs_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    Ok(names.into_iter().next_back().map(|name| runs_dir.join(name)))
}

#[cfg(test)]
#[path = "common_tests.rs"]
mod tests;
