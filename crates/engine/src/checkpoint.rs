// SPDX-License-Identifier: MIT

//! Design-Doc Checkpointer: after specific design phases, auto-commit a
//! single design-doc file to the worktree, refusing to touch anything else
//! already staged.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use warden_adapters::{run_with_timeout, SubprocessError, GIT_WORKTREE_TIMEOUT};

/// Phases after which a design-doc checkpoint commit runs.
pub const CHECKPOINT_PHASES: &[&str] = &[
    "design_draft",
    "design_classify",
    "design_research",
    "design_workflow",
    "design_api",
    "design_data",
    "design_plan",
    "design_edit",
];

pub fn is_checkpoint_phase(phase: &str) -> bool {
    CHECKPOINT_PHASES.contains(&phase)
}

#[derive(Debug, Error)]
pub enum DesignCheckpointError {
    #[error("design doc path must be relative with no `..` segments, got {0:?}")]
    InvalidPath(String),
    #[error("design doc path {0:?} escapes the worktree root")]
    PathEscapesWorktree(String),
    #[error("unexpected files already staged: {0:?}")]
    UnexpectedStagedFiles(Vec<String>),
    #[error("design doc is not tracked after commit")]
    NotTrackedAfterCommit,
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
    #[error("git command failed: {0}")]
    GitFailed(String),
}

/// Resolve the design-doc path from `issueJson.designDocPath`/`designDoc`,
/// defaulting to `docs/issue-<N>-design.md`.
pub fn resolve_design_doc_path(candidate: Option<&str>, issue_number: u64) -> String {
    candidate.map(str::to_string).unwrap_or_else(|| format!("docs/issue-{issue_number}-design.md"))
}

/// Normalize and validate a design-doc path against the worktree root.
pub fn normalize_design_doc_path(
    worktree_root: &Path,
    relative: &str,
) -> Result<PathBuf, DesignCheckpointError> {
    if relative.is_empty()
        || Path::new(relative).is_absolute()
        || relative.split('/').any(|seg| seg == "..")
    {
        return Err(DesignCheckpointError::InvalidPath(relative.to_string()));
    }
    let resolved = worktree_root.join(relative);
    if !resolved.starts_with(worktree_root) {
        return Err(DesignCheckpointError::PathEscapesWorktree(relative.to_string()));
    }
    Ok(resolved)
}

async fn git(worktree_root: &Path, args: &[&str]) -> Result<std::process::Output, SubprocessError> {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(worktree_root);
    run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git").await
}

/// Run the full checkpoint procedure for `phase` against `design_doc_path`
/// (relative to `worktree_root`), for issue `issue_number`.
pub async fn checkpoint(
    worktree_root: &Path,
    design_doc_path: &str,
    issue_number: u64,
    phase: &str,
) -> Result<(), DesignCheckpointError> {
    let absolute = normalize_design_doc_path(worktree_root, design_doc_path)?;

    let staged = git(worktree_root, &["diff", "--cached", "--name-only"]).await?;
    let staged_files: Vec<String> = String::from_utf8_lossy(&staged.stdout)
        .lines()
        .map(str::to_string)
        .filter(|f| !f.is_empty())
        .collect();
    let unexpected: Vec<String> =
        staged_files.into_iter().filter(|f| f != design_doc_path).collect();
    if !unexpected.is_empty() {
        return Err(DesignCheckpointError::UnexpectedStagedFiles(unexpected));
    }

    let status = git(worktree_root, &["status", "--porcelain=v1", "--", design_doc_path]).await?;
    let has_changes = !status.stdout.is_empty();

    if has_changes {
        git(worktree_root, &["add", "--", design_doc_path]).await?;
        let message = format!("chore(design): checkpoint issue #{issue_number} design doc ({phase})");
        let commit = git(
            worktree_root,
            &[
                "-c",
                "user.name=warden-bot",
                "-c",
                "user.email=warden-bot@localhost",
                "-c",
                "commit.gpgsign=false",
                "commit",
                "--no-verify",
                "-m",
                &message,
            ],
        )
        .await?;
        if !commit.status.success() {
            return Err(DesignCheckpointError::GitFailed(
                String::from_utf8_lossy(&commit.stderr).trim().to_string(),
            ));
        }
    } else {
        let ls_files = git(worktree_root, &["ls-files", "--error-unmatch", design_doc_path]).await?;
        if !ls_files.status.success() {
            return Err(DesignCheckpointError::NotTrackedAfterCommit);
        }
    }

    let tracked = git(worktree_root, &["ls-files", "--error-unmatch", design_doc_path]).await?;
    if !tracked.status.success() {
        return Err(DesignCheckpointError::NotTrackedAfterCommit);
    }

    let _ = absolute;
    Ok(())
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
