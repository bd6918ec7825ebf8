// SPDX-License-Identifier: MIT

//! Git worktree sandboxing for parallel task workers and the orchestrator's
//! own run worktree.

use crate::subprocess::{run_with_timeout, GIT_WORKTREE_TIMEOUT};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("failed to create parent directory for worktree: {0}")]
    CreateParentDir(std::io::Error),
    #[error(transparent)]
    Subprocess(#[from] crate::subprocess::SubprocessError),
    #[error("git worktree add failed: {0}")]
    Add(String),
    #[error("failed to remove worktree directory: {0}")]
    RemoveDir(std::io::Error),
}

/// Create a git worktree at `path`, branching `branch` off `start_point`
/// (defaults to `HEAD`) inside `repo_root`.
pub async fn create_worktree(
    repo_root: &Path,
    path: &Path,
    branch: &str,
    start_point: Option<&str>,
) -> Result<(), WorktreeError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(WorktreeError::CreateParentDir)?;
    }
    let start_point = start_point.unwrap_or("HEAD");

    let mut cmd = Command::new("git");
    cmd.args([
        "-C",
        &repo_root.display().to_string(),
        "worktree",
        "add",
        "-b",
        branch,
        &path.display().to_string(),
        start_point,
    ])
    .env_remove("GIT_DIR")
    .env_remove("GIT_WORK_TREE");

    let output = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git worktree add").await?;
    if !output.status.success() {
        return Err(WorktreeError::Add(String::from_utf8_lossy(&output.stderr).trim().to_string()));
    }
    Ok(())
}

/// Best-effort removal of a worktree and its branch. Errors from either git
/// command are swallowed (logged) the way the original workspace teardown
/// does, since a leftover worktree directory is still cleaned up by the
/// final `remove_dir_all`.
pub async fn remove_worktree(path: &Path, branch: Option<&str>) -> Result<(), WorktreeError> {
    let dot_git = path.join(".git");
    let is_worktree =
        tokio::fs::symlink_metadata(&dot_git).await.map(|m| m.is_file()).unwrap_or(false);

    if is_worktree {
        let mut cmd = Command::new("git");
        cmd.args(["worktree", "remove", "--force", &path.display().to_string()])
            .current_dir(path);
        if let Err(e) = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git worktree remove").await {
            tracing::warn!(path = %path.display(), error = %e, "git worktree remove failed");
        }

        if let Some(branch) = branch {
            if let Some(repo_root) = repo_root_from_worktree_gitfile(&dot_git).await {
                let mut cmd = Command::new("git");
                cmd.args(["-C", &repo_root.display().to_string(), "branch", "-D", branch])
                    .env_remove("GIT_DIR")
                    .env_remove("GIT_WORK_TREE");
                if let Err(e) = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git branch delete").await
                {
                    tracing::warn!(%branch, error = %e, "git branch delete failed");
                }
            }
        }
    }

    if path.exists() {
        tokio::fs::remove_dir_all(path).await.map_err(WorktreeError::RemoveDir)?;
    }
    Ok(())
}

/// `<worktree>/.git` contains `gitdir: <repoRoot>/.git/worktrees/<name>`;
/// walk back up three levels to recover the repo root.
async fn repo_root_from_worktree_gitfile(dot_git: &Path) -> Option<PathBuf> {
    let contents = tokio::fs::read_to_string(dot_git).await.ok()?;
    let gitdir = contents.trim().strip_prefix("gitdir: ")?;
    Path::new(gitdir).parent()?.parent()?.parent().map(Path::to_path_buf)
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
