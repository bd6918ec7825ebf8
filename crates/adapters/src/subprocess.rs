// SPDX-License-Identifier: MIT

//! Timeout-bounded subprocess execution, shared by the runner spawner, the
//! git worktree helpers, and the design-doc checkpointer's commit step.

use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Default wall-clock budget for a single git invocation.
pub const GIT_WORKTREE_TIMEOUT: Duration = Duration::from_secs(30);
pub const SHELL_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{label}: failed to spawn: {source}")]
    Spawn { label: String, source: std::io::Error },
    #[error("{label}: timed out after {timeout_secs}s")]
    Timeout { label: String, timeout_secs: u64 },
    #[error("{label}: failed to wait for exit: {source}")]
    Wait { label: String, source: std::io::Error },
}

/// Run `cmd` to completion, killing it if it outlives `timeout`.
///
/// On timeout the child is killed and its process group membership is not
/// assumed, so grandchildren may survive -- callers that spawn
/// process-group-aware commands should set that up on `cmd` themselves.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    label: &str,
) -> Result<std::process::Output, SubprocessError> {
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.stdin(std::process::Stdio::null());

    let child = cmd
        .spawn()
        .map_err(|source| SubprocessError::Spawn { label: label.to_string(), source })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(SubprocessError::Wait { label: label.to_string(), source }),
        Err(_) => Err(SubprocessError::Timeout {
            label: label.to_string(),
            timeout_secs: timeout.as_secs(),
        }),
    }
}

/// Map a completed process's exit into the runner's exit-code convention:
/// signal termination is reported as `128 + signal number`, matching shell
/// convention.
#[cfg(unix)]
pub fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    match status.code() {
        Some(code) => code,
        None => 128 + status.signal().unwrap_or(0),
    }
}

#[cfg(not(unix))]
pub fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
