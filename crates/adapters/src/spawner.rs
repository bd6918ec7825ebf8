// SPDX-License-Identifier: MIT

//! Launches a short-lived runner child process for one phase, pipes its
//! logs to the viewer log, and computes exit-code semantics from
//! `{exitCode, signal}`.

use crate::subprocess::exit_code_of;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

#[derive(Debug, Error)]
pub enum SpawnerError {
    #[error("runner binary not found: {0}")]
    RunnerNotFound(PathBuf),
    #[error("failed to spawn runner: {0}")]
    Spawn(std::io::Error),
    #[error("failed to open viewer log {path}: {source}")]
    ViewerLog { path: String, source: std::io::Error },
}

/// Per-phase overlay env the runner is launched with.
#[derive(Debug, Clone, Default)]
pub struct RunnerEnv {
    pub data_dir: PathBuf,
    pub model: Option<String>,
    pub permission_mode: Option<String>,
}

/// Everything the spawner needs to launch one runner invocation.
pub struct RunnerSpawnInputs<'a> {
    pub runner_bin: &'a Path,
    pub args: &'a [String],
    pub viewer_log_path: &'a Path,
    pub env: &'a RunnerEnv,
}

/// A still-running (or already-exited, in the synthetic-spawn-failure case)
/// runner child. `wait` is the single completion source the orchestrator
/// races against its watchdog timers.
pub enum RunnerHandle {
    Live {
        child: Child,
        stdout_task: tokio::task::JoinHandle<()>,
        stderr_task: tokio::task::JoinHandle<()>,
    },
    /// Spawn failed for a recoverable reason (resource/permission errors);
    /// the spawner already logged `[RUNNER] Spawn error` and resolves to the
    /// synthetic exit code `-1` without aborting the orchestrator.
    SpawnFailed,
}

impl RunnerHandle {
    pub fn pid(&self) -> Option<u32> {
        match self {
            RunnerHandle::Live { child, .. } => child.id(),
            RunnerHandle::SpawnFailed => None,
        }
    }

    /// Wait for the child to exit and map its status to an orchestrator exit
    /// code. Safe to call repeatedly (e.g. racing a watchdog timer on
    /// every poll): `Child::wait` is idempotent once the child has exited.
    /// Does not await the log-piping tasks -- call [`join_logs`] after this
    /// resolves to make sure every line reached the viewer log.
    ///
    /// [`join_logs`]: RunnerHandle::join_logs
    pub async fn wait(&mut self) -> i32 {
        match self {
            RunnerHandle::SpawnFailed => -1,
            RunnerHandle::Live { child, .. } => match child.wait().await {
                Ok(status) => exit_code_of(status),
                Err(_) => -1,
            },
        }
    }

    /// Await the stdout/stderr log-piping tasks. Only meaningful after
    /// [`wait`](RunnerHandle::wait) has returned.
    pub async fn join_logs(self) {
        if let RunnerHandle::Live { stdout_task, stderr_task, .. } = self {
            let _ = stdout_task.await;
            let _ = stderr_task.await;
        }
    }

    /// Send `SIGTERM` (or `SIGKILL` if `force`) to the child. A no-op if the
    /// child already exited or never spawned.
    #[cfg(unix)]
    pub fn signal(&self, force: bool) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = self.pid() {
            let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
            let _ = kill(Pid::from_raw(pid as i32), signal);
        }
    }

    #[cfg(not(unix))]
    pub fn signal(&self, _force: bool) {}
}

/// Launch one runner invocation. Closes stdin immediately; streams
/// stdout/stderr line-wise into `viewer_log_path` prefixed `[STDOUT]`/
/// `[STDERR]`.
pub async fn spawn_runner(inputs: RunnerSpawnInputs<'_>) -> Result<RunnerHandle, SpawnerError> {
    if !inputs.runner_bin.exists() {
        return Err(SpawnerError::RunnerNotFound(inputs.runner_bin.to_path_buf()));
    }

    let mut cmd = Command::new(inputs.runner_bin);
    cmd.args(inputs.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env("JEEVES_DATA_DIR", &inputs.env.data_dir);
    if let Some(model) = &inputs.env.model {
        cmd.env("JEEVES_MODEL", model);
    }
    if let Some(mode) = &inputs.env.permission_mode {
        cmd.env("JEEVES_PERMISSION_MODE", mode);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(source) => {
            append_viewer_log(inputs.viewer_log_path, &format!("[RUNNER] Spawn error: {source}"))
                .await?;
            return Ok(RunnerHandle::SpawnFailed);
        }
    };

    let Some(stdout) = child.stdout.take() else {
        unreachable!("spawned with Stdio::piped() stdout");
    };
    let Some(stderr) = child.stderr.take() else {
        unreachable!("spawned with Stdio::piped() stderr");
    };
    let stdout_log = inputs.viewer_log_path.to_path_buf();
    let stderr_log = inputs.viewer_log_path.to_path_buf();

    let stdout_task = tokio::spawn(pipe_lines(stdout, stdout_log, "[STDOUT]"));
    let stderr_task = tokio::spawn(pipe_lines(stderr, stderr_log, "[STDERR]"));

    Ok(RunnerHandle::Live { child, stdout_task, stderr_task })
}

async fn pipe_lines(reader: impl tokio::io::AsyncRead + Unpin, log_path: PathBuf, tag: &'static str) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let _ = append_viewer_log(&log_path, &format!("{tag} {line}")).await;
    }
}

async fn append_viewer_log(path: &Path, line: &str) -> Result<(), SpawnerError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path).await.map_err(
        |source| SpawnerError::ViewerLog { path: path.display().to_string(), source },
    )?;
    file.write_all(line.as_bytes())
        .await
        .map_err(|source| SpawnerError::ViewerLog { path: path.display().to_string(), source })?;
    file.write_all(b"\n")
        .await
        .map_err(|source| SpawnerError::ViewerLog { path: path.display().to_string(), source })
}

#[cfg(test)]
#[path = "spawner_tests.rs"]
mod tests;
