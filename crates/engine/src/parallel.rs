// SPDX-License-Identifier: MIT

//! Parallel Runner: runs a "wave" of concurrent workers over the ready
//! subset of tasks, with reservation, rollback, timeout, and merge-conflict
//! handling. Workers are isolated OS subprocesses supervised here by polling
//! + process-exit events, never by letting a worker touch `issue.json`
//! directly.

use crate::orchestrator::StopHandle;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use warden_core::{ActiveWavePhase, ParallelState, RunId, TaskStatus, TasksJson};

/// `min(8, override ?? issueSetting ?? 1)`.
pub fn resolve_max_parallel_tasks(override_value: Option<u8>, issue_setting: Option<u8>) -> u8 {
    override_value.or(issue_setting).unwrap_or(1).min(8).max(1)
}

/// One worker's result for a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub exit_code: i32,
    /// Whether the worker's `implement_task.done`/`spec_check.done` marker
    /// was observed.
    pub done: bool,
}

impl WorkerOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && self.done
    }
}

/// Runs one task's worker subprocess inside its sandbox. Implemented by
/// `warden-adapters`' runner in production; faked in tests.
#[async_trait]
pub trait WaveWorker: Send + Sync {
    async fn run_task(&self, task_id: &str) -> WorkerOutcome;
}

/// Select `pending` tasks not already claimed by another active wave.
pub fn select_ready_tasks(tasks: &TasksJson, already_claimed: &[String]) -> Vec<String> {
    tasks
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending && !already_claimed.contains(&t.id))
        .map(|t| t.id.clone())
        .collect()
}

/// Reserve the selected tasks: capture their prior status, set them
/// `in_progress`. Returns the `priorStatus` map the caller persists into
/// `ParallelState::reserved_status_by_task_id`.
pub fn reserve(tasks: &mut TasksJson, selected: &[String]) -> HashMap<String, TaskStatus> {
    let mut reserved = HashMap::new();
    for id in selected {
        if let Some(task) = tasks.get_mut(id) {
            reserved.insert(id.clone(), task.status);
            task.status = TaskStatus::InProgress;
        }
    }
    reserved
}

/// Roll reserved tasks back to their prior status (setup failure or a stop
/// that doesn't preserve the wave).
pub fn rollback(tasks: &mut TasksJson, reserved: &HashMap<String, TaskStatus>) {
    for (id, prior) in reserved {
        if let Some(task) = tasks.get_mut(id) {
            task.status = *prior;
        }
    }
}

/// Outcome of running a wave of workers to completion, timeout, or stop.
pub struct WaveRunOutcome {
    pub results: HashMap<String, WorkerOutcome>,
    pub timed_out: bool,
    /// A stop was requested before every worker finished. `results` holds
    /// whatever workers had already reported in before the stop was noticed,
    /// which is almost always a strict subset of `task_ids`.
    pub stopped: bool,
}

/// Launch up to `max_parallel_tasks` workers concurrently for `task_ids`,
/// waiting for every launched worker to finish, for `wave_timeout` to
/// elapse, or for `stop` to be requested, whichever comes first.
pub async fn run_wave(
    worker: Arc<dyn WaveWorker>,
    task_ids: &[String],
    max_parallel_tasks: u8,
    wave_timeout: Duration,
    stop: &StopHandle,
    stop_poll_interval: Duration,
) -> WaveRunOutcome {
    let semaphore = Arc::new(Semaphore::new(max_parallel_tasks.max(1) as usize));
    let mut join_set = tokio::task::JoinSet::new();
    for id in task_ids {
        let id = id.clone();
        let worker = Arc::clone(&worker);
        let semaphore = Arc::clone(&semaphore);
        join_set.spawn(async move {
            // The semaphore is never closed, so acquire_owned only fails in
            // a case that can't happen here; treat it the same as any other
            // worker-side failure rather than panicking.
            let Ok(permit) = semaphore.acquire_owned().await else {
                return (id, WorkerOutcome { exit_code: -1, done: false });
            };
            let outcome = worker.run_task(&id).await;
            drop(permit);
            (id, outcome)
        });
    }

    let collect_all = async {
        let mut results = HashMap::new();
        while let Some(joined) = join_set.join_next().await {
            if let Ok((id, outcome)) = joined {
                results.insert(id, outcome);
            }
        }
        results
    };

    let wait_for_stop = async {
        loop {
            if stop.is_requested() {
                return;
            }
            tokio::time::sleep(stop_poll_interval).await;
        }
    };

    tokio::select! {
        result = tokio::time::timeout(wave_timeout, collect_all) => match result {
            Ok(results) => WaveRunOutcome { results, timed_out: false, stopped: false },
            Err(_) => WaveRunOutcome { results: HashMap::new(), timed_out: true, stopped: false },
        },
        _ = wait_for_stop => WaveRunOutcome { results: HashMap::new(), timed_out: false, stopped: true },
    }
}

/// Apply an implement wave's worker results onto `issue.status`: a task
/// whose worker failed or didn't produce its done marker is marked
/// `failed`; others are marked `completed`. Returns whether every task in
/// the wave is now complete.
pub fn apply_implement_results(
    tasks: &mut TasksJson,
    results: &HashMap<String, WorkerOutcome>,
) -> bool {
    for (id, outcome) in results {
        if let Some(task) = tasks.get_mut(id) {
            task.status = if outcome.success() { TaskStatus::Completed } else { TaskStatus::Failed };
        }
    }
    tasks.all_complete()
}

/// Build the `ParallelState` persisted to `issue.status.parallel` while a
/// wave is active.
pub fn start_wave_state(
    run_id: RunId,
    wave_id: impl Into<String>,
    phase: ActiveWavePhase,
    task_ids: Vec<String>,
    reserved: HashMap<String, TaskStatus>,
) -> ParallelState {
    let mut state = ParallelState::new(run_id, wave_id, phase);
    state.active_wave_task_ids = task_ids;
    state.reserved_status_by_task_id = reserved;
    state
}

/// Outcome of merging a spec-check wave's per-task worktree changes back
/// into the canonical worktree, in task-id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Clean,
    Conflict { task_id: String },
}

/// Merge `task_branches` (task id -> branch name) into the canonical
/// worktree in task-id order, stopping at the first conflict.
pub async fn merge_task_branches(
    canonical_worktree: &std::path::Path,
    task_branches: &[(String, String)],
) -> Result<MergeOutcome, warden_adapters::SubprocessError> {
    let mut ordered = task_branches.to_vec();
    ordered.sort_by(|a, b| a.0.cmp(&b.0));

    for (task_id, branch) in ordered {
        let mut cmd = tokio::process::Command::new("git");
        cmd.args(["merge", "--no-edit", &branch]).current_dir(canonical_worktree);
        let output = warden_adapters::run_with_timeout(
            cmd,
            warden_adapters::GIT_WORKTREE_TIMEOUT,
            "git merge task branch",
        )
        .await?;

        if !output.status.success() {
            let mut abort = tokio::process::Command::new("git");
            abort.args(["merge", "--abort"]).current_dir(canonical_worktree);
            let _ = warden_adapters::run_with_timeout(
                abort,
                warden_adapters::GIT_WORKTREE_TIMEOUT,
                "git merge abort",
            )
            .await;
            return Ok(MergeOutcome::Conflict { task_id });
        }
    }
    Ok(MergeOutcome::Clean)
}

#[cfg(test)]
#[path = "parallel_tests.rs"]
mod tests;
