// SPDX-License-Identifier: MIT

//! Run Orchestrator: owns the iteration loop, binds the Workflow Engine,
//! Phase-Report Adjudicator, Parallel Runner, Design-Doc Checkpointer, and
//! Quick-Fix Router, and persists the durable run archive.

use crate::adjudicator::{adjudicate, apply_commit, infer_claim, parse_agent_claim};
use crate::checkpoint::{self, checkpoint, resolve_design_doc_path};
use crate::parallel::{self, WaveWorker, WorkerOutcome};
use crate::quickfix::{self, QuickFixOracle};
use crate::scheduler::Scheduler;
use crate::workflow::{migrate_legacy_phase, WorkflowEngine};
use async_trait::async_trait;
use parking_lot::Mutex as PLMutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use warden_adapters::{
    create_worktree, run_with_timeout, spawn_runner, RunnerEnv, RunnerHandle, RunnerSpawnInputs,
    SpawnerError, SubprocessError, GIT_WORKTREE_TIMEOUT,
};
use warden_core::{
    ActiveWavePhase, Broadcast, Clock, CompletionReason, IssueJson, IssueRef, Phase, Provider,
    RunEvent, RunId, RunRecord, TaskExecutionMode, TaskStatus, TasksJson, WorkflowName,
};
use warden_storage::{
    AcquireOutcome, IssueStore, IssueStoreError, OperationLock, OperationLockError, RunArchive,
    RunArchiveError, RunJournal, RunJournalStage,
};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("issue {0} has no issue.json -- nothing selected")]
    NoIssueSelected(IssueRef),
    #[error("worktree does not exist: {0}")]
    WorktreeMissing(PathBuf),
    #[error("a run is already active for {issue}: {holder}")]
    AlreadyRunning { issue: IssueRef, holder: String },
    #[error("max_parallel_tasks must be 1..=8, got {0}")]
    InvalidMaxParallelTasks(u8),
    #[error(transparent)]
    Storage(#[from] IssueStoreError),
    #[error(transparent)]
    Archive(#[from] RunArchiveError),
    #[error(transparent)]
    Lock(#[from] OperationLockError),
    #[error(transparent)]
    Journal(#[from] warden_storage::RunJournalError),
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
}

/// Every tunable the main loop and its watchdog consult, configurable so
/// tests can run with near-zero timeouts.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub iteration_timeout: Duration,
    pub inactivity_timeout: Duration,
    pub watchdog_poll_interval: Duration,
    pub provider_operation_lock_timeout: Duration,
    pub max_iterations: u32,
    pub runner_bin: PathBuf,
    pub data_dir: PathBuf,
}

impl OrchestratorConfig {
    pub fn new(runner_bin: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            iteration_timeout: Duration::from_secs(3600),
            inactivity_timeout: Duration::from_secs(600),
            watchdog_poll_interval: Duration::from_millis(150),
            provider_operation_lock_timeout: Duration::from_secs(30),
            max_iterations: 50,
            runner_bin,
            data_dir,
        }
    }
}

/// Parameters for one `start` call.
pub struct StartRequest {
    pub issue_ref: IssueRef,
    pub state_dir: PathBuf,
    pub worktree_root: PathBuf,
    pub workflow_override: Option<String>,
    pub provider: Provider,
    pub max_parallel_tasks: Option<u8>,
    pub max_iterations: Option<u32>,
}

/// Cross-task handle for requesting a stop.
#[derive(Clone)]
pub struct StopHandle(Arc<StopState>);

struct StopState {
    requested: AtomicBool,
    force: AtomicBool,
    reason: PLMutex<Option<String>>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self(Arc::new(StopState {
            requested: AtomicBool::new(false),
            force: AtomicBool::new(false),
            reason: PLMutex::new(None),
        }))
    }

    pub fn request(&self, force: bool, reason: Option<String>) {
        self.0.requested.store(true, Ordering::SeqCst);
        if force {
            self.0.force.store(true, Ordering::SeqCst);
        }
        if reason.is_some() {
            *self.0.reason.lock() = reason;
        }
    }

    pub fn is_requested(&self) -> bool {
        self.0.requested.load(Ordering::SeqCst)
    }

    fn is_force(&self) -> bool {
        self.0.force.load(Ordering::SeqCst)
    }

    fn reason(&self) -> Option<String> {
        self.0.reason.lock().clone()
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the iteration loop for a single run.
pub struct Orchestrator<C: Clock> {
    issue_store: Arc<IssueStore>,
    workflow_engine: Arc<dyn WorkflowEngine>,
    broadcast: Arc<dyn Broadcast>,
    quick_fix_oracle: Arc<dyn QuickFixOracle>,
    clock: C,
    config: OrchestratorConfig,
}

impl<C: Clock> Orchestrator<C> {
    pub fn new(
        issue_store: Arc<IssueStore>,
        workflow_engine: Arc<dyn WorkflowEngine>,
        broadcast: Arc<dyn Broadcast>,
        quick_fix_oracle: Arc<dyn QuickFixOracle>,
        clock: C,
        config: OrchestratorConfig,
    ) -> Self {
        Self { issue_store, workflow_engine, broadcast, quick_fix_oracle, clock, config }
    }

    /// Run a full start-to-finalize cycle, returning the final `RunRecord`.
    pub async fn run(
        &self,
        request: StartRequest,
        stop: StopHandle,
    ) -> Result<RunRecord, OrchestratorError> {
        self.check_preconditions(&request)?;

        let lock = OperationLock::new(request.state_dir.clone());
        let run_id = make_run_id(&self.clock);
        let operation_id = format!("run-{run_id}");
        match lock.acquire(
            &operation_id,
            &request.issue_ref.to_string(),
            self.config.provider_operation_lock_timeout,
        )? {
            AcquireOutcome::Busy { holder_operation_id } => {
                return Err(OrchestratorError::AlreadyRunning {
                    issue: request.issue_ref.clone(),
                    holder: holder_operation_id,
                });
            }
            AcquireOutcome::Acquired | AcquireOutcome::StaleCleaned => {}
        }

        let journal = RunJournal::new(request.state_dir.clone());
        let result = self.run_locked(&request, &run_id, &operation_id, &journal, &stop).await;
        let _ = journal.clear();
        let _ = lock.release();
        result
    }

    fn check_preconditions(&self, request: &StartRequest) -> Result<(), OrchestratorError> {
        if self.issue_store.read_issue_json(&request.state_dir)?.is_none() {
            return Err(OrchestratorError::NoIssueSelected(request.issue_ref.clone()));
        }
        if !request.worktree_root.exists() {
            return Err(OrchestratorError::WorktreeMissing(request.worktree_root.clone()));
        }
        if let Some(n) = request.max_parallel_tasks {
            if !(1..=8).contains(&n) {
                return Err(OrchestratorError::InvalidMaxParallelTasks(n));
            }
        }
        Ok(())
    }

    async fn run_locked(
        &self,
        request: &StartRequest,
        run_id: &RunId,
        operation_id: &str,
        journal: &RunJournal,
        stop: &StopHandle,
    ) -> Result<RunRecord, OrchestratorError> {
        let run_dir = request.state_dir.join(".runs").join(run_id.as_str());
        let archive = RunArchive::new(run_dir);
        archive.init()?;

        let max_iterations = request.max_iterations.unwrap_or(self.config.max_iterations);
        let mut record = RunRecord::new(
            run_id.clone(),
            request.issue_ref.to_string(),
            request.workflow_override.clone(),
            request.provider.to_string(),
            request.max_parallel_tasks,
            max_iterations,
            self.clock.epoch_ms(),
            std::process::id(),
        );
        archive.write_run_record(&record)?;
        self.broadcast.emit(RunEvent::Started { run_id: run_id.clone() });

        self.recover_orphaned_tasks(request, run_id, &archive)?;

        let mut completion_reason: Option<CompletionReason> = None;

        for iteration in 1..=max_iterations {
            if stop.is_requested() {
                break;
            }

            let Some(mut issue) = self.issue_store.read_issue_json(&request.state_dir)? else {
                completion_reason =
                    Some(CompletionReason::Fatal { detail: "issue.json disappeared mid-run".to_string() });
                break;
            };

            if iteration == 1 {
                let default_start = self
                    .workflow_engine
                    .start_phase(&WorkflowName::new("default"))
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                let outcome = quickfix::route(
                    self.quick_fix_oracle.as_ref(),
                    iteration,
                    request.workflow_override.as_deref(),
                    &mut issue,
                    &default_start,
                    "quick-fix",
                    "quick_fix",
                )
                .await;
                if let quickfix::RouteOutcome::Routed { .. } = &outcome {
                    issue.status.quick_fix_routed = true;
                    self.issue_store.write_issue_json(&request.state_dir, &issue)?;
                    archive.append_viewer_log("[QUICK_FIX] routed to quick-fix workflow")?;
                }
            }

            let workflow_name = WorkflowName::new(
                request.workflow_override.clone().unwrap_or_else(|| issue.workflow.clone()),
            );
            let start_phase = self.workflow_engine.start_phase(&workflow_name);

            let raw_phase = issue.phase.as_deref().map(str::trim).filter(|p| !p.is_empty());
            let current_phase = match raw_phase {
                None => start_phase.clone(),
                Some(phase) if self.workflow_engine.has_phase(&workflow_name, phase) => {
                    Some(Phase::new(phase))
                }
                Some(phase) => match &start_phase {
                    Some(start) => migrate_legacy_phase(phase, start),
                    None => None,
                },
            };
            let Some(current_phase) = current_phase else {
                completion_reason = Some(CompletionReason::Fatal {
                    detail: format!("unknown phase for workflow {workflow_name}"),
                });
                break;
            };

            if self.workflow_engine.is_terminal(&workflow_name, &current_phase) {
                completion_reason =
                    Some(CompletionReason::ReachedTerminalPhase { phase: current_phase.to_string() });
                break;
            }

            journal.record(
                operation_id,
                run_id.as_str(),
                iteration,
                current_phase.as_str(),
                RunJournalStage::IterationStarted,
            )?;

            let issue_before_iteration = issue.clone();
            let phase_report_path = request.state_dir.join("phase-report.json");
            let _ = std::fs::remove_file(&phase_report_path);

            let use_parallel = issue.settings.task_execution.mode == TaskExecutionMode::Parallel
                && matches!(current_phase.as_str(), "implement_task" | "task_spec_check");

            let phase_outcome = if use_parallel {
                self.run_parallel_wave(
                    request,
                    run_id,
                    &archive,
                    &current_phase,
                    request.max_parallel_tasks,
                    issue_before_iteration.settings.task_execution.max_parallel_tasks,
                    stop,
                )
                .await?
            } else {
                self.run_sequential_phase(request, &archive, &current_phase, &workflow_name, stop).await?
            };
            let exit_code = phase_outcome.exit_code;

            let mut issue_after = self
                .issue_store
                .read_issue_json(&request.state_dir)?
                .unwrap_or_else(|| issue_before_iteration.clone());

            if !use_parallel && phase_outcome.completion_reason.is_none() {
                let claim = read_phase_report_claim(&phase_report_path)
                    .unwrap_or_else(|| infer_claim(&issue_before_iteration, &issue_after));
                let allowed =
                    self.workflow_engine.allowed_status_updates(&workflow_name, current_phase.as_str());
                let outcome = adjudicate(current_phase.as_str(), exit_code, claim, allowed);
                apply_commit(&mut issue_after, &issue_before_iteration, &outcome.committed);
                self.issue_store.write_issue_json(&request.state_dir, &issue_after)?;
                let report_json = serde_json::to_string_pretty(&outcome.report).unwrap_or_default();
                let _ = std::fs::write(&phase_report_path, &report_json);
                journal.record(
                    operation_id,
                    run_id.as_str(),
                    iteration,
                    current_phase.as_str(),
                    RunJournalStage::Adjudicated,
                )?;
            }

            archive.snapshot_iteration(
                iteration,
                current_phase.as_str(),
                &self.gather_iteration_archive(request).await,
            )?;
            record.iterations_completed = iteration;
            archive.write_run_record(&record)?;

            if let Some(reason) = phase_outcome.completion_reason {
                completion_reason = Some(reason);
                break;
            }

            if exit_code != 0 {
                if record.last_error.is_none() {
                    record.last_error =
                        Some(format!("runner exited with code {exit_code} (phase={current_phase})"));
                }
                continue;
            }

            if request.workflow_override.is_none() && issue_after.workflow != workflow_name.as_str() {
                let new_workflow = WorkflowName::new(issue_after.workflow.clone());
                if let Some(new_start) = self.workflow_engine.start_phase(&new_workflow) {
                    archive.append_viewer_log(&format!(
                        "[WORKFLOW] {workflow_name} -> {new_workflow} (phase={new_start})"
                    ))?;
                    issue_after.phase = Some(new_start.to_string());
                    self.issue_store.write_issue_json(&request.state_dir, &issue_after)?;
                    continue;
                }
            }

            if checkpoint::is_checkpoint_phase(current_phase.as_str()) {
                let candidate =
                    resolve_design_doc_path(issue_after.design_doc_candidate(), request.issue_ref.number);
                if let Err(e) = checkpoint(
                    &request.worktree_root,
                    &candidate,
                    request.issue_ref.number,
                    current_phase.as_str(),
                )
                .await
                {
                    if record.last_error.is_none() {
                        record.last_error = Some(e.to_string());
                    }
                }
            }

            if let Some(next_phase) =
                self.workflow_engine.evaluate_transitions(&workflow_name, &current_phase, &issue_after)
            {
                archive
                    .append_viewer_log(&format!("[TRANSITION] {current_phase} -> {next_phase}"))?;
                self.broadcast.emit(RunEvent::PhaseTransitioned {
                    run_id: run_id.clone(),
                    from: current_phase.clone(),
                    to: next_phase.clone(),
                });
                issue_after.phase = Some(next_phase.to_string());
                issue_after.control.restart_phase = false;
                self.issue_store.write_issue_json(&request.state_dir, &issue_after)?;

                if self.workflow_engine.is_terminal(&workflow_name, &next_phase) {
                    completion_reason =
                        Some(CompletionReason::ReachedTerminalPhase { phase: next_phase.to_string() });
                    break;
                }
            }

            if self.completion_promise_present(request)? {
                archive.append_viewer_log("[COMPLETE] completion promise observed")?;
                completion_reason = Some(CompletionReason::CompletionPromise);
                break;
            }
        }

        if stop.is_requested() {
            record.stop_requested = true;
            record.stop_reason = stop.reason();
        }

        if completion_reason.is_none() {
            if stop.is_requested() {
                completion_reason = Some(CompletionReason::ManualStop { reason: stop.reason() });
                self.broadcast
                    .emit(RunEvent::Stopped { run_id: run_id.clone(), reason: stop.reason() });
            } else {
                completion_reason = Some(CompletionReason::MaxIterations);
            }
        }

        let reason = completion_reason.unwrap_or(CompletionReason::MaxIterations);
        journal.record(
            operation_id,
            run_id.as_str(),
            record.iterations_completed,
            reason.to_string().as_str(),
            RunJournalStage::Finalized,
        )?;
        self.finalize(request, &archive, &mut record, reason.clone())?;
        self.broadcast.emit(RunEvent::Finished { run_id: run_id.clone(), reason });

        Ok(record)
    }

    fn recover_orphaned_tasks(
        &self,
        request: &StartRequest,
        run_id: &RunId,
        archive: &RunArchive,
    ) -> Result<(), OrchestratorError> {
        let mut tasks = self.issue_store.read_tasks_json(&request.state_dir)?;
        let Some(mut issue) = self.issue_store.read_issue_json(&request.state_dir)? else {
            return Ok(());
        };

        // A fresh run's run_id can never match a previously-persisted
        // ParallelState, so any in_progress task found here is orphaned by
        // construction.
        let owned = issue.status.parallel.as_ref().map(|p| p.owned_by(run_id)).unwrap_or(false);
        let mut recovered = Vec::new();
        for task in tasks.tasks.iter_mut() {
            if task.status == TaskStatus::InProgress && !owned {
                task.status = TaskStatus::Failed;
                recovered.push(task.id.clone());
            }
        }

        if recovered.is_empty() {
            return Ok(());
        }

        self.issue_store.write_tasks_json(&request.state_dir, &tasks)?;
        if !owned && issue.status.parallel.is_some() {
            issue.status.parallel = None;
            self.issue_store.write_issue_json(&request.state_dir, &issue)?;
        }
        for task_id in &recovered {
            self.issue_store.append_progress(
                &request.state_dir,
                &format!("[RECOVERY] task {task_id} was in_progress with no live wave; marked failed"),
            )?;
        }
        archive.append_viewer_log(&format!(
            "[RECOVERY] recovered {} orphaned task(s): {}",
            recovered.len(),
            recovered.join(", ")
        ))?;
        Ok(())
    }

    async fn run_sequential_phase(
        &self,
        request: &StartRequest,
        archive: &RunArchive,
        phase: &Phase,
        workflow_name: &WorkflowName,
        stop: &StopHandle,
    ) -> Result<PhaseOutcome, OrchestratorError> {
        archive.append_viewer_log(&format!("[ITERATION] phase={phase}"))?;
        let execution = self.workflow_engine.phase_execution(workflow_name, phase);
        let env = RunnerEnv {
            data_dir: self.config.data_dir.clone(),
            model: execution.model,
            permission_mode: execution.permission_mode,
        };
        let args = vec![
            "--phase".to_string(),
            phase.to_string(),
            "--issue".to_string(),
            request.issue_ref.to_string(),
        ];
        let viewer_log_path = archive.viewer_log_path();
        let inputs = RunnerSpawnInputs {
            runner_bin: &self.config.runner_bin,
            args: &args,
            viewer_log_path: &viewer_log_path,
            env: &env,
        };

        let handle = match spawn_runner(inputs).await {
            Ok(handle) => handle,
            Err(SpawnerError::RunnerNotFound(path)) => {
                archive.append_viewer_log(&format!("[ERROR] runner not found: {}", path.display()))?;
                return Ok(PhaseOutcome { exit_code: -1, completion_reason: None });
            }
            Err(e) => {
                archive.append_viewer_log(&format!("[ERROR] {e}"))?;
                return Ok(PhaseOutcome { exit_code: -1, completion_reason: None });
            }
        };

        let (exit_code, timed_out) =
            self.watch_sequential_runner(handle, &viewer_log_path, stop).await;
        if let Some(kind) = timed_out {
            archive.append_viewer_log(&format!("[TIMEOUT] {kind}"))?;
            let reason = match kind {
                TimeoutKind::Iteration => CompletionReason::IterationTimeout,
                TimeoutKind::Inactivity => CompletionReason::InactivityTimeout,
            };
            return Ok(PhaseOutcome { exit_code, completion_reason: Some(reason) });
        }
        Ok(PhaseOutcome { exit_code, completion_reason: None })
    }

    async fn watch_sequential_runner(
        &self,
        mut handle: RunnerHandle,
        viewer_log_path: &Path,
        stop: &StopHandle,
    ) -> (i32, Option<TimeoutKind>) {
        let mut scheduler = Scheduler::new();
        let now = self.clock.now();
        scheduler.set_timer("iteration".to_string(), self.config.iteration_timeout, now);
        scheduler.set_timer("inactivity".to_string(), self.config.inactivity_timeout, now);
        let mut last_len = file_len(viewer_log_path);
        let mut stop_signal_sent = false;

        let (exit_code, timed_out) = loop {
            tokio::select! {
                code = handle.wait() => break (code, None),
                _ = tokio::time::sleep(self.config.watchdog_poll_interval) => {
                    if stop.is_requested() {
                        // Forward the stop request into the live child rather than
                        // waiting for the next iteration boundary to notice it.
                        handle.signal(stop.is_force());
                        if stop.is_force() || stop_signal_sent {
                            break (handle.wait().await, None);
                        }
                        stop_signal_sent = true;
                        continue;
                    }
                    let now = self.clock.now();
                    let len = file_len(viewer_log_path);
                    if len != last_len {
                        last_len = len;
                        scheduler.set_timer("inactivity".to_string(), self.config.inactivity_timeout, now);
                    }
                    let fired = scheduler.fired_timers(now);
                    if let Some(timer) = fired.first() {
                        let kind = if timer.id == "iteration" {
                            TimeoutKind::Iteration
                        } else {
                            TimeoutKind::Inactivity
                        };
                        handle.signal(false);
                        break (handle.wait().await, Some(kind));
                    }
                }
            }
        };
        handle.join_logs().await;
        (exit_code, timed_out)
    }

    async fn run_parallel_wave(
        &self,
        request: &StartRequest,
        run_id: &RunId,
        archive: &RunArchive,
        phase: &Phase,
        override_max: Option<u8>,
        issue_max: Option<u8>,
        stop: &StopHandle,
    ) -> Result<PhaseOutcome, OrchestratorError> {
        let max_parallel_tasks = parallel::resolve_max_parallel_tasks(override_max, issue_max);
        let mut tasks = self.issue_store.read_tasks_json(&request.state_dir)?;
        let mut issue = self.issue_store.read_issue_json(&request.state_dir)?.unwrap_or_default();

        let already_claimed =
            issue.status.parallel.as_ref().map(|p| p.active_wave_task_ids.clone()).unwrap_or_default();
        let selected = parallel::select_ready_tasks(&tasks, &already_claimed);
        if selected.is_empty() {
            archive.append_viewer_log("[PARALLEL] no ready tasks; wave is a no-op")?;
            return Ok(PhaseOutcome { exit_code: 0, completion_reason: None });
        }

        let reserved = parallel::reserve(&mut tasks, &selected);
        self.issue_store.write_tasks_json(&request.state_dir, &tasks)?;
        let wave_id = format!("wave-{}", self.clock.epoch_ms());
        let active_phase = if phase.as_str() == "implement_task" {
            ActiveWavePhase::ImplementTask
        } else {
            ActiveWavePhase::TaskSpecCheck
        };
        issue.status.parallel = Some(parallel::start_wave_state(
            run_id.clone(),
            wave_id.clone(),
            active_phase,
            selected.clone(),
            reserved,
        ));
        self.issue_store.write_issue_json(&request.state_dir, &issue)?;
        self.broadcast.emit(RunEvent::WaveStarted {
            run_id: run_id.clone(),
            wave_id: wave_id.clone(),
            task_count: selected.len(),
        });
        archive.append_viewer_log(&format!(
            "[PARALLEL] wave {} started with {} task(s)",
            wave_id,
            selected.len()
        ))?;

        let worker: Arc<dyn WaveWorker> = Arc::new(ActiveWaveWorker {
            runner_bin: self.config.runner_bin.clone(),
            data_dir: self.config.data_dir.clone(),
            archive_run_dir: archive.run_dir().to_path_buf(),
            worktree_root: request.worktree_root.clone(),
            issue_ref: request.issue_ref.to_string(),
            phase: phase.to_string(),
        });
        let wave_result = parallel::run_wave(
            worker,
            &selected,
            max_parallel_tasks,
            self.config.iteration_timeout,
            stop,
            self.config.watchdog_poll_interval,
        )
        .await;

        self.broadcast
            .emit(RunEvent::WaveFinished { run_id: run_id.clone(), wave_id: wave_id.clone() });

        if wave_result.timed_out {
            archive.append_viewer_log("[TIMEOUT] wave timed out")?;
            let mut tasks = self.issue_store.read_tasks_json(&request.state_dir)?;
            let mut issue = self.issue_store.read_issue_json(&request.state_dir)?.unwrap_or_default();
            if let Some(parallel_state) = &issue.status.parallel {
                parallel::rollback(&mut tasks, &parallel_state.reserved_status_by_task_id);
            }
            issue.status.parallel = None;
            self.issue_store.write_tasks_json(&request.state_dir, &tasks)?;
            self.issue_store.write_issue_json(&request.state_dir, &issue)?;
            return Ok(PhaseOutcome {
                exit_code: 1,
                completion_reason: Some(CompletionReason::WaveTimeout),
            });
        }

        if wave_result.stopped {
            let all_done = selected.iter().all(|id| archive.worker_dir(id).join(".task-done").exists());
            if all_done {
                archive.append_viewer_log(
                    "[STOP] wave stopped with every task's done marker present; preserving wave state",
                )?;
            } else {
                archive.append_viewer_log(
                    "[STOP] wave stopped with tasks still in flight; rolling back reservations",
                )?;
                let mut tasks = self.issue_store.read_tasks_json(&request.state_dir)?;
                let mut issue = self.issue_store.read_issue_json(&request.state_dir)?.unwrap_or_default();
                if let Some(parallel_state) = &issue.status.parallel {
                    parallel::rollback(&mut tasks, &parallel_state.reserved_status_by_task_id);
                }
                issue.status.parallel = None;
                self.issue_store.write_tasks_json(&request.state_dir, &tasks)?;
                self.issue_store.write_issue_json(&request.state_dir, &issue)?;
            }
            self.issue_store.append_progress(
                &request.state_dir,
                "Manual Stop: Between Implement/Spec-Check",
            )?;
            return Ok(PhaseOutcome {
                exit_code: 1,
                completion_reason: Some(CompletionReason::ManualStop { reason: stop.reason() }),
            });
        }

        let mut tasks = self.issue_store.read_tasks_json(&request.state_dir)?;
        let mut issue = self.issue_store.read_issue_json(&request.state_dir)?.unwrap_or_default();

        let conflict = if phase.as_str() == "implement_task" {
            self.finish_implement_wave(request, &mut tasks, &mut issue, &wave_result.results)?;
            None
        } else {
            self.finish_spec_check_wave(request, &mut tasks, &mut issue, &selected, &wave_result.results)
                .await?
        };

        Ok(PhaseOutcome {
            exit_code: 0,
            completion_reason: conflict.map(|task_id| CompletionReason::MergeConflict { task_id }),
        })
    }

    fn finish_implement_wave(
        &self,
        request: &StartRequest,
        tasks: &mut TasksJson,
        issue: &mut IssueJson,
        results: &HashMap<String, WorkerOutcome>,
    ) -> Result<(), OrchestratorError> {
        let all_complete = parallel::apply_implement_results(tasks, results);
        let any_failed = tasks.any_failed();
        issue.status.set_bool("hasMoreTasks", any_failed || tasks.has_pending());
        issue.status.set_bool("allTasksComplete", all_complete);
        issue.status.parallel = None;
        self.issue_store.write_tasks_json(&request.state_dir, tasks)?;
        self.issue_store.write_issue_json(&request.state_dir, issue)?;
        Ok(())
    }

    /// Returns `Some(task_id)` if the merge hit a conflict, terminating the
    /// run with `MergeConflict`.
    async fn finish_spec_check_wave(
        &self,
        request: &StartRequest,
        tasks: &mut TasksJson,
        issue: &mut IssueJson,
        task_ids: &[String],
        results: &HashMap<String, WorkerOutcome>,
    ) -> Result<Option<String>, OrchestratorError> {
        let branches: Vec<(String, String)> =
            task_ids.iter().map(|id| (id.clone(), format!("task/{id}"))).collect();
        let merge_outcome = parallel::merge_task_branches(&request.worktree_root, &branches).await?;

        let conflicted = match merge_outcome {
            parallel::MergeOutcome::Clean => {
                for (id, outcome) in results {
                    if let Some(task) = tasks.get_mut(id) {
                        task.status =
                            if outcome.success() { TaskStatus::Completed } else { TaskStatus::Failed };
                    }
                }
                let all_complete = tasks.all_complete();
                let any_failed = tasks.any_failed();
                issue.status.set_bool("taskPassed", !any_failed && all_complete);
                issue.status.set_bool("taskFailed", any_failed);
                issue.status.set_bool("hasMoreTasks", any_failed || tasks.has_pending());
                issue.status.set_bool("allTasksComplete", all_complete);
                None
            }
            parallel::MergeOutcome::Conflict { task_id } => {
                if let Some(task) = tasks.get_mut(&task_id) {
                    task.status = TaskStatus::Failed;
                }
                issue.status.set_bool("taskFailed", true);
                issue.status.set_bool("hasMoreTasks", true);
                issue.status.set_bool("allTasksComplete", false);
                Some(task_id)
            }
        };
        issue.status.parallel = None;
        self.issue_store.write_tasks_json(&request.state_dir, tasks)?;
        self.issue_store.write_issue_json(&request.state_dir, issue)?;
        Ok(conflicted)
    }

    fn completion_promise_present(&self, request: &StartRequest) -> Result<bool, OrchestratorError> {
        let path = request.state_dir.join("sdk-output.json");
        let Ok(body) = std::fs::read_to_string(&path) else {
            return Ok(false);
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) else {
            return Ok(false);
        };
        let Some(messages) = value.get("messages").and_then(|m| m.as_array()) else {
            return Ok(false);
        };
        Ok(messages.iter().any(|m| {
            let ty = m.get("type").and_then(|t| t.as_str()).unwrap_or("");
            let content = m.get("content").and_then(|c| c.as_str()).unwrap_or("");
            matches!(ty, "assistant" | "result") && content.trim() == "<promise>COMPLETE</promise>"
        }))
    }

    async fn gather_iteration_archive(&self, request: &StartRequest) -> warden_storage::IterationArchive {
        let read = |name: &str| std::fs::read_to_string(request.state_dir.join(name)).unwrap_or_default();
        let git_status = git_output(&request.worktree_root, &["status", "--porcelain=v1", "-b"]).await;
        let git_diff_stat = git_output(&request.worktree_root, &["diff", "--stat"]).await;
        warden_storage::IterationArchive {
            last_run_log: read("last-run.log"),
            sdk_output_json: read("sdk-output.json"),
            issue_json: read("issue.json"),
            tasks_json: read("tasks.json"),
            progress_txt: read("progress.txt"),
            phase_report_json: read("phase-report.json"),
            git_status,
            git_diff_stat,
        }
    }

    fn finalize(
        &self,
        request: &StartRequest,
        archive: &RunArchive,
        record: &mut RunRecord,
        reason: CompletionReason,
    ) -> Result<(), OrchestratorError> {
        record.completion_reason = Some(reason.to_string());
        record.running = false;
        record.ended_at_ms = Some(self.clock.epoch_ms());
        record.pid = None;

        let status = serde_json::json!({
            "run_id": record.run_id.as_str(),
            "running": record.running,
            "completion_reason": record.completion_reason,
            "iterations_completed": record.iterations_completed,
            "last_error": record.last_error,
        });
        warden_storage::write_viewer_run_status(&request.state_dir, archive.run_dir(), &status)?;

        let read = |name: &str| std::fs::read_to_string(request.state_dir.join(name)).unwrap_or_default();
        archive.write_final_artifacts(&read("issue.json"), &read("tasks.json"), &read("progress.txt"))?;
        archive.write_run_record(record)?;
        Ok(())
    }
}

/// Result of running one phase (sequential or parallel): the exit code to
/// feed the adjudicator, plus a terminal completion reason if the phase
/// itself ended the run (a timeout or a merge conflict).
struct PhaseOutcome {
    exit_code: i32,
    completion_reason: Option<CompletionReason>,
}

/// Which of the watchdog's two timers fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeoutKind {
    Iteration,
    Inactivity,
}

impl std::fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutKind::Iteration => write!(f, "iteration timeout"),
            TimeoutKind::Inactivity => write!(f, "inactivity timeout"),
        }
    }
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Run a `git` subcommand against `worktree_root` for the iteration archive,
/// collapsing any failure (not a repo, timeout, missing binary) to an empty
/// string rather than failing the iteration over it.
async fn git_output(worktree_root: &Path, args: &[&str]) -> String {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(worktree_root);
    match run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git").await {
        Ok(output) => String::from_utf8_lossy(&output.stdout).into_owned(),
        Err(_) => String::new(),
    }
}

/// Read and parse an agent-written `phase-report.json`, if the runner left
/// one. Returns `None` when the file is absent or fails to parse, so the
/// caller falls back to inferring the claim from a before/after diff.
fn read_phase_report_claim(path: &Path) -> Option<crate::adjudicator::Claim> {
    let body = std::fs::read_to_string(path).ok()?;
    parse_agent_claim(&body)
}

/// One parallel-wave worker: launches a runner scoped to a single task in
/// its own git worktree under the run archive's `workers/` directory, and
/// reports done once the worktree carries a `.task-done` marker.
struct ActiveWaveWorker {
    runner_bin: PathBuf,
    data_dir: PathBuf,
    archive_run_dir: PathBuf,
    worktree_root: PathBuf,
    issue_ref: String,
    phase: String,
}

#[async_trait]
impl WaveWorker for ActiveWaveWorker {
    async fn run_task(&self, task_id: &str) -> WorkerOutcome {
        let worker_dir = self.archive_run_dir.join("workers").join(task_id);
        let branch = format!("task/{task_id}");
        if create_worktree(&self.worktree_root, &worker_dir, &branch, None).await.is_err() {
            return WorkerOutcome { exit_code: -1, done: false };
        }

        let viewer_log_path = worker_dir.join("worker.log");
        let _ = tokio::fs::write(&viewer_log_path, b"").await;
        let env = RunnerEnv { data_dir: self.data_dir.clone(), model: None, permission_mode: None };
        let args = vec![
            "--phase".to_string(),
            self.phase.clone(),
            "--issue".to_string(),
            self.issue_ref.clone(),
            "--task".to_string(),
            task_id.to_string(),
        ];
        let inputs = RunnerSpawnInputs {
            runner_bin: &self.runner_bin,
            args: &args,
            viewer_log_path: &viewer_log_path,
            env: &env,
        };

        match spawn_runner(inputs).await {
            Ok(mut handle) => {
                let exit_code = handle.wait().await;
                handle.join_logs().await;
                let done = worker_dir.join(".task-done").exists();
                WorkerOutcome { exit_code, done }
            }
            Err(_) => WorkerOutcome { exit_code: -1, done: false },
        }
    }
}

/// Build a fresh `runId`, sourcing randomness from `rand` and the
/// timestamp/pid from the given clock/process.
fn make_run_id(clock: &impl Clock) -> RunId {
    use rand::RngCore;
    let epoch_ms = clock.epoch_ms();
    let secs = (epoch_ms / 1000) as i64;
    let timestamp = chrono::DateTime::from_timestamp(secs, 0)
        .unwrap_or_default()
        .format("%Y%m%dT%H%M%SZ")
        .to_string();
    let mut rand6 = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut rand6);
    RunId::new(&timestamp, std::process::id(), &rand6)
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
