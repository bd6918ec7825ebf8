// SPDX-License-Identifier: MIT

//! `warden run`: starts a run against a selected issue's state directory,
//! blocking until it ends.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Args;
use serde::Deserialize;
use warden_core::{IssueJson, NullBroadcast, Provider, SystemClock};
use warden_engine::{
    Orchestrator, OrchestratorConfig, QuickFixOracle, StartRequest, StaticWorkflowEngine,
    StopHandle,
};
use warden_storage::IssueStore;

use super::common::IssueLocator;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub issue: IssueLocator,

    /// Git worktree checked out for this issue.
    #[arg(long, env = "WARDEN_WORKTREE")]
    pub worktree: PathBuf,

    /// Path to the runner subprocess binary.
    #[arg(long, env = "WARDEN_RUNNER_BIN")]
    pub runner_bin: PathBuf,

    /// Override the issue's configured workflow.
    #[arg(long)]
    pub workflow: Option<String>,

    /// Runner provider: `claude`, `codex`, or `fake`.
    #[arg(long, default_value = "claude")]
    pub provider: String,

    #[arg(long)]
    pub max_parallel_tasks: Option<u8>,

    #[arg(long)]
    pub max_iterations: Option<u32>,

    #[arg(long, default_value_t = 3600)]
    pub iteration_timeout_sec: u64,

    #[arg(long, default_value_t = 600)]
    pub inactivity_timeout_sec: u64,

    #[arg(long, default_value_t = 150)]
    pub watchdog_poll_ms: u64,

    #[arg(long, default_value_t = 30)]
    pub provider_lock_timeout_sec: u64,
}

/// No heuristic/LLM decision oracle is wired up at this outermost edge --
/// it's an external collaborator -- so the CLI always declines quick-fix
/// routing.
struct DeclineQuickFix;

#[async_trait]
impl QuickFixOracle for DeclineQuickFix {
    async fn decide_quick_fix_routing(&self, _issue: &IssueJson) -> Result<bool, String> {
        Ok(false)
    }
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let (issue_ref, state_dir) = args.issue.resolve()?;
    let provider = Provider::map_provider(&args.provider)?;

    let mut config =
        OrchestratorConfig::new(args.runner_bin.clone(), args.issue.data_dir.clone());
    config.iteration_timeout = Duration::from_secs(args.iteration_timeout_sec);
    config.inactivity_timeout = Duration::from_secs(args.inactivity_timeout_sec);
    config.watchdog_poll_interval = Duration::from_millis(args.watchdog_poll_ms);
    config.provider_operation_lock_timeout = Duration::from_secs(args.provider_lock_timeout_sec);
    if let Some(n) = args.max_iterations {
        config.max_iterations = n;
    }

    let orchestrator = Orchestrator::new(
        Arc::new(IssueStore::new()),
        Arc::new(StaticWorkflowEngine::new()),
        Arc::new(NullBroadcast),
        Arc::new(DeclineQuickFix),
        SystemClock,
        config,
    );

    let stop = StopHandle::new();
    install_stop_signal_handler(stop.clone(), state_dir.clone());

    let request = StartRequest {
        issue_ref,
        state_dir,
        worktree_root: args.worktree,
        workflow_override: args.workflow,
        provider,
        max_parallel_tasks: args.max_parallel_tasks,
        max_iterations: args.max_iterations,
    };

    let record = orchestrator.run(request, stop).await?;
    eprintln!(
        "[RUN] {} finished: {}",
        record.run_id.as_str(),
        record.completion_reason.as_deref().unwrap_or("unknown")
    );
    Ok(())
}

#[derive(Deserialize, Default)]
struct StopRequestFile {
    reason: Option<String>,
}

/// Translate an external SIGTERM/SIGINT -- the mechanism `warden stop` uses
/// to reach a running orchestrator in the same process group -- into a
/// graceful in-process stop request. `warden stop` drops a `reason` alongside
/// the signal in `stop-request.json`, since a bare signal can't carry text.
#[cfg(unix)]
fn install_stop_signal_handler(stop: StopHandle, state_dir: PathBuf) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (Ok(mut term), Ok(mut int)) =
            (signal(SignalKind::terminate()), signal(SignalKind::interrupt()))
        else {
            tracing::warn!("failed to install stop-signal handlers");
            return;
        };
        tokio::select! {
            _ = term.recv() => {}
            _ = int.recv() => {}
        }
        let reason = std::fs::read_to_string(state_dir.join("stop-request.json"))
            .ok()
            .and_then(|body| serde_json::from_str::<StopRequestFile>(&body).ok())
            .and_then(|req| req.reason);
        stop.request(false, reason);
    });
}

#[cfg(not(unix))]
fn install_stop_signal_handler(_stop: StopHandle, _state_dir: PathBuf) {}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
