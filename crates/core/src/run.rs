// SPDX-License-Identifier: MIT

//! Run identity and the `run.json` metadata record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `YYYYMMDDThhmmssZ-<pid>.<6-byte-base64url>`.
///
/// Uniqueness across a single process run holds with overwhelming
/// probability thanks to the 6 random bytes; it is not a cryptographic
/// guarantee and callers should not treat it as one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// Build a run id from its parts. `rand6` must be exactly 6 bytes; the
    /// caller supplies randomness so this function stays deterministic and
    /// testable (see `warden-engine`'s `make_run_id`, which sources the
    /// bytes from `getrandom` in production and a fixed seed in tests).
    pub fn new(timestamp: &str, pid: u32, rand6: &[u8; 6]) -> Self {
        let encoded = base64_url_no_pad(rand6);
        Self(format!("{timestamp}-{pid}.{encoded}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn base64_url_no_pad(bytes: &[u8; 6]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Stopped,
    CompletedViaPromise,
    CompletedViaState,
    Errored,
    MaxIterations,
}

crate::simple_display! {
    RunStatus {
        Running => "running",
        Stopped => "stopped",
        CompletedViaPromise => "completed_via_promise",
        CompletedViaState => "completed_via_state",
        Errored => "errored",
        MaxIterations => "max_iterations",
    }
}

/// Why the iteration loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompletionReason {
    /// `reached terminal phase: <phase>`
    ReachedTerminalPhase { phase: String },
    CompletionPromise,
    MaxIterations,
    ManualStop { reason: Option<String> },
    IterationTimeout,
    InactivityTimeout,
    WaveTimeout,
    SetupFailure { detail: String },
    MergeConflict { task_id: String },
    Fatal { detail: String },
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionReason::ReachedTerminalPhase { phase } => {
                write!(f, "reached terminal phase: {phase}")
            }
            CompletionReason::CompletionPromise => write!(f, "completion_promise"),
            CompletionReason::MaxIterations => write!(f, "max_iterations"),
            CompletionReason::ManualStop { reason } => match reason {
                Some(r) => write!(f, "manual_stop: {r}"),
                None => write!(f, "manual_stop"),
            },
            CompletionReason::IterationTimeout => write!(f, "iteration_timeout"),
            CompletionReason::InactivityTimeout => write!(f, "inactivity_timeout"),
            CompletionReason::WaveTimeout => write!(f, "wave_timeout"),
            CompletionReason::SetupFailure { detail } => write!(f, "setup_failure: {detail}"),
            CompletionReason::MergeConflict { task_id } => {
                write!(f, "merge_conflict: task {task_id}")
            }
            CompletionReason::Fatal { detail } => write!(f, "fatal: {detail}"),
        }
    }
}

/// Durable `run.json` contents, kept current across the whole run rather
/// than written only once at the end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub issue: String,
    pub workflow_override: Option<String>,
    pub provider: String,
    pub max_parallel_tasks: Option<u8>,
    pub max_iterations: u32,
    pub started_at_ms: u64,
    pub ended_at_ms: Option<u64>,
    pub running: bool,
    pub pid: Option<u32>,
    pub iterations_completed: u32,
    pub stop_requested: bool,
    pub stop_reason: Option<String>,
    pub last_error: Option<String>,
    pub completion_reason: Option<String>,
}

impl RunRecord {
    pub fn new(
        run_id: RunId,
        issue: String,
        workflow_override: Option<String>,
        provider: String,
        max_parallel_tasks: Option<u8>,
        max_iterations: u32,
        started_at_ms: u64,
        pid: u32,
    ) -> Self {
        Self {
            run_id,
            issue,
            workflow_override,
            provider,
            max_parallel_tasks,
            max_iterations,
            started_at_ms,
            ended_at_ms: None,
            running: true,
            pid: Some(pid),
            iterations_completed: 0,
            stop_requested: false,
            stop_reason: None,
            last_error: None,
            completion_reason: None,
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
