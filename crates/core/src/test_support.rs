// SPDX-License-Identifier: MIT

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::issue::IssueJson;
use crate::run::{RunId, RunRecord, RunStatus};
use crate::task::{Task, TaskStatus, TasksJson};

/// Build a minimal `IssueJson` for a given phase, with everything else at
/// its default.
pub fn issue_json(phase: &str) -> IssueJson {
    IssueJson { phase: Some(phase.to_string()), ..Default::default() }
}

/// Build a `Task` with the given id/status and no extra fields.
pub fn task(id: &str, status: TaskStatus) -> Task {
    Task::new(id, status)
}

/// Build a `TasksJson` from `(id, status)` pairs, in order.
pub fn tasks_json(entries: &[(&str, TaskStatus)]) -> TasksJson {
    TasksJson { tasks: entries.iter().map(|(id, status)| Task::new(*id, *status)).collect() }
}

/// A fake run id, stable across calls for deterministic test assertions.
pub fn fake_run_id(seed: u8) -> RunId {
    RunId::new("20260101T000000Z", 4242, &[seed, seed, seed, seed, seed, seed])
}

/// A minimal `RunRecord` in the `Running` state, as produced right after
/// `start`.
pub fn run_record(run_id: RunId, issue: &str) -> RunRecord {
    RunRecord::new(run_id, issue.to_string(), None, "fake".to_string(), None, 50, 0, 1)
}

/// Assert a `RunRecord`'s derived status matches the expected `RunStatus`
/// (there's no stored `status` field on `RunRecord` itself — callers derive
/// it from `running`/`completion_reason` the way the CLI's `status` command
/// does).
pub fn assert_run_status(record: &RunRecord, expected: RunStatus) {
    let actual = if record.running {
        RunStatus::Running
    } else {
        match record.completion_reason.as_deref() {
            Some(r) if r.starts_with("manual_stop") => RunStatus::Stopped,
            Some(r) if r.starts_with("reached terminal phase") => RunStatus::CompletedViaState,
            Some("completion_promise") => RunStatus::CompletedViaPromise,
            Some("max_iterations") => RunStatus::MaxIterations,
            _ => RunStatus::Errored,
        }
    };
    assert_eq!(actual, expected);
}
