// SPDX-License-Identifier: MIT

//! `warden status`: prints the last `viewer-run-status.json` recorded for a
//! selected issue, enriched with the derived `RunStatus` computed the same
//! way `warden-core`'s test helpers do.

use clap::Args;
use warden_core::RunStatus;

use super::common::IssueLocator;
use crate::output::{format_or_json, OutputFormat};

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub issue: IssueLocator,

    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

pub fn run(args: StatusArgs) -> anyhow::Result<()> {
    let (issue_ref, state_dir) = args.issue.resolve()?;
    let path = state_dir.join("viewer-run-status.json");
    let body = std::fs::read_to_string(&path)
        .map_err(|_| anyhow::anyhow!("no run status recorded yet for {issue_ref}"))?;
    let mut value: serde_json::Value = serde_json::from_str(&body)?;

    let running = value.get("running").and_then(|v| v.as_bool()).unwrap_or(false);
    let completion_reason =
        value.get("completion_reason").and_then(|v| v.as_str()).map(str::to_string);
    let status = derive_run_status(running, completion_reason.as_deref());
    let iterations = value.get("iterations_completed").and_then(|v| v.as_u64()).unwrap_or(0);
    let last_error = value.get("last_error").and_then(|v| v.as_str()).map(str::to_string);
    if let Some(obj) = value.as_object_mut() {
        obj.insert("status".to_string(), serde_json::Value::String(status.to_string()));
    }

    format_or_json(args.output, &value, || {
        println!("{issue_ref}: {status}");
        println!("iterations completed: {iterations}");
        if let Some(err) = &last_error {
            println!("last error: {err}");
        }
    })
}

/// Mirrors `warden_core::test_support::assert_run_status`'s derivation: a
/// `RunRecord` carries `running`/`completion_reason`, not a stored status.
fn derive_run_status(running: bool, completion_reason: Option<&str>) -> RunStatus {
    if running {
        return RunStatus::Running;
    }
    match completion_reason {
        Some(r) if r.starts_with("manual_stop") => RunStatus::Stopped,
        Some(r) if r.starts_with("reached terminal phase") => RunStatus::CompletedViaState,
        Some("completion_promise") => RunStatus::CompletedViaPromise,
        Some("max_iterations") => RunStatus::MaxIterations,
        _ => RunStatus::Errored,
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
