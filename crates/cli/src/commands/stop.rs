// SPDX-License-Identifier: MIT

//! `warden stop`: signals a running orchestrator in the same process group.
//! A plain stop (SIGTERM) is handled gracefully by the orchestrator's own
//! watchdog loop; `--force` sends SIGKILL, which can't be caught and
//! terminates the run -- and whatever runner subprocess it owns --
//! immediately.

use clap::Args;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use warden_storage::{write_json_atomic, RunArchive};

use super::common::{latest_run_dir, IssueLocator};

#[derive(Args, Debug)]
pub struct StopArgs {
    #[command(flatten)]
    pub issue: IssueLocator,

    /// Send SIGKILL instead of SIGTERM; cannot be handled gracefully.
    #[arg(long)]
    pub force: bool,

    /// Recorded as the stop reason; ignored with `--force`, which can't carry
    /// a payload across the signal.
    #[arg(long)]
    pub reason: Option<String>,
}

#[derive(Serialize)]
struct StopRequestFile {
    reason: Option<String>,
}

pub fn run(args: StopArgs) -> anyhow::Result<()> {
    let (issue_ref, state_dir) = args.issue.resolve()?;
    let Some(run_dir) = latest_run_dir(&state_dir)? else {
        anyhow::bail!("no run found for {issue_ref}");
    };
    let archive = RunArchive::new(run_dir.clone());
    let Some(record) = archive.read_run_record()? else {
        anyhow::bail!("run archive at {} has no run.json", run_dir.display());
    };
    if !record.running {
        println!("{issue_ref} has no running run (the last run already finished)");
        return Ok(());
    }
    let Some(pid) = record.pid else {
        anyhow::bail!("run {} has no recorded pid", record.run_id.as_str());
    };

    if !args.force {
        write_json_atomic(
            &state_dir.join("stop-request.json"),
            &StopRequestFile { reason: args.reason.clone() },
        )?;
    }

    let signal = if args.force { Signal::SIGKILL } else { Signal::SIGTERM };
    kill(Pid::from_raw(pid as i32), signal)?;
    println!(
        "sent {} to run {} (pid {pid})",
        if args.force { "SIGKILL" } else { "SIGTERM" },
        record.run_id.as_str()
    );
    Ok(())
}

#[cfg(test)]
#[path = "stop_tests.rs"]
mod tests;
