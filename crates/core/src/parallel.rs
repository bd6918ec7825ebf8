// SPDX-License-Identifier: MIT

//! `issue.status.parallel` — the live state of an in-progress wave.

use crate::run::RunId;
use crate::task::TaskStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which kind of wave is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveWavePhase {
    ImplementTask,
    TaskSpecCheck,
}

crate::simple_display! {
    ActiveWavePhase {
        ImplementTask => "implement_task",
        TaskSpecCheck => "task_spec_check",
    }
}

/// Persisted under `issue.status.parallel` while a wave owns a set of tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelState {
    pub run_id: RunId,
    pub active_wave_id: String,
    pub active_wave_phase: ActiveWavePhase,
    pub active_wave_task_ids: Vec<String>,
    /// Task id -> status captured at reservation time, used to roll back on
    /// setup failure or a stop that doesn't preserve the wave.
    pub reserved_status_by_task_id: HashMap<String, TaskStatus>,
}

impl ParallelState {
    pub fn new(
        run_id: RunId,
        active_wave_id: impl Into<String>,
        active_wave_phase: ActiveWavePhase,
    ) -> Self {
        Self {
            run_id,
            active_wave_id: active_wave_id.into(),
            active_wave_phase,
            active_wave_task_ids: Vec::new(),
            reserved_status_by_task_id: HashMap::new(),
        }
    }

    /// True if this wave belongs to the given run (used by the crash-recovery
    /// step to tell a live wave from an orphaned one).
    pub fn owned_by(&self, run_id: &RunId) -> bool {
        &self.run_id == run_id
    }
}

#[cfg(test)]
#[path = "parallel_tests.rs"]
mod tests;
