// SPDX-License-Identifier: MIT

//! Timer bookkeeping for the iteration loop's three timeout kinds --
//! iteration timeout, inactivity timeout, and wave timeout -- kept as plain
//! deadline tracking so the orchestrator can poll it on every tick instead
//! of spawning a task per timer.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A timer that has reached its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFired {
    pub id: String,
}

/// Deadline-ordered timer set, keyed by a caller-chosen string id so the
/// same timer can be replaced (`set_timer` again) or cancelled by name.
#[derive(Default)]
pub struct Scheduler {
    deadlines: HashMap<String, Instant>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_timer(&mut self, id: String, duration: Duration, now: Instant) {
        self.deadlines.insert(id, now + duration);
    }

    pub fn cancel_timer(&mut self, id: &str) {
        self.deadlines.remove(id);
    }

    pub fn has_timers(&self) -> bool {
        !self.deadlines.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every timer whose deadline is at or before `now`.
    pub fn fired_timers(&mut self, now: Instant) -> Vec<TimerFired> {
        let fired_ids: Vec<String> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &fired_ids {
            self.deadlines.remove(id);
        }

        fired_ids.into_iter().map(|id| TimerFired { id }).collect()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
