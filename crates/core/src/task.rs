// SPDX-License-Identifier: MIT

//! `tasks.json` — the task list a parallel (or sequential) implement wave
//! operates over.

use serde::{Deserialize, Serialize};

/// Status of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Failed => "failed",
    }
}

/// A single task entry. `id` is unique within the file; everything beyond
/// `id`/`status`/`files_allowed` is agent- or runbook-defined and round-trips
/// through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,

    #[serde(default, rename = "filesAllowed", skip_serializing_if = "Option::is_none")]
    pub files_allowed: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Task {
    pub fn new(id: impl Into<String>, status: TaskStatus) -> Self {
        Self { id: id.into(), status, files_allowed: None, extra: serde_json::Map::new() }
    }
}

/// `{ tasks: [...] }` — the recognized shape of `tasks.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TasksJson {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl TasksJson {
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Tasks with `status == Pending`, in file order.
    pub fn ready(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.status == TaskStatus::Pending)
    }

    pub fn all_complete(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.status == TaskStatus::Completed)
    }

    pub fn any_failed(&self) -> bool {
        self.tasks.iter().any(|t| t.status == TaskStatus::Failed)
    }

    pub fn has_pending(&self) -> bool {
        self.tasks.iter().any(|t| t.status == TaskStatus::Pending)
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
