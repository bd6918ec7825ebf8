// SPDX-License-Identifier: MIT

//! The selected issue reference and the recognized shape of `issue.json`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// `owner/repo#number` — the canonical reference to a selected issue.
///
/// An issue is "selectable" only if `issue.json` exists in its state
/// directory; `IssueRef` itself carries no existence guarantee, it is just
/// the coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl IssueRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self { owner: owner.into(), repo: repo.into(), number }
    }

    /// The issue's state directory beneath a data root, e.g.
    /// `<data_root>/owner/repo/42`.
    pub fn state_dir(&self, data_root: &Path) -> PathBuf {
        data_root.join(&self.owner).join(&self.repo).join(self.number.to_string())
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Error parsing an `owner/repo#number` reference string.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseIssueRefError {
    #[error("expected `owner/repo#number`, got {0:?}")]
    BadFormat(String),
    #[error("issue number must be a positive integer, got {0:?}")]
    BadNumber(String),
}

impl std::str::FromStr for IssueRef {
    type Err = ParseIssueRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (owner_repo, number_str) =
            s.split_once('#').ok_or_else(|| ParseIssueRefError::BadFormat(s.to_string()))?;
        let (owner, repo) = owner_repo
            .split_once('/')
            .ok_or_else(|| ParseIssueRefError::BadFormat(s.to_string()))?;
        if owner.is_empty() || repo.is_empty() {
            return Err(ParseIssueRefError::BadFormat(s.to_string()));
        }
        let number: u64 = number_str
            .parse()
            .map_err(|_| ParseIssueRefError::BadNumber(number_str.to_string()))?;
        if number == 0 {
            return Err(ParseIssueRefError::BadNumber(number_str.to_string()));
        }
        Ok(IssueRef::new(owner, repo, number))
    }
}

/// `settings.taskExecution.mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskExecutionMode {
    Sequential,
    Parallel,
}

impl Default for TaskExecutionMode {
    fn default() -> Self {
        TaskExecutionMode::Sequential
    }
}

/// `settings.taskExecution`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskExecutionSettings {
    #[serde(default)]
    pub mode: TaskExecutionMode,
    /// 1..8; validated at the call site, not here (the struct round-trips
    /// whatever was on disk even if a human hand-edited it out of range).
    #[serde(default, rename = "maxParallelTasks", skip_serializing_if = "Option::is_none")]
    pub max_parallel_tasks: Option<u8>,
}

/// `settings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSettings {
    #[serde(default, rename = "taskExecution")]
    pub task_execution: TaskExecutionSettings,
}

/// `control` — flags the orchestrator consumes and clears.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlags {
    #[serde(default, rename = "restartPhase")]
    pub restart_phase: bool,
}

/// The recognized boolean sub-vocabulary of `status`, plus provider-shaped
/// sub-objects the orchestrator itself never mutates but must round-trip.
///
/// Unrecognized keys land in `extra` via `#[serde(flatten)]` and are written
/// back unchanged — this is the mechanism behind the "no key outside the
/// recognized set is mutated" invariant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<crate::parallel::ParallelState>,

    /// Set by the Quick-Fix Router once an issue has been routed on
    /// iteration 1, so a later run doesn't re-consult the oracle.
    #[serde(default, rename = "quickFixRouted", skip_serializing_if = "std::ops::Not::not")]
    pub quick_fix_routed: bool,

    /// Every other boolean transition field (`designApproved`,
    /// `taskFailed`, `prCreated`, ...) plus any provider/unknown sub-objects
    /// (`sonarToken`, `azureDevops`, `projectFiles`, ...) round-trip here.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl IssueStatus {
    pub fn get_bool(&self, field: &str) -> bool {
        self.extra.get(field).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn set_bool(&mut self, field: &str, value: bool) {
        self.extra.insert(field.to_string(), serde_json::Value::Bool(value));
    }
}

/// The recognized shape of `<stateDir>/issue.json`.
///
/// No key outside the recognized set is mutated by the orchestrator; unknown
/// keys are preserved verbatim on round-trip via `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    #[serde(default = "default_workflow")]
    pub workflow: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(default)]
    pub status: IssueStatus,

    #[serde(default)]
    pub settings: IssueSettings,

    #[serde(default)]
    pub control: ControlFlags,

    #[serde(default, rename = "designDocPath", skip_serializing_if = "Option::is_none")]
    pub design_doc_path: Option<String>,

    #[serde(default, rename = "designDoc", skip_serializing_if = "Option::is_none")]
    pub design_doc: Option<String>,

    /// `issue`, plus any other top-level key this orchestrator doesn't
    /// recognize. Preserved verbatim on round-trip.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_workflow() -> String {
    "default".to_string()
}

impl IssueJson {
    /// The design doc path the checkpointer should use, before path
    /// normalization.
    pub fn design_doc_candidate(&self) -> Option<&str> {
        self.design_doc_path.as_deref().or(self.design_doc.as_deref())
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
