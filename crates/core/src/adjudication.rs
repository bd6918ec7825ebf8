// SPDX-License-Identifier: MIT

//! Phase-report vocabulary and audit record.
//!
//! The adjudication logic itself — reading `phase-report.json`, diffing
//! `issue.status` when it's absent, normalizing contradictory pairs, and
//! committing filtered updates — lives in `warden-engine`. This module only
//! carries the fixed boolean vocabulary and the audit shape both the engine
//! and storage layer need to agree on.

use serde::{Deserialize, Serialize};

/// The fixed boolean vocabulary a phase report may claim updates for.
/// Anything outside this set is ignored rather than silently dropped —
/// callers record it under `ignored` in the `PhaseReport`.
pub const TRANSITION_STATUS_FIELDS: &[&str] = &[
    "designApproved",
    "designNeedsChanges",
    "taskPassed",
    "taskFailed",
    "hasMoreTasks",
    "allTasksComplete",
    "reviewClean",
    "reviewNeedsChanges",
    "preCheckPassed",
    "preCheckFailed",
    "implementationComplete",
    "missingWork",
    "needsDesign",
    "handoffComplete",
    "prCreated",
    "commitFailed",
    "pushFailed",
];

/// Where a phase report's claimed updates came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
    /// Read from an agent-written `phase-report.json`.
    AgentFile,
    /// `phase-report.json` was absent; updates were inferred by diffing
    /// `issue.status` booleans before/after the phase.
    Inferred,
}

crate::simple_display! {
    ReportSource {
        AgentFile => "agent_file",
        Inferred => "inferred",
    }
}

/// The audit record always written to `<stateDir>/phase-report.json` after a
/// phase runs, regardless of whether the agent produced its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub schema_version: u32,
    pub phase: String,
    pub source: ReportSource,
    pub exit_code: i32,
    /// What the agent (or the pre/post diff) claimed, keyed by field name.
    pub claimed: serde_json::Map<String, serde_json::Value>,
    /// What was actually written to `issue.status` after filtering,
    /// normalization, and the exit-code gate.
    pub committed: serde_json::Map<String, serde_json::Value>,
    /// Claimed fields outside this phase's allowlist, or outside
    /// `TRANSITION_STATUS_FIELDS` entirely.
    pub ignored: Vec<String>,
    pub validation_errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_refs: Vec<String>,
}

impl PhaseReport {
    pub fn builder(phase: impl Into<String>, source: ReportSource, exit_code: i32) -> PhaseReportBuilder {
        PhaseReportBuilder::new(phase, source, exit_code)
    }
}

/// Builder for `PhaseReport`, using the crate's `setters!`-generated
/// builder pattern.
#[derive(Debug, Clone)]
pub struct PhaseReportBuilder {
    phase: String,
    source: ReportSource,
    exit_code: i32,
    claimed: serde_json::Map<String, serde_json::Value>,
    committed: serde_json::Map<String, serde_json::Value>,
    ignored: Vec<String>,
    validation_errors: Vec<String>,
    outcome: Option<String>,
    reasons: Vec<String>,
    evidence_refs: Vec<String>,
}

impl PhaseReportBuilder {
    pub fn new(phase: impl Into<String>, source: ReportSource, exit_code: i32) -> Self {
        Self {
            phase: phase.into(),
            source,
            exit_code,
            claimed: serde_json::Map::new(),
            committed: serde_json::Map::new(),
            ignored: Vec::new(),
            validation_errors: Vec::new(),
            outcome: None,
            reasons: Vec::new(),
            evidence_refs: Vec::new(),
        }
    }

    crate::setters! {
        set {
            claimed: serde_json::Map<String, serde_json::Value>,
            committed: serde_json::Map<String, serde_json::Value>,
            ignored: Vec<String>,
            validation_errors: Vec<String>,
            reasons: Vec<String>,
            evidence_refs: Vec<String>,
        }
    }

    pub fn outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    pub fn build(self) -> PhaseReport {
        PhaseReport {
            schema_version: 1,
            phase: self.phase,
            source: self.source,
            exit_code: self.exit_code,
            claimed: self.claimed,
            committed: self.committed,
            ignored: self.ignored,
            validation_errors: self.validation_errors,
            outcome: self.outcome,
            reasons: self.reasons,
            evidence_refs: self.evidence_refs,
        }
    }
}

#[cfg(test)]
#[path = "adjudication_tests.rs"]
mod tests;
