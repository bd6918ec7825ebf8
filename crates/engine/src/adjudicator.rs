// SPDX-License-Identifier: MIT

//! Phase-Report Adjudicator: separates what a runner *claims* about
//! `issue.status` from what the orchestrator actually *commits*, filtering
//! by a per-phase allowlist, normalizing contradictory pairs, and
//! discarding everything on a non-zero exit code.

use serde::Deserialize;
use std::collections::HashMap;
use warden_core::{IssueJson, PhaseReport, ReportSource, TRANSITION_STATUS_FIELDS};

/// Contradictory-pair normalization, applied in this fixed order so later
/// rules can react to earlier ones.
fn normalize(committed: &mut HashMap<String, bool>) {
    if committed.get("designApproved") == Some(&true) {
        committed.insert("designNeedsChanges".to_string(), false);
    }
    if committed.get("allTasksComplete") == Some(&true) {
        committed.insert("taskPassed".to_string(), true);
        committed.insert("taskFailed".to_string(), false);
        committed.insert("hasMoreTasks".to_string(), false);
    }
    if committed.get("missingWork") == Some(&true) {
        committed.insert("implementationComplete".to_string(), false);
    }
}

/// What the Adjudicator decided, in terms the orchestrator applies to its
/// in-memory `IssueJson` before writing it back.
pub struct AdjudicationOutcome {
    pub committed: HashMap<String, bool>,
    pub report: PhaseReport,
}

/// Raw claim a runner made, either parsed from `phase-report.json` or
/// inferred from a before/after diff.
pub struct Claim {
    pub source: ReportSource,
    pub status_updates: HashMap<String, bool>,
    pub outcome: Option<String>,
    pub reasons: Vec<String>,
    pub evidence_refs: Vec<String>,
}

/// The shape a runner writes to `<stateDir>/phase-report.json` when it
/// reports its own outcome, rather than leaving it to be inferred from a
/// before/after diff.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentPhaseReport {
    #[serde(default)]
    status_updates: HashMap<String, bool>,
    #[serde(default)]
    outcome: Option<String>,
    #[serde(default)]
    reasons: Vec<String>,
    #[serde(default)]
    evidence_refs: Vec<String>,
}

/// Parse an agent-written `phase-report.json` body into a `Claim`. Returns
/// `None` on any parse failure so the caller falls back to `infer_claim`.
pub fn parse_agent_claim(body: &str) -> Option<Claim> {
    let report: AgentPhaseReport = serde_json::from_str(body).ok()?;
    Some(Claim {
        source: ReportSource::AgentFile,
        status_updates: report.status_updates,
        outcome: report.outcome,
        reasons: report.reasons,
        evidence_refs: report.evidence_refs,
    })
}

/// Infer a claim by diffing `issue.status` booleans between before and
/// after, for runners that didn't write `phase-report.json`.
pub fn infer_claim(before: &IssueJson, after: &IssueJson) -> Claim {
    let mut status_updates = HashMap::new();
    for field in TRANSITION_STATUS_FIELDS {
        let before_value = before.status.get_bool(field);
        let after_value = after.status.get_bool(field);
        if before_value != after_value {
            status_updates.insert((*field).to_string(), after_value);
        }
    }
    Claim {
        source: ReportSource::Inferred,
        status_updates,
        outcome: None,
        reasons: Vec::new(),
        evidence_refs: Vec::new(),
    }
}

/// Adjudicate a single phase's claim against its pre-iteration state.
/// `allowed` is the per-phase allowlist of fields a runner may mutate,
/// supplied by the caller's workflow engine.
pub fn adjudicate(
    phase: &str,
    exit_code: i32,
    claim: Claim,
    allowed: &[&str],
) -> AdjudicationOutcome {
    let mut claimed = serde_json::Map::new();
    for (field, value) in &claim.status_updates {
        claimed.insert(field.clone(), serde_json::Value::Bool(*value));
    }

    let mut committed = HashMap::new();
    let mut ignored = Vec::new();
    let mut validation_errors = Vec::new();

    if exit_code != 0 {
        validation_errors
            .push(format!("exit_code {exit_code} != 0: all claimed status updates discarded"));
    } else {
        for (field, value) in &claim.status_updates {
            if !TRANSITION_STATUS_FIELDS.contains(&field.as_str()) {
                ignored.push(field.clone());
                validation_errors.push(format!("unrecognized status field {field:?}"));
                continue;
            }
            if !allowed.contains(&field.as_str()) {
                ignored.push(field.clone());
                continue;
            }
            committed.insert(field.clone(), *value);
        }
        normalize(&mut committed);
    }

    let mut committed_json = serde_json::Map::new();
    for (field, value) in &committed {
        committed_json.insert(field.clone(), serde_json::Value::Bool(*value));
    }

    let report = PhaseReport::builder(phase.to_string(), claim.source, exit_code)
        .claimed(claimed)
        .committed(committed_json)
        .ignored(ignored)
        .validation_errors(validation_errors)
        .reasons(claim.reasons)
        .evidence_refs(claim.evidence_refs)
        .outcome(claim.outcome.unwrap_or_default())
        .build();

    AdjudicationOutcome { committed, report }
}

/// Apply committed updates onto `issue`, after resetting
/// `TRANSITION_STATUS_FIELDS` and `phase` to their pre-iteration values.
pub fn apply_commit(
    issue: &mut IssueJson,
    issue_before_iteration: &IssueJson,
    committed: &HashMap<String, bool>,
) {
    issue.phase = issue_before_iteration.phase.clone();
    for field in TRANSITION_STATUS_FIELDS {
        let reset_value = issue_before_iteration.status.get_bool(field);
        issue.status.set_bool(field, reset_value);
    }
    for (field, value) in committed {
        issue.status.set_bool(field, *value);
    }
}

#[cfg(test)]
#[path = "adjudicator_tests.rs"]
mod tests;
