// SPDX-License-Identifier: MIT

//! Workflow Engine: an external collaborator the core consumes through this
//! trait rather than owning its phase graphs. `StaticWorkflowEngine` is a
//! small table-driven reference implementation covering the `"default"` and
//! `"quick-fix"` workflows, suitable for tests and as a starting point for a
//! richer, config-loaded engine.

use std::collections::HashMap;
use warden_core::{IssueJson, Phase, Provider, WorkflowName};

/// Resolved execution parameters for a phase: provider/model/permission
/// resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseExecution {
    pub provider: Provider,
    pub model: Option<String>,
    pub permission_mode: Option<String>,
}

/// Given a workflow name, current phase, and the issue state committed so
/// far this iteration, decide the next phase (or that the workflow is
/// terminal).
pub trait WorkflowEngine: Send + Sync {
    fn start_phase(&self, workflow: &WorkflowName) -> Option<Phase>;
    fn is_terminal(&self, workflow: &WorkflowName, phase: &Phase) -> bool;
    fn evaluate_transitions(
        &self,
        workflow: &WorkflowName,
        current: &Phase,
        issue: &IssueJson,
    ) -> Option<Phase>;
    fn phase_execution(&self, workflow: &WorkflowName, phase: &Phase) -> PhaseExecution;

    /// Whether `phase` is one this engine recognizes for `workflow`. A
    /// phase read from disk that isn't recognized is either legacy-migrated
    /// or fatal.
    fn has_phase(&self, workflow: &WorkflowName, phase: &str) -> bool;

    /// The subset of `TRANSITION_STATUS_FIELDS` a runner may mutate while
    /// executing `phase`. The adjudicator takes this as an input rather than
    /// hardcoding it, so a different workflow engine can define its own
    /// per-phase vocabulary.
    fn allowed_status_updates(&self, workflow: &WorkflowName, phase: &str) -> &[&'static str];
}

#[derive(Debug, Clone)]
struct PhaseDef {
    /// Ordered `(next_phase, predicate_field)` pairs; the first whose
    /// boolean status field is `true` wins. `None` means "unconditional
    /// default" and short-circuits evaluation.
    transitions: Vec<(Option<&'static str>, &'static str)>,
    terminal: bool,
}

/// Table-driven reference workflow engine.
pub struct StaticWorkflowEngine {
    workflows: HashMap<&'static str, (&'static str, HashMap<&'static str, PhaseDef>)>,
}

impl StaticWorkflowEngine {
    pub fn new() -> Self {
        let mut workflows = HashMap::new();
        workflows.insert("default", ("design_draft", default_phase_table()));
        workflows.insert("quick-fix", ("quick_fix", quick_fix_phase_table()));
        Self { workflows }
    }

    fn table(&self, workflow: &WorkflowName) -> Option<&(&'static str, HashMap<&'static str, PhaseDef>)> {
        self.workflows.get(workflow.as_str())
    }

    fn status_bool(issue: &IssueJson, field: &str) -> bool {
        issue.status.get_bool(field)
    }
}

impl Default for StaticWorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowEngine for StaticWorkflowEngine {
    fn start_phase(&self, workflow: &WorkflowName) -> Option<Phase> {
        self.table(workflow).map(|(start, _)| Phase::new(*start))
    }

    fn is_terminal(&self, workflow: &WorkflowName, phase: &Phase) -> bool {
        self.table(workflow)
            .and_then(|(_, phases)| phases.get(phase.as_str()))
            .map(|def| def.terminal)
            .unwrap_or(false)
    }

    fn evaluate_transitions(
        &self,
        workflow: &WorkflowName,
        current: &Phase,
        issue: &IssueJson,
    ) -> Option<Phase> {
        let (_, phases) = self.table(workflow)?;
        let def = phases.get(current.as_str())?;
        for (next, field) in &def.transitions {
            match next {
                Some(next_phase) => {
                    if Self::status_bool(issue, field) {
                        return Some(Phase::new(*next_phase));
                    }
                }
                None => return Some(Phase::new(*field)),
            }
        }
        None
    }

    fn phase_execution(&self, _workflow: &WorkflowName, _phase: &Phase) -> PhaseExecution {
        PhaseExecution { provider: Provider::Claude, model: None, permission_mode: None }
    }

    fn has_phase(&self, workflow: &WorkflowName, phase: &str) -> bool {
        self.table(workflow).map(|(_, phases)| phases.contains_key(phase)).unwrap_or(false)
    }

    fn allowed_status_updates(&self, _workflow: &WorkflowName, phase: &str) -> &[&'static str] {
        allowed_fields_for_phase(phase)
    }
}

/// Per-phase allowlist of `TRANSITION_STATUS_FIELDS` a runner may mutate.
/// Fields a phase writes outside this set are ignored and recorded in the
/// audit report, not silently dropped.
fn allowed_fields_for_phase(phase: &str) -> &'static [&'static str] {
    match phase {
        "design_draft" | "design_classify" | "design_research" | "design_workflow"
        | "design_api" | "design_data" | "design_edit" => &["needsDesign"],
        "design_plan" => &["designApproved", "designNeedsChanges", "needsDesign"],
        "implement_task" => &[
            "taskPassed",
            "taskFailed",
            "hasMoreTasks",
            "allTasksComplete",
            "implementationComplete",
            "missingWork",
        ],
        "task_spec_check" => &["taskPassed", "taskFailed", "hasMoreTasks", "allTasksComplete"],
        "review" => &["reviewClean", "reviewNeedsChanges", "missingWork"],
        "package" => &["handoffComplete", "prCreated", "commitFailed", "pushFailed"],
        "quick_fix" => &["reviewClean", "reviewNeedsChanges"],
        _ => &[],
    }
}

fn default_phase_table() -> HashMap<&'static str, PhaseDef> {
    let mut t = HashMap::new();
    // The design_* chain mirrors the design-doc checkpointer's checkpoint
    // phase list -- every phase named there is a real, reachable phase in
    // this workflow.
    t.insert(
        "design_draft",
        PhaseDef { transitions: vec![(None, "design_classify")], terminal: false },
    );
    t.insert(
        "design_classify",
        PhaseDef { transitions: vec![(None, "design_research")], terminal: false },
    );
    t.insert(
        "design_research",
        PhaseDef { transitions: vec![(None, "design_workflow")], terminal: false },
    );
    t.insert(
        "design_workflow",
        PhaseDef { transitions: vec![(None, "design_api")], terminal: false },
    );
    t.insert(
        "design_api",
        PhaseDef { transitions: vec![(None, "design_data")], terminal: false },
    );
    t.insert(
        "design_data",
        PhaseDef { transitions: vec![(None, "design_plan")], terminal: false },
    );
    t.insert(
        "design_plan",
        PhaseDef {
            transitions: vec![
                ("implement_task", "designApproved"),
                ("design_edit", "designNeedsChanges"),
            ],
            terminal: false,
        },
    );
    t.insert(
        "design_edit",
        PhaseDef { transitions: vec![(None, "design_plan")], terminal: false },
    );
    t.insert(
        "implement_task",
        PhaseDef {
            transitions: vec![
                ("task_spec_check", "allTasksComplete"),
                ("implement_task", "hasMoreTasks"),
            ],
            terminal: false,
        },
    );
    t.insert(
        "task_spec_check",
        PhaseDef {
            transitions: vec![
                ("implement_task", "taskFailed"),
                ("review", "taskPassed"),
            ],
            terminal: false,
        },
    );
    t.insert(
        "review",
        PhaseDef {
            transitions: vec![
                ("implement_task", "reviewNeedsChanges"),
                ("package", "reviewClean"),
            ],
            terminal: false,
        },
    );
    t.insert(
        "package",
        PhaseDef { transitions: vec![(None, "done")], terminal: false },
    );
    t.insert("done", PhaseDef { transitions: vec![], terminal: true });
    t
}

fn quick_fix_phase_table() -> HashMap<&'static str, PhaseDef> {
    let mut t = HashMap::new();
    t.insert(
        "quick_fix",
        PhaseDef {
            transitions: vec![
                ("quick_fix", "reviewNeedsChanges"),
                (None, "done"),
            ],
            terminal: false,
        },
    );
    t.insert("done", PhaseDef { transitions: vec![], terminal: true });
    t
}

/// Legacy phase name migration: if a phase is unknown, legacy-migrate
/// `design_draft -> start`. Only fires when `design_draft` is *not* a
/// phase the resolved workflow recognizes -- for the `"default"` workflow
/// it is a real phase, so this only matters for workflows (installed later)
/// that dropped it.
pub fn migrate_legacy_phase(phase: &str, start: &Phase) -> Option<Phase> {
    if phase == "design_draft" {
        Some(start.clone())
    } else {
        None
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
