use super::*;
use crate::workflow::{StaticWorkflowEngine, WorkflowEngine};
use warden_core::test_support::issue_json;
use warden_core::WorkflowName;

fn claim(fields: &[(&str, bool)]) -> Claim {
    Claim {
        source: ReportSource::AgentFile,
        status_updates: fields.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        outcome: Some("done".to_string()),
        reasons: vec![],
        evidence_refs: vec![],
    }
}

fn allowed(phase: &str) -> Vec<&'static str> {
    let engine = StaticWorkflowEngine::new();
    engine.allowed_status_updates(&WorkflowName::new("default"), phase).to_vec()
}

#[test]
fn allowed_field_is_committed() {
    let outcome =
        adjudicate("design_plan", 0, claim(&[("designApproved", true)]), &allowed("design_plan"));

    assert_eq!(outcome.committed.get("designApproved"), Some(&true));
    assert!(outcome.report.ignored.is_empty());
}

#[test]
fn field_outside_phase_allowlist_is_ignored_not_committed() {
    let outcome = adjudicate("design_plan", 0, claim(&[("prCreated", true)]), &allowed("design_plan"));

    assert!(!outcome.committed.contains_key("prCreated"));
    assert_eq!(outcome.report.ignored, vec!["prCreated".to_string()]);
}

#[test]
fn field_outside_recognized_vocabulary_is_ignored_and_flagged() {
    let outcome =
        adjudicate("design_plan", 0, claim(&[("notARealField", true)]), &allowed("design_plan"));

    assert_eq!(outcome.report.ignored, vec!["notARealField".to_string()]);
    assert!(!outcome.report.validation_errors.is_empty());
}

#[test]
fn nonzero_exit_code_discards_all_committed_updates() {
    let outcome =
        adjudicate("design_plan", 1, claim(&[("designApproved", true)]), &allowed("design_plan"));

    assert!(outcome.committed.is_empty());
    assert!(!outcome.report.validation_errors.is_empty());
}

#[test]
fn design_approved_true_normalizes_design_needs_changes_false() {
    let outcome = adjudicate(
        "design_plan",
        0,
        claim(&[("designApproved", true), ("designNeedsChanges", true)]),
        &allowed("design_plan"),
    );

    assert_eq!(outcome.committed.get("designApproved"), Some(&true));
    assert_eq!(outcome.committed.get("designNeedsChanges"), Some(&false));
}

#[test]
fn all_tasks_complete_normalizes_task_passed_and_clears_has_more_tasks() {
    let outcome = adjudicate(
        "implement_task",
        0,
        claim(&[("allTasksComplete", true), ("taskFailed", true), ("hasMoreTasks", true)]),
        &allowed("implement_task"),
    );

    assert_eq!(outcome.committed.get("taskPassed"), Some(&true));
    assert_eq!(outcome.committed.get("taskFailed"), Some(&false));
    assert_eq!(outcome.committed.get("hasMoreTasks"), Some(&false));
}

#[test]
fn missing_work_normalizes_implementation_complete_false() {
    let outcome = adjudicate(
        "review",
        0,
        claim(&[("missingWork", true), ("implementationComplete", true)]),
        &allowed("review"),
    );

    assert_eq!(outcome.committed.get("missingWork"), Some(&true));
    assert_eq!(outcome.committed.get("implementationComplete"), Some(&false));
}

#[test]
fn report_always_written_with_schema_version_one() {
    let outcome = adjudicate("design_plan", 0, claim(&[]), &allowed("design_plan"));

    assert_eq!(outcome.report.schema_version, 1);
    assert_eq!(outcome.report.phase, "design_plan");
}

#[test]
fn infer_claim_diffs_only_changed_transition_fields() {
    let mut before = issue_json("implement_task");
    before.status.set_bool("taskFailed", false);
    let mut after = before.clone();
    after.status.set_bool("taskFailed", true);
    after.status.set_bool("hasMoreTasks", false);

    let claim = infer_claim(&before, &after);

    assert_eq!(claim.status_updates.get("taskFailed"), Some(&true));
    assert!(!claim.status_updates.contains_key("hasMoreTasks"));
    assert!(matches!(claim.source, ReportSource::Inferred));
}

#[test]
fn apply_commit_resets_then_reapplies_transition_fields() {
    let mut before = issue_json("design_plan");
    before.status.set_bool("designApproved", false);
    let mut issue = before.clone();
    issue.phase = Some("implement_task".to_string());
    issue.status.set_bool("designApproved", true);
    issue.status.set_bool("taskFailed", true);

    let mut committed = HashMap::new();
    committed.insert("designApproved".to_string(), true);

    apply_commit(&mut issue, &before, &committed);

    assert_eq!(issue.phase, before.phase);
    assert!(issue.status.get_bool("designApproved"));
    assert!(!issue.status.get_bool("taskFailed"));
}
