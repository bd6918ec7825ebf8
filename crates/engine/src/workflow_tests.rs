use super::*;
use warden_core::test_support::issue_json;

fn default_workflow() -> WorkflowName {
    WorkflowName::new("default")
}

#[test]
fn start_phase_of_default_workflow_is_design_draft() {
    let engine = StaticWorkflowEngine::new();
    assert_eq!(engine.start_phase(&default_workflow()), Some(Phase::new("design_draft")));
}

#[test]
fn done_is_terminal_in_default_workflow() {
    let engine = StaticWorkflowEngine::new();
    assert!(engine.is_terminal(&default_workflow(), &Phase::new("done")));
    assert!(!engine.is_terminal(&default_workflow(), &Phase::new("implement_task")));
}

#[test]
fn design_plan_routes_to_implement_task_on_approval() {
    let engine = StaticWorkflowEngine::new();
    let mut issue = issue_json("design_plan");
    issue.status.set_bool("designApproved", true);

    let next = engine.evaluate_transitions(&default_workflow(), &Phase::new("design_plan"), &issue);

    assert_eq!(next, Some(Phase::new("implement_task")));
}

#[test]
fn design_plan_routes_to_design_edit_on_needs_changes() {
    let engine = StaticWorkflowEngine::new();
    let mut issue = issue_json("design_plan");
    issue.status.set_bool("designNeedsChanges", true);

    let next = engine.evaluate_transitions(&default_workflow(), &Phase::new("design_plan"), &issue);

    assert_eq!(next, Some(Phase::new("design_edit")));
}

#[test]
fn design_plan_with_no_flags_set_stays_undetermined() {
    let engine = StaticWorkflowEngine::new();
    let issue = issue_json("design_plan");

    let next = engine.evaluate_transitions(&default_workflow(), &Phase::new("design_plan"), &issue);

    assert_eq!(next, None);
}

#[test]
fn implement_task_loops_until_all_tasks_complete() {
    let engine = StaticWorkflowEngine::new();
    let mut issue = issue_json("implement_task");
    issue.status.set_bool("hasMoreTasks", true);

    let next = engine.evaluate_transitions(&default_workflow(), &Phase::new("implement_task"), &issue);

    assert_eq!(next, Some(Phase::new("implement_task")));
}

#[test]
fn implement_task_advances_to_task_spec_check_when_complete() {
    let engine = StaticWorkflowEngine::new();
    let mut issue = issue_json("implement_task");
    issue.status.set_bool("allTasksComplete", true);

    let next = engine.evaluate_transitions(&default_workflow(), &Phase::new("implement_task"), &issue);

    assert_eq!(next, Some(Phase::new("task_spec_check")));
}

#[test]
fn unconditional_design_chain_advances_regardless_of_status() {
    let engine = StaticWorkflowEngine::new();
    let issue = issue_json("design_draft");

    let next = engine.evaluate_transitions(&default_workflow(), &Phase::new("design_draft"), &issue);

    assert_eq!(next, Some(Phase::new("design_classify")));
}

#[test]
fn quick_fix_workflow_starts_at_quick_fix_phase() {
    let engine = StaticWorkflowEngine::new();
    assert_eq!(
        engine.start_phase(&WorkflowName::new("quick-fix")),
        Some(Phase::new("quick_fix"))
    );
}

#[test]
fn evaluate_transitions_on_unknown_workflow_returns_none() {
    let engine = StaticWorkflowEngine::new();
    let issue = issue_json("whatever");

    let next = engine.evaluate_transitions(
        &WorkflowName::new("nonexistent"),
        &Phase::new("whatever"),
        &issue,
    );

    assert_eq!(next, None);
}

#[test]
fn migrate_legacy_phase_maps_design_draft_to_current_start() {
    let start = Phase::new("quick_fix");
    assert_eq!(migrate_legacy_phase("design_draft", &start), Some(start.clone()));
    assert_eq!(migrate_legacy_phase("design_plan", &start), None);
}

#[test]
fn has_phase_recognizes_phases_of_the_given_workflow() {
    let engine = StaticWorkflowEngine::new();
    assert!(engine.has_phase(&default_workflow(), "design_plan"));
    assert!(!engine.has_phase(&default_workflow(), "quick_fix"));
    assert!(engine.has_phase(&WorkflowName::new("quick-fix"), "quick_fix"));
}

#[test]
fn allowed_status_updates_is_per_phase() {
    let engine = StaticWorkflowEngine::new();
    assert_eq!(
        engine.allowed_status_updates(&default_workflow(), "design_plan"),
        &["designApproved", "designNeedsChanges", "needsDesign"]
    );
    assert_eq!(engine.allowed_status_updates(&default_workflow(), "unknown_phase"), &[] as &[&str]);
}
