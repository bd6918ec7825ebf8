// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn run_id_formats_timestamp_pid_and_base64_suffix() {
    let id = RunId::new("20260101T000000Z", 1234, &[0, 0, 0, 0, 0, 0]);
    assert_eq!(id.as_str(), "20260101T000000Z-1234.AAAAAAAA");
}

#[test]
fn run_id_suffix_has_no_padding() {
    let id = RunId::new("ts", 1, &[255, 255, 255, 255, 255, 255]);
    assert!(!id.as_str().contains('='));
}

#[test]
fn run_id_different_random_bytes_differ() {
    let a = RunId::new("ts", 1, &[1, 2, 3, 4, 5, 6]);
    let b = RunId::new("ts", 1, &[6, 5, 4, 3, 2, 1]);
    assert_ne!(a, b);
}

#[test]
fn run_status_round_trips_through_json() {
    assert_eq!(serde_json::to_string(&RunStatus::Running).unwrap(), "\"running\"");
    assert_eq!(serde_json::to_string(&RunStatus::MaxIterations).unwrap(), "\"max_iterations\"");
}

#[test]
fn completion_reason_display_matches_spec_strings() {
    assert_eq!(
        CompletionReason::ReachedTerminalPhase { phase: "done".to_string() }.to_string(),
        "reached terminal phase: done"
    );
    assert_eq!(CompletionReason::MaxIterations.to_string(), "max_iterations");
    assert_eq!(
        CompletionReason::ManualStop { reason: Some("operator requested".to_string()) }.to_string(),
        "manual_stop: operator requested"
    );
    assert_eq!(CompletionReason::ManualStop { reason: None }.to_string(), "manual_stop");
    assert_eq!(
        CompletionReason::MergeConflict { task_id: "t1".to_string() }.to_string(),
        "merge_conflict: task t1"
    );
}

#[test]
fn completion_reason_serializes_with_kind_tag() {
    let reason = CompletionReason::SetupFailure { detail: "no worktree".to_string() };
    let value = serde_json::to_value(&reason).unwrap();
    assert_eq!(value["kind"], "setup_failure");
    assert_eq!(value["detail"], "no worktree");
}

#[test]
fn run_record_new_starts_running_with_zero_iterations() {
    let run_id = RunId::new("ts", 1, &[0; 6]);
    let record = RunRecord::new(run_id.clone(), "acme/widget#1".to_string(), None, "claude".to_string(), Some(3), 50, 1000, 777);
    assert_eq!(record.run_id, run_id);
    assert!(record.running);
    assert_eq!(record.pid, Some(777));
    assert_eq!(record.iterations_completed, 0);
    assert_eq!(record.ended_at_ms, None);
    assert!(!record.stop_requested);
    assert_eq!(record.max_parallel_tasks, Some(3));
}
