use super::*;
use tempfile::tempdir;
use warden_core::test_support::{fake_run_id, run_record};

#[test]
fn init_creates_iterations_and_workers_dirs_and_empty_log() {
    let dir = tempdir().unwrap();
    let archive = RunArchive::new(dir.path().to_path_buf());

    archive.init().unwrap();

    assert!(dir.path().join("iterations").is_dir());
    assert!(dir.path().join("workers").is_dir());
    assert_eq!(std::fs::read_to_string(archive.viewer_log_path()).unwrap(), "");
}

#[test]
fn write_then_read_run_record_roundtrips() {
    let dir = tempdir().unwrap();
    let archive = RunArchive::new(dir.path().to_path_buf());
    let record = run_record(fake_run_id(1), "owner/repo#42");

    archive.write_run_record(&record).unwrap();
    let read_back = archive.read_run_record().unwrap().unwrap();

    assert_eq!(read_back.run_id, record.run_id);
    assert_eq!(read_back.issue, record.issue);
}

#[test]
fn read_run_record_is_none_when_absent() {
    let dir = tempdir().unwrap();
    let archive = RunArchive::new(dir.path().to_path_buf());

    assert!(archive.read_run_record().unwrap().is_none());
}

#[test]
fn append_viewer_log_accumulates_lines() {
    let dir = tempdir().unwrap();
    let archive = RunArchive::new(dir.path().to_path_buf());
    archive.init().unwrap();

    archive.append_viewer_log("[PHASE] design").unwrap();
    archive.append_viewer_log("[PHASE] implement\n").unwrap();

    let body = std::fs::read_to_string(archive.viewer_log_path()).unwrap();
    assert_eq!(body, "[PHASE] design\n[PHASE] implement\n");
}

#[test]
fn snapshot_iteration_writes_all_eight_files_plus_metadata() {
    let dir = tempdir().unwrap();
    let archive = RunArchive::new(dir.path().to_path_buf());
    archive.init().unwrap();

    let snapshot = IterationArchive {
        last_run_log: "log".to_string(),
        sdk_output_json: "{}".to_string(),
        issue_json: "{\"phase\":\"design\"}".to_string(),
        tasks_json: "{\"tasks\":[]}".to_string(),
        progress_txt: "progress".to_string(),
        phase_report_json: "{}".to_string(),
        git_status: "".to_string(),
        git_diff_stat: "".to_string(),
    };
    archive.snapshot_iteration(1, "design", &snapshot).unwrap();

    let iter_dir = dir.path().join("iterations").join("001");
    for name in [
        "last-run.log",
        "sdk-output.json",
        "issue.json",
        "tasks.json",
        "progress.txt",
        "phase-report.json",
        "git-status.txt",
        "git-diff-stat.txt",
        "iteration.json",
    ] {
        assert!(iter_dir.join(name).exists(), "missing {name}");
    }
    let meta: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(iter_dir.join("iteration.json")).unwrap())
            .unwrap();
    assert_eq!(meta["index"], 1);
    assert_eq!(meta["phase"], "design");
}

#[test]
fn snapshot_iteration_pads_index_to_three_digits() {
    let dir = tempdir().unwrap();
    let archive = RunArchive::new(dir.path().to_path_buf());
    archive.init().unwrap();

    archive.snapshot_iteration(7, "implement", &IterationArchive::default()).unwrap();

    assert!(dir.path().join("iterations").join("007").exists());
}

#[test]
fn worker_dir_is_scoped_under_run_dir() {
    let dir = tempdir().unwrap();
    let archive = RunArchive::new(dir.path().to_path_buf());

    assert_eq!(archive.worker_dir("task-1"), dir.path().join("workers").join("task-1"));
}

#[test]
fn write_final_artifacts_writes_all_three_files() {
    let dir = tempdir().unwrap();
    let archive = RunArchive::new(dir.path().to_path_buf());

    archive.write_final_artifacts("{}", "{\"tasks\":[]}", "done").unwrap();

    assert_eq!(std::fs::read_to_string(dir.path().join("final-issue.json")).unwrap(), "{}");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("final-tasks.json")).unwrap(),
        "{\"tasks\":[]}"
    );
    assert_eq!(std::fs::read_to_string(dir.path().join("final-progress.txt")).unwrap(), "done");
}

#[test]
fn write_viewer_run_status_writes_both_state_dir_and_run_dir_copies() {
    let state_dir = tempdir().unwrap();
    let run_dir = tempdir().unwrap();
    let status = serde_json::json!({"status": "running"});

    write_viewer_run_status(state_dir.path(), run_dir.path(), &status).unwrap();

    assert!(state_dir.path().join("viewer-run-status.json").exists());
    assert!(run_dir.path().join("viewer-run-status.json").exists());
}
